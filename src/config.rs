use anyhow::Result;
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_BIND: &str = "0.0.0.0:5000";
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const DEFAULT_UPLOAD_DIR: &str = "static/uploads";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 512;

/// 服务配置
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// 监听地址
    pub bind: String,
    /// 静态文件目录（挂载在 /static 下）
    pub static_dir: PathBuf,
    /// 上传文件保存目录
    pub upload_dir: PathBuf,
    /// 上传大小上限（MB）
    pub max_upload_mb: usize,
    /// players_detected 随机数种子（未设置时每次请求使用系统熵）
    pub players_seed: Option<u64>,
    /// 日志级别（trace, debug, info, warn, error）
    pub log_level: String,
}

impl ServerConfig {
    /// 上传大小上限（字节），超大配置值截断到 usize::MAX
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            players_seed: None,
            log_level: "info".to_string(),
        }
    }
}

/// 命令行覆盖项，未设置的字段交给环境变量、配置文件和默认值
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind: Option<String>,
    pub players_seed: Option<u64>,
}

/// 单一来源中读到的配置（每一项都可能缺失）
#[derive(Debug, Clone, Default, PartialEq)]
struct PartialConfig {
    bind: Option<String>,
    static_dir: Option<PathBuf>,
    upload_dir: Option<PathBuf>,
    max_upload_mb: Option<usize>,
    players_seed: Option<u64>,
    log_level: Option<String>,
}

/// VIDEO_REPORT_BIND 优先，其次兼容平台注入的 PORT，空值视为未设置
fn bind_from_env(bind: Option<String>, port: Option<String>) -> Option<String> {
    bind.filter(|v| !v.is_empty()).or_else(|| {
        port.filter(|v| !v.is_empty())
            .map(|port| format!("0.0.0.0:{}", port))
    })
}

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从多个源加载配置，优先级：命令行参数 > 环境变量 > 配置文件 > 默认值
    pub fn load_config(config_file: Option<&Path>, overrides: ConfigOverrides) -> Result<ServerConfig> {
        // 显式指定的配置文件读取失败要报错，默认位置找不到则忽略
        let file_config = match config_file {
            Some(config_path) => Some(Self::load_from_file(config_path)?),
            None => Self::load_from_default_locations().ok(),
        };

        let env_config = Self::load_from_env();
        Ok(Self::merge(overrides, env_config, file_config.unwrap_or_default()))
    }

    fn merge(cli: ConfigOverrides, env_config: PartialConfig, file_config: PartialConfig) -> ServerConfig {
        let defaults = ServerConfig::default();

        ServerConfig {
            bind: cli
                .bind
                .or(env_config.bind)
                .or(file_config.bind)
                .unwrap_or(defaults.bind),
            static_dir: env_config
                .static_dir
                .or(file_config.static_dir)
                .unwrap_or(defaults.static_dir),
            upload_dir: env_config
                .upload_dir
                .or(file_config.upload_dir)
                .unwrap_or(defaults.upload_dir),
            max_upload_mb: env_config
                .max_upload_mb
                .or(file_config.max_upload_mb)
                .unwrap_or(defaults.max_upload_mb),
            players_seed: cli
                .players_seed
                .or(env_config.players_seed)
                .or(file_config.players_seed),
            log_level: env_config
                .log_level
                .or(file_config.log_level)
                .unwrap_or(defaults.log_level),
        }
    }

    /// 从环境变量加载配置
    fn load_from_env() -> PartialConfig {
        PartialConfig {
            bind: bind_from_env(env::var("VIDEO_REPORT_BIND").ok(), env::var("PORT").ok()),
            static_dir: env::var("VIDEO_REPORT_STATIC_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            upload_dir: env::var("VIDEO_REPORT_UPLOAD_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            max_upload_mb: env::var("VIDEO_REPORT_MAX_UPLOAD_MB")
                .ok()
                .and_then(|v| v.parse().ok()),
            players_seed: env::var("VIDEO_REPORT_PLAYERS_SEED")
                .ok()
                .and_then(|v| v.parse().ok()),
            log_level: env::var("LOG_LEVEL").ok().filter(|v| !v.is_empty()),
        }
    }

    /// 从INI配置文件加载配置
    fn load_from_file(config_path: &Path) -> Result<PartialConfig> {
        if !config_path.exists() {
            return Err(anyhow::anyhow!("配置文件不存在: {}", config_path.display()));
        }

        let mut config_parser = configparser::ini::Ini::new();
        config_parser.load(config_path)
            .map_err(|e| anyhow::anyhow!("读取配置文件失败: {}: {}", config_path.display(), e))?;

        // 先读具体节，没有则回退到 [DEFAULT] 节
        let get = |section: &str, key: &str| {
            config_parser
                .get(section, key)
                .or_else(|| config_parser.get("DEFAULT", key))
                .filter(|v| !v.is_empty())
        };

        Ok(PartialConfig {
            bind: get("server", "bind"),
            static_dir: get("server", "static_dir").map(PathBuf::from),
            upload_dir: get("server", "upload_dir").map(PathBuf::from),
            max_upload_mb: get("server", "max_upload_mb").and_then(|v| v.parse().ok()),
            players_seed: get("report", "players_seed").and_then(|v| v.parse().ok()),
            log_level: get("logging", "level"),
        })
    }

    /// 从默认位置加载配置文件
    fn load_from_default_locations() -> Result<PartialConfig> {
        let mut candidates = vec![
            PathBuf::from("video-report.ini"),
            PathBuf::from(".video-report.ini"),
        ];
        if let Some(home) = env::var_os("HOME") {
            candidates.push(PathBuf::from(home).join(".video-report.ini"));
        }
        candidates.push(PathBuf::from("/etc/video-report.ini"));

        for candidate in &candidates {
            if candidate.exists() {
                return Self::load_from_file(candidate);
            }
        }

        Err(anyhow::anyhow!("未找到配置文件"))
    }

    /// 创建默认配置文件
    pub fn create_default_config(config_path: &Path) -> Result<()> {
        let mut config_parser = configparser::ini::Ini::new();
        config_parser.set("server", "bind", Some(DEFAULT_BIND.to_string()));
        config_parser.set("server", "static_dir", Some(DEFAULT_STATIC_DIR.to_string()));
        config_parser.set("server", "upload_dir", Some(DEFAULT_UPLOAD_DIR.to_string()));
        config_parser.set("server", "max_upload_mb", Some(DEFAULT_MAX_UPLOAD_MB.to_string()));
        config_parser.set("report", "players_seed", Some("".to_string()));
        config_parser.set("logging", "level", Some("info".to_string()));

        config_parser.write(config_path)
            .map_err(|e| anyhow::anyhow!("写入配置文件失败: {}: {}", config_path.display(), e))?;

        Ok(())
    }
}
