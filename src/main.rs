use clap::{Parser, Subcommand};
use anyhow::{Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;
use video_report::{
    generate_report, try_generate_report, AppState, ConfigLoader, ConfigOverrides, FfmpegReader,
    ServerConfig,
};

/// 视频报告工具 - 读取视频容器元数据，生成帧数、帧率、时长、分辨率报告
#[derive(Parser, Debug)]
#[command(name = "video-report")]
#[command(about = "视频报告工具：上传视频并生成元数据报告", long_about = None)]
struct Args {
    /// 配置文件路径（可选，支持 .ini 格式）
    /// 优先级：命令行参数 > 环境变量 > 配置文件 > 默认值
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// CLI 模式：为本地视频文件生成报告（JSON 输出）
    Report {
        /// 输入视频文件路径
        #[arg(short, long)]
        input: PathBuf,

        /// players_detected 随机数种子
        /// 可通过环境变量 VIDEO_REPORT_PLAYERS_SEED 或配置文件设置
        #[arg(long)]
        seed: Option<u64>,

        /// 无法读取元数据时报错退出，而不是输出全零报告
        #[arg(long)]
        strict: bool,
    },
    /// Web 服务模式：启动上传表单和报告服务
    Serve {
        /// 监听地址（默认从 VIDEO_REPORT_BIND / PORT 环境变量读取，否则使用 0.0.0.0:5000）
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// 生成默认配置文件
    InitConfig {
        /// 输出路径
        #[arg(short, long, default_value = "video-report.ini")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = match &args.command {
        Commands::Report { seed, .. } => ConfigOverrides {
            players_seed: *seed,
            ..Default::default()
        },
        Commands::Serve { bind } => ConfigOverrides {
            bind: bind.clone(),
            ..Default::default()
        },
        Commands::InitConfig { .. } => ConfigOverrides::default(),
    };
    let config = ConfigLoader::load_config(args.config.as_deref(), overrides)
        .context("加载配置失败")?;

    init_logging(&config.log_level);

    match args.command {
        Commands::Report { input, strict, .. } => {
            let reader = FfmpegReader::new()?;
            let mut rng = match config.players_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };

            let report = if strict {
                try_generate_report(&reader, &input, &mut rng)
                    .with_context(|| format!("生成报告失败: {}", input.display()))?
            } else {
                generate_report(&reader, &input, &mut rng)
            };

            let json = serde_json::to_string_pretty(&report).context("序列化报告失败")?;
            println!("{}", json);
        }
        Commands::Serve { .. } => {
            start_web_server(config).await?;
        }
        Commands::InitConfig { output } => {
            ConfigLoader::create_default_config(&output)?;
            tracing::info!("已生成默认配置文件: {}", output.display());
        }
    }

    Ok(())
}

/// 初始化日志，无法识别的级别按 info 处理
///
/// 日志写到 stderr，stdout 只留给 report 子命令的 JSON 输出。
fn init_logging(log_level: &str) {
    let level = log_level.parse::<tracing::Level>().ok();
    tracing_subscriber::fmt()
        .with_max_level(level.unwrap_or(tracing::Level::INFO))
        .with_writer(std::io::stderr)
        .init();

    if level.is_none() {
        tracing::warn!("无法识别的日志级别: {}，使用 info", log_level);
    }
}

async fn start_web_server(config: ServerConfig) -> Result<()> {
    use video_report::handler;

    std::fs::create_dir_all(&config.upload_dir)
        .with_context(|| format!("创建上传目录失败: {}", config.upload_dir.display()))?;

    let state = Arc::new(AppState {
        reader: Arc::new(FfmpegReader::new()?),
        static_dir: config.static_dir.clone(),
        upload_dir: config.upload_dir.clone(),
        players_seed: config.players_seed,
    });
    let app = handler::router(state, config.max_upload_bytes());

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .context(format!("绑定地址失败: {}", config.bind))?;

    tracing::info!("Web 服务器启动在: http://{}", config.bind);
    tracing::info!("  • 上传表单: GET  http://{}/", config.bind);
    tracing::info!("  • 健康检查: GET  http://{}/health", config.bind);
    tracing::info!("  • 上传报告: POST http://{}/upload", config.bind);
    tracing::info!("  • JSON 报告: POST http://{}/api/report", config.bind);
    tracing::info!("  • 上传目录: {}", config.upload_dir.display());

    axum::serve(listener, app)
        .await
        .context("启动服务器失败")?;

    Ok(())
}
