use std::path::PathBuf;
use thiserror::Error;

/// 读取视频元数据时可能出现的错误
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("视频文件不存在: {}", .0.display())]
    NotFound(PathBuf),

    #[error("无法打开视频文件 {}: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("未找到视频流: {}", .0.display())]
    NoVideoStream(PathBuf),
}
