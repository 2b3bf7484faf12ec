use serde::{Deserialize, Serialize};

/// 从视频容器头部读取的原始元数据
///
/// 全零值（`Default`）表示元数据不可用。
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerMetadata {
    /// 总帧数（部分容器格式下为估算值，可能为 0）
    pub frame_count: u64,
    /// 标称帧率
    pub fps: f64,
    /// 画面宽度
    pub width: u32,
    /// 画面高度
    pub height: u32,
}

/// 返回给上传者的视频报告
///
/// 字段名是对外接口的一部分（JSON 与 HTML 渲染都按字段名读取），不要改名。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoReport {
    /// 总帧数
    pub total_frames: u64,
    /// 帧率（保留两位小数）
    pub fps: f64,
    /// 视频时长（秒，保留两位小数）
    pub duration_sec: f64,
    /// 分辨率（宽x高）
    pub resolution: String,
    /// 占位值：[5, 11) 内的随机数，与视频内容无关
    pub players_detected: u32,
}
