use ffmpeg_next as ffmpeg;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use crate::{error::ReportError, metadata::ContainerMetadata};

/// 视频元数据读取能力
///
/// 报告生成只依赖这个窄接口，不关心背后是哪个解码库。
/// 句柄在 drop 时释放底层资源，所以任何返回路径上都会被释放。
pub trait MetadataReader: Send + Sync {
    /// 打开视频容器
    fn open(&self, path: &Path) -> Result<Box<dyn ContainerHandle>, ReportError>;
}

/// 已打开的视频容器句柄
pub trait ContainerHandle {
    /// 读取容器级元数据
    fn read_metadata(&mut self) -> Result<ContainerMetadata, ReportError>;
}

/// 基于 FFmpeg 的元数据读取器
#[derive(Debug, Clone, Copy)]
pub struct FfmpegReader;

impl FfmpegReader {
    pub fn new() -> Result<Self> {
        ffmpeg::init().context("初始化 FFmpeg 失败")?;

        // 只输出 ERROR 级别以上的 libav 日志，避免损坏文件刷屏
        unsafe {
            ffmpeg::sys::av_log_set_level(ffmpeg::sys::AV_LOG_ERROR as i32);
        }

        Ok(Self)
    }
}

impl MetadataReader for FfmpegReader {
    fn open(&self, path: &Path) -> Result<Box<dyn ContainerHandle>, ReportError> {
        if !path.is_file() {
            return Err(ReportError::NotFound(path.to_path_buf()));
        }

        let ictx = ffmpeg::format::input(&path).map_err(|e| ReportError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Box::new(FfmpegHandle {
            path: path.to_path_buf(),
            ictx,
        }))
    }
}

/// FFmpeg 输入上下文，drop 时由 ffmpeg-next 关闭
struct FfmpegHandle {
    path: PathBuf,
    ictx: ffmpeg::format::context::Input,
}

impl ContainerHandle for FfmpegHandle {
    fn read_metadata(&mut self) -> Result<ContainerMetadata, ReportError> {
        let video_stream = self
            .ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| ReportError::NoVideoStream(self.path.clone()))?;

        let unreadable = |e: ffmpeg::Error| ReportError::Unreadable {
            path: self.path.clone(),
            reason: e.to_string(),
        };

        let decoder_context = ffmpeg::codec::context::Context::from_parameters(video_stream.parameters())
            .map_err(unreadable)?;
        let decoder = decoder_context.decoder().video().map_err(unreadable)?;

        // 优先使用 r_frame_rate，缺失时退回 avg_frame_rate
        let rate = video_stream.rate();
        let mut fps = rational_to_f64(rate.numerator(), rate.denominator());
        if fps == 0.0 {
            let avg = video_stream.avg_frame_rate();
            fps = rational_to_f64(avg.numerator(), avg.denominator());
        }

        let time_base = video_stream.time_base();
        let stream_duration = if video_stream.duration() > 0 {
            video_stream.duration() as f64 * rational_to_f64(time_base.numerator(), time_base.denominator())
        } else if self.ictx.duration() > 0 {
            self.ictx.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64
        } else {
            0.0
        };

        let frame_count = estimate_frame_count(video_stream.frames(), stream_duration, fps);

        debug!(
            "容器元数据: {} 帧, {:.3} fps, {}x{}, 时长 {:.3}秒 ({})",
            frame_count,
            fps,
            decoder.width(),
            decoder.height(),
            stream_duration,
            self.path.display()
        );

        Ok(ContainerMetadata {
            frame_count,
            fps,
            width: decoder.width(),
            height: decoder.height(),
        })
    }
}

/// 有理数转浮点，分母非正时视为 0
pub(crate) fn rational_to_f64(numerator: i32, denominator: i32) -> f64 {
    if denominator > 0 && numerator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}

/// 容器未记录帧数时，按 时长 * 帧率 估算
pub(crate) fn estimate_frame_count(recorded: i64, duration_sec: f64, fps: f64) -> u64 {
    if recorded > 0 {
        return recorded as u64;
    }
    if duration_sec > 0.0 && fps > 0.0 {
        (duration_sec * fps).round() as u64
    } else {
        0
    }
}
