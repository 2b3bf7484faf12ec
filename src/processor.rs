use rand::Rng;
use std::ops::Range;
use std::path::Path;
use tracing::{info, warn};
use crate::{
    error::ReportError,
    metadata::{ContainerMetadata, VideoReport},
    video_processor::MetadataReader,
};

/// players_detected 的取值范围（占位值，不是检测结果）
pub const PLAYERS_DETECTED_RANGE: Range<u32> = 5..11;

/// 保留两位小数，恰好位于两数中间时取偶数（按原始二进制值判断）
pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if (scaled - scaled.trunc()).abs() != 0.5 {
        return scaled.round() / 100.0;
    }

    // 乘法结果落在 .5 上时，value * 200 不一定真的是奇整数
    let error = value.mul_add(200.0, -(scaled * 2.0));
    let rounded = if error == 0.0 {
        scaled.round_ties_even()
    } else if error > 0.0 {
        scaled.ceil()
    } else {
        scaled.floor()
    };
    rounded / 100.0
}

/// 由容器元数据组装报告
///
/// 时长用未取整的帧率计算，帧率为 0 时时长记为 0。
pub fn build_report<R: Rng + ?Sized>(meta: &ContainerMetadata, rng: &mut R) -> VideoReport {
    let duration = if meta.fps != 0.0 {
        meta.frame_count as f64 / meta.fps
    } else {
        0.0
    };

    VideoReport {
        total_frames: meta.frame_count,
        fps: round2(meta.fps),
        duration_sec: round2(duration),
        resolution: format!("{}x{}", meta.width, meta.height),
        players_detected: rng.gen_range(PLAYERS_DETECTED_RANGE),
    }
}

/// 生成视频报告，无法读取的文件返回错误
pub fn try_generate_report<R: Rng + ?Sized>(
    reader: &dyn MetadataReader,
    path: impl AsRef<Path>,
    rng: &mut R,
) -> Result<VideoReport, ReportError> {
    let path = path.as_ref();

    // 句柄在这个块结束时释放，读取失败也一样
    let meta = {
        let mut handle = reader.open(path)?;
        handle.read_metadata()?
    };

    let report = build_report(&meta, rng);
    info!(
        "生成报告: {} -> {} 帧, {:.2} fps, {:.2}秒, {}",
        path.display(),
        report.total_frames,
        report.fps,
        report.duration_sec,
        report.resolution
    );
    Ok(report)
}

/// 生成视频报告
///
/// 文件不存在、不是视频或没有视频流时不报错，元数据字段全部为 0。
pub fn generate_report<R: Rng + ?Sized>(
    reader: &dyn MetadataReader,
    path: impl AsRef<Path>,
    rng: &mut R,
) -> VideoReport {
    let path = path.as_ref();
    match try_generate_report(reader, path, &mut *rng) {
        Ok(report) => report,
        Err(e) => {
            warn!("读取视频元数据失败，使用空元数据: {}", e);
            build_report(&ContainerMetadata::default(), rng)
        }
    }
}
