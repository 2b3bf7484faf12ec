pub mod metadata;
pub mod error;
pub mod video_processor;
pub mod processor;
pub mod render;
pub mod handler;
pub mod config;

pub use metadata::{ContainerMetadata, VideoReport};
pub use error::ReportError;
pub use video_processor::{ContainerHandle, FfmpegReader, MetadataReader};
pub use processor::{build_report, generate_report, round2, try_generate_report, PLAYERS_DETECTED_RANGE};
pub use handler::AppState;
pub use config::{ConfigLoader, ConfigOverrides, ServerConfig};
