use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, Json as ResponseJson},
    routing::{get, post},
    Router,
};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use rand::{rngs::StdRng, SeedableRng};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};
use crate::{generate_report, render, MetadataReader, VideoReport};

/// 上传表单中视频文件字段名
pub const VIDEO_FIELD: &str = "video";

/// 请求间共享的只读状态
pub struct AppState {
    /// 元数据读取器
    pub reader: Arc<dyn MetadataReader>,
    /// 静态文件目录
    pub static_dir: PathBuf,
    /// 上传文件保存目录
    pub upload_dir: PathBuf,
    /// players_detected 随机数种子
    pub players_seed: Option<u64>,
}

/// 已保存到磁盘的上传文件
#[derive(Debug)]
struct StoredUpload {
    filename: String,
    path: PathBuf,
}

type HandlerError = (StatusCode, String);

/// 构建路由
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let static_files = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/", get(upload_form))
        .route("/health", get(health_check))
        .route("/upload", post(handle_upload))
        .route("/api/report", post(handle_report_api))
        .nest_service("/static", static_files)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 上传表单页面
pub async fn upload_form() -> Html<String> {
    Html(render::upload_page())
}

/// 健康检查 Handler
pub async fn health_check() -> &'static str {
    "OK"
}

/// 接收上传的视频并返回 HTML 报告页面
pub async fn handle_upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Html<String>, HandlerError> {
    let upload = receive_upload(&state, multipart).await?;
    let report = run_report(&state, upload.path.clone()).await?;

    let video_url = static_url(&state.static_dir, &state.upload_dir, &upload.filename);
    Ok(Html(render::report_page(&report, &upload.filename, video_url.as_deref())))
}

/// 接收上传的视频并返回 JSON 报告
pub async fn handle_report_api(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<ResponseJson<VideoReport>, HandlerError> {
    let upload = receive_upload(&state, multipart).await?;
    let report = run_report(&state, upload.path).await?;
    Ok(ResponseJson(report))
}

/// 从 multipart 请求中取出 video 字段并写入上传目录
async fn receive_upload(state: &AppState, mut multipart: Multipart) -> Result<StoredUpload, HandlerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), e.body_text()))?
    {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        // 表单未选择文件时浏览器会发送空 filename
        let raw_name = field.file_name().unwrap_or_default().to_string();
        if raw_name.is_empty() {
            return Err((StatusCode::BAD_REQUEST, "No selected file".to_string()));
        }
        let filename = sanitize_filename(&raw_name)
            .ok_or_else(|| (StatusCode::BAD_REQUEST, "Invalid file name".to_string()))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| (e.status(), e.body_text()))?;

        let path = state.upload_dir.join(&filename);
        tokio::fs::write(&path, &data).await.map_err(|e| {
            error!("保存上传文件失败: {}: {}", path.display(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("保存上传文件失败: {}", e))
        })?;
        info!("已保存上传文件: {} ({} 字节)", path.display(), data.len());

        return Ok(StoredUpload { filename, path });
    }

    warn!("上传请求中没有 {} 文件字段", VIDEO_FIELD);
    Err((StatusCode::BAD_REQUEST, "No file uploaded".to_string()))
}

/// 在阻塞线程池中生成报告
async fn run_report(state: &AppState, path: PathBuf) -> Result<VideoReport, HandlerError> {
    let reader = state.reader.clone();
    let seed = state.players_seed;

    tokio::task::spawn_blocking(move || {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        generate_report(reader.as_ref(), &path, &mut rng)
    })
    .await
    .map_err(|e| {
        error!("报告生成任务异常退出: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("生成报告失败: {}", e))
    })
}

/// 只保留客户端文件名的最后一段，防止写出上传目录
fn sanitize_filename(raw: &str) -> Option<String> {
    let name = raw.rsplit(|c: char| c == '/' || c == '\\').next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

/// 上传目录位于静态目录下时，返回文件的访问地址
fn static_url(static_dir: &Path, upload_dir: &Path, filename: &str) -> Option<String> {
    let relative = upload_dir.strip_prefix(static_dir).ok()?;

    let mut url = String::from("/static");
    for component in relative.iter() {
        url.push('/');
        url.extend(utf8_percent_encode(&component.to_string_lossy(), NON_ALPHANUMERIC));
    }
    url.push('/');
    url.extend(utf8_percent_encode(filename, NON_ALPHANUMERIC));
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContainerHandle, ContainerMetadata, ReportError};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use rand::Rng;
    use tower::ServiceExt;

    const BOUNDARY: &str = "video-report-test-boundary";

    /// 文件存在时返回 1080p 元数据，不存在时报 NotFound
    struct FixedReader;

    struct FixedHandle;

    impl ContainerHandle for FixedHandle {
        fn read_metadata(&mut self) -> Result<ContainerMetadata, ReportError> {
            Ok(ContainerMetadata {
                frame_count: 300,
                fps: 30.0,
                width: 1920,
                height: 1080,
            })
        }
    }

    impl MetadataReader for FixedReader {
        fn open(&self, path: &Path) -> Result<Box<dyn ContainerHandle>, ReportError> {
            if !path.is_file() {
                return Err(ReportError::NotFound(path.to_path_buf()));
            }
            Ok(Box::new(FixedHandle))
        }
    }

    fn test_app(static_dir: &Path, seed: Option<u64>) -> Router {
        let upload_dir = static_dir.join("uploads");
        std::fs::create_dir_all(&upload_dir).unwrap();
        let state = Arc::new(AppState {
            reader: Arc::new(FixedReader),
            static_dir: static_dir.to_path_buf(),
            upload_dir,
            players_seed: seed,
        });
        router(state, 1024 * 1024)
    }

    fn multipart_body(name: &str, filename: Option<&str>, content: &[u8]) -> Vec<u8> {
        let disposition = match filename {
            Some(filename) => format!("form-data; name=\"{}\"; filename=\"{}\"", name, filename),
            None => format!("form-data; name=\"{}\"", name),
        };
        let mut body = format!(
            "--{}\r\nContent-Disposition: {}\r\nContent-Type: video/mp4\r\n\r\n",
            BOUNDARY, disposition
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(dir.path(), None)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn test_upload_form() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(dir.path(), None)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("name=\"video\""));
    }

    #[tokio::test]
    async fn test_upload_renders_report() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body("video", Some("match day.mp4"), b"fake video bytes");
        let response = test_app(dir.path(), None)
            .oneshot(upload_request("/upload", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Report for match day.mp4"));
        assert!(html.contains("<tr><th>resolution</th><td>1920x1080</td></tr>"));
        assert!(html.contains("<tr><th>duration_sec</th><td>10.0</td></tr>"));
        assert!(html.contains("/static/uploads/match%20day%2Emp4"));

        let stored = std::fs::read(dir.path().join("uploads").join("match day.mp4")).unwrap();
        assert_eq!(stored, b"fake video bytes");
    }

    #[tokio::test]
    async fn test_api_returns_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body("video", Some("clip.mp4"), b"data");
        let response = test_app(dir.path(), Some(11))
            .oneshot(upload_request("/api/report", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let report: VideoReport = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(report.total_frames, 300);
        assert_eq!(report.fps, 30.0);
        assert_eq!(report.duration_sec, 10.0);
        assert_eq!(report.resolution, "1920x1080");

        // 固定种子时 players_detected 可复现
        let expected: u32 = StdRng::seed_from_u64(11).gen_range(5..11);
        assert_eq!(report.players_detected, expected);
    }

    #[tokio::test]
    async fn test_missing_video_field() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body("attachment", Some("clip.mp4"), b"data");
        let response = test_app(dir.path(), None)
            .oneshot(upload_request("/upload", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "No file uploaded");
    }

    #[tokio::test]
    async fn test_empty_filename() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body("video", Some(""), b"");
        let response = test_app(dir.path(), None)
            .oneshot(upload_request("/upload", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "No selected file");
    }

    #[tokio::test]
    async fn test_video_field_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body("video", None, b"just text");
        let response = test_app(dir.path(), None)
            .oneshot(upload_request("/upload", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "No selected file");
    }

    #[tokio::test]
    async fn test_upload_cannot_escape_upload_dir() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body("video", Some("../../evil.mp4"), b"data");
        let response = test_app(dir.path(), None)
            .oneshot(upload_request("/api/report", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(dir.path().join("uploads").join("evil.mp4").is_file());
        assert!(!dir.path().join("evil.mp4").exists());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("match.mp4").as_deref(), Some("match.mp4"));
        assert_eq!(sanitize_filename("a/b/c.mov").as_deref(), Some("c.mov"));
        assert_eq!(sanitize_filename("C:\\Videos\\c.mov").as_deref(), Some("c.mov"));
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename("uploads/"), None);
    }

    #[test]
    fn test_static_url() {
        let url = static_url(Path::new("static"), Path::new("static/uploads"), "a b.mp4");
        assert_eq!(url.as_deref(), Some("/static/uploads/a%20b%2Emp4"));
        assert_eq!(static_url(Path::new("static"), Path::new("/var/uploads"), "a.mp4"), None);
    }
}
