use htmlescape::encode_minimal;
use crate::metadata::VideoReport;

const PAGE_STYLE: &str = "body{font-family:sans-serif;max-width:640px;margin:40px auto;color:#222}\
table{border-collapse:collapse;width:100%}\
td,th{border:1px solid #ccc;padding:6px 10px;text-align:left}\
th{background:#f4f4f4}";

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        encode_minimal(title),
        PAGE_STYLE,
        body
    )
}

/// 上传表单页面
pub fn upload_page() -> String {
    page(
        "Video Upload",
        "<h1>Upload a video</h1>\n\
         <form action=\"/upload\" method=\"post\" enctype=\"multipart/form-data\">\n\
         <input type=\"file\" name=\"video\" accept=\"video/*\">\n\
         <button type=\"submit\">Analyze</button>\n\
         </form>",
    )
}

/// 报告页面
///
/// `video_url` 为上传文件在 /static 下的地址（已做百分号编码），为空时不显示播放器。
pub fn report_page(report: &VideoReport, filename: &str, video_url: Option<&str>) -> String {
    let rows = [
        ("total_frames", report.total_frames.to_string()),
        ("fps", format!("{:?}", report.fps)),
        ("duration_sec", format!("{:?}", report.duration_sec)),
        ("resolution", report.resolution.clone()),
        ("players_detected", report.players_detected.to_string()),
    ]
    .iter()
    .map(|(name, value)| format!("<tr><th>{}</th><td>{}</td></tr>", name, encode_minimal(value)))
    .collect::<Vec<_>>()
    .join("\n");

    let player = video_url
        .map(|url| format!("<video src=\"{}\" controls width=\"100%\"></video>\n", encode_minimal(url)))
        .unwrap_or_default();

    page(
        "Video Report",
        &format!(
            "<h1>Report for {}</h1>\n{}<table>\n{}\n</table>\n\
             <p><small>players_detected is a placeholder value, not a detection result.</small></p>\n\
             <p><a href=\"/\">Upload another video</a></p>",
            encode_minimal(filename),
            player,
            rows
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> VideoReport {
        VideoReport {
            total_frames: 300,
            fps: 30.0,
            duration_sec: 10.0,
            resolution: "1920x1080".to_string(),
            players_detected: 7,
        }
    }

    #[test]
    fn test_report_page_lists_fields_by_name() {
        let html = report_page(&sample_report(), "match.mp4", None);
        assert!(html.contains("<tr><th>total_frames</th><td>300</td></tr>"));
        assert!(html.contains("<tr><th>fps</th><td>30.0</td></tr>"));
        assert!(html.contains("<tr><th>duration_sec</th><td>10.0</td></tr>"));
        assert!(html.contains("<tr><th>resolution</th><td>1920x1080</td></tr>"));
        assert!(html.contains("<tr><th>players_detected</th><td>7</td></tr>"));
        assert!(!html.contains("<video"));
    }

    #[test]
    fn test_report_page_escapes_filename() {
        let html = report_page(&sample_report(), "<script>x</script>.mp4", Some("/static/uploads/a.mp4"));
        assert!(html.contains("&lt;script&gt;x&lt;/script&gt;.mp4"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("<video src=\"/static/uploads/a.mp4\""));
    }

    #[test]
    fn test_upload_page_posts_video_field() {
        let html = upload_page();
        assert!(html.contains("action=\"/upload\""));
        assert!(html.contains("name=\"video\""));
        assert!(html.contains("multipart/form-data"));
    }
}
