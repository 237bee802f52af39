//! Thumbnail extraction for locally staged videos.

use std::io;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

/// Extract the first frame of a video as JPEG bytes. Uses the ffmpeg binary
/// the camera OS ships; the frame is decoded and re-encoded in one pass.
pub async fn video_frame_jpeg(path: &Path) -> io::Result<Vec<u8>> {
    let output = Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args(["-frames:v", "1", "-c:v", "mjpeg", "-f", "image2", "pipe:1"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(io::Error::other(format!(
            "ffmpeg failed for {}: {}",
            path.display(),
            stderr.trim()
        )));
    }
    Ok(output.stdout)
}
