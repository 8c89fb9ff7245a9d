use std::path::{Path, PathBuf};

use log::warn;
use uuid::Uuid;

use super::{ensure_success, run_tool};
use crate::config::MediaConfig;
use crate::error::IngestError;

/// ffmpeg gets a short leash per frame; a stuck seek must not stall the
/// whole acquisition.
const FRAME_TIMEOUT_SECS: u64 = 30;

/// Extract a single frame from `video` at `timestamp` seconds into `out_dir`.
pub async fn extract_frame(
    config: &MediaConfig,
    video: &Path,
    timestamp: f64,
    out_dir: &Path,
) -> Result<PathBuf, IngestError> {
    tokio::fs::create_dir_all(out_dir).await?;
    let output_path = out_dir.join(format!("{}_frame_{}s.jpg", Uuid::new_v4(), timestamp));

    // -ss before -i seeks on the demuxer, much cheaper than decoding up to
    // the timestamp
    let args = vec![
        "-ss".to_string(),
        timestamp.to_string(),
        "-i".to_string(),
        video.to_string_lossy().to_string(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-q:v".to_string(),
        "4".to_string(),
        "-y".to_string(),
        output_path.to_string_lossy().to_string(),
    ];

    let output = run_tool(&config.ffmpeg_path, &args, FRAME_TIMEOUT_SECS).await?;
    ensure_success(&output, "frame extraction")?;

    // ffmpeg can exit zero without writing anything past the end of a clip
    match tokio::fs::metadata(&output_path).await {
        Ok(meta) if meta.len() > 0 => Ok(output_path),
        _ => Err(IngestError::MediaTool(format!(
            "no frame produced at {}s",
            timestamp
        ))),
    }
}

/// Capture frames at each configured offset, tolerating individual failures.
/// Offsets beyond the clip simply produce nothing.
pub async fn capture_frames(
    config: &MediaConfig,
    video: &Path,
    out_dir: &Path,
) -> Vec<(f64, PathBuf)> {
    let mut captured = Vec::new();
    for &offset in &config.frame_offsets {
        match extract_frame(config, video, offset, out_dir).await {
            Ok(path) => captured.push((offset, path)),
            Err(e) => warn!("Frame capture at {}s failed: {}", offset, e),
        }
    }
    captured
}
