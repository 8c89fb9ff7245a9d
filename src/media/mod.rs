use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use tokio::process::Command;
use tokio::time::timeout;
use uuid::Uuid;

use crate::config::{ClipStrategyConfig, MediaConfig};
use crate::error::IngestError;
use crate::model::VideoMetadata;

pub mod frames;
pub mod strategy;

/// Retrieval of video metadata and media files. Implemented by the yt-dlp
/// wrapper in production and by fakes in tests.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Probe a URL for metadata without downloading anything.
    async fn probe(&self, url: &str) -> Result<VideoMetadata, IngestError>;

    /// Download captions into `dir`, preferring English tracks. `None` means
    /// the platform offered no caption file.
    async fn download_captions(&self, url: &str, dir: &Path) -> Result<Option<PathBuf>, IngestError>;

    /// Download the audio track as mp3. Empty downloads are deleted and
    /// reported as errors.
    async fn download_audio(&self, url: &str, dir: &Path) -> Result<PathBuf, IngestError>;

    /// Download the first `max_seconds` of video using one attempt profile.
    async fn download_clip(
        &self,
        url: &str,
        strategy: &ClipStrategyConfig,
        max_seconds: f64,
        dir: &Path,
    ) -> Result<PathBuf, IngestError>;
}

/// `MediaFetcher` backed by the yt-dlp binary. Every call is a subprocess
/// with a bounded timeout.
pub struct YtDlpFetcher {
    config: MediaConfig,
}

impl YtDlpFetcher {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    async fn run_ytdlp(&self, args: &[String], timeout_secs: u64) -> Result<std::process::Output, IngestError> {
        run_tool(&self.config.ytdlp_path, args, timeout_secs).await
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn probe(&self, url: &str) -> Result<VideoMetadata, IngestError> {
        let args = vec![
            "-J".to_string(),
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            url.to_string(),
        ];
        let output = self.run_ytdlp(&args, self.config.tool_timeout).await?;
        ensure_success(&output, "metadata probe")?;

        let info: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| IngestError::MediaTool(format!("unparsable probe output: {}", e)))?;
        Ok(metadata_from_probe(&info))
    }

    async fn download_captions(&self, url: &str, dir: &Path) -> Result<Option<PathBuf>, IngestError> {
        let file_id = Uuid::new_v4().to_string();
        let template = dir.join(format!("{}.%(ext)s", file_id));
        let args = vec![
            "--skip-download".to_string(),
            "--write-subs".to_string(),
            "--write-auto-subs".to_string(),
            "--sub-langs".to_string(),
            "en.*,en".to_string(),
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            "-o".to_string(),
            template.to_string_lossy().to_string(),
            url.to_string(),
        ];
        let output = self.run_ytdlp(&args, self.config.tool_timeout).await?;
        ensure_success(&output, "caption download")?;

        find_output(dir, &file_id, Some(&[".vtt", ".srt"])).await
    }

    async fn download_audio(&self, url: &str, dir: &Path) -> Result<PathBuf, IngestError> {
        let file_id = Uuid::new_v4().to_string();
        let template = dir.join(format!("{}.%(ext)s", file_id));
        let args = vec![
            "-f".to_string(),
            "bestaudio/best".to_string(),
            "-x".to_string(),
            "--audio-format".to_string(),
            "mp3".to_string(),
            "--audio-quality".to_string(),
            "192K".to_string(),
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "-o".to_string(),
            template.to_string_lossy().to_string(),
            url.to_string(),
        ];
        let output = self.run_ytdlp(&args, self.config.audio_timeout).await?;
        ensure_success(&output, "audio download")?;

        let path = dir.join(format!("{}.mp3", file_id));
        let size = tokio::fs::metadata(&path)
            .await
            .map_err(|_| IngestError::MediaTool("audio download produced no file".to_string()))?
            .len();
        if size == 0 {
            tokio::fs::remove_file(&path).await.ok();
            return Err(IngestError::MediaTool(
                "downloaded audio file is empty".to_string(),
            ));
        }
        Ok(path)
    }

    async fn download_clip(
        &self,
        url: &str,
        strategy: &ClipStrategyConfig,
        max_seconds: f64,
        dir: &Path,
    ) -> Result<PathBuf, IngestError> {
        let file_id = Uuid::new_v4().to_string();
        let template = dir.join(format!("{}.%(ext)s", file_id));
        let mut args = vec![
            "-f".to_string(),
            strategy.format.clone(),
            "--download-sections".to_string(),
            format!("*0-{}", max_seconds.ceil() as u64),
            "--force-keyframes-at-cuts".to_string(),
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "-o".to_string(),
            template.to_string_lossy().to_string(),
        ];
        if let Some(client) = &strategy.player_client {
            args.push("--extractor-args".to_string());
            args.push(format!("youtube:player_client={}", client));
        }
        args.push(url.to_string());

        let output = self.run_ytdlp(&args, self.config.tool_timeout).await?;
        ensure_success(&output, "clip download")?;

        find_output(dir, &file_id, None)
            .await?
            .ok_or_else(|| IngestError::MediaTool("clip download produced no file".to_string()))
    }
}

/// Run a subprocess with a hard timeout, capturing output.
pub(crate) async fn run_tool(
    program: &str,
    args: &[String],
    timeout_secs: u64,
) -> Result<std::process::Output, IngestError> {
    debug!("Running {} {}", program, args.join(" "));
    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null());

    timeout(Duration::from_secs(timeout_secs), command.output())
        .await
        .map_err(|_| {
            IngestError::MediaTool(format!("{} timed out after {}s", program, timeout_secs))
        })?
        .map_err(|e| IngestError::MediaTool(format!("failed to run {}: {}", program, e)))
}

pub(crate) fn ensure_success(
    output: &std::process::Output,
    context: &str,
) -> Result<(), IngestError> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(IngestError::MediaTool(format!(
        "{} failed ({}): {}",
        context,
        output.status,
        stderr.trim()
    )))
}

/// Locate a tool's output file by its template prefix. In-progress ".part"
/// files never count.
pub(crate) async fn find_output(
    dir: &Path,
    prefix: &str,
    extensions: Option<&[&str]>,
) -> Result<Option<PathBuf>, IngestError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with(prefix) || name.ends_with(".part") {
            continue;
        }
        if let Some(exts) = extensions {
            if !exts.iter().any(|ext| name.ends_with(ext)) {
                continue;
            }
        }
        return Ok(Some(entry.path()));
    }
    Ok(None)
}

fn metadata_from_probe(info: &Value) -> VideoMetadata {
    let has_entries = |key: &str| {
        info.get(key)
            .and_then(|v| v.as_object())
            .map(|m| !m.is_empty())
            .unwrap_or(false)
    };

    VideoMetadata {
        title: info
            .get("title")
            .and_then(|v| v.as_str())
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("Video Recipe")
            .to_string(),
        thumbnail_url: info
            .get("thumbnail")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from),
        captions_available: has_entries("subtitles") || has_entries("automatic_captions"),
        description: info
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        duration_seconds: info.get("duration").and_then(|v| v.as_f64()).unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_probe_parsing_full() {
        let info = json!({
            "title": "One Pot Pasta",
            "thumbnail": "https://i.ytimg.com/vi/abc/hq720.jpg",
            "description": "Full recipe below!",
            "duration": 93.5,
            "subtitles": {"en": [{"ext": "vtt"}]},
            "automatic_captions": {}
        });
        let metadata = metadata_from_probe(&info);
        assert_eq!(metadata.title, "One Pot Pasta");
        assert_eq!(
            metadata.thumbnail_url.as_deref(),
            Some("https://i.ytimg.com/vi/abc/hq720.jpg")
        );
        assert!(metadata.captions_available);
        assert_eq!(metadata.duration_seconds, 93.5);
    }

    #[test]
    fn test_probe_parsing_defaults() {
        let metadata = metadata_from_probe(&json!({}));
        assert_eq!(metadata.title, "Video Recipe");
        assert!(metadata.thumbnail_url.is_none());
        assert!(!metadata.captions_available);
        assert_eq!(metadata.description, "");
        assert_eq!(metadata.duration_seconds, 0.0);
    }

    #[test]
    fn test_probe_auto_captions_count() {
        let info = json!({
            "title": "Quick Bread",
            "subtitles": {},
            "automatic_captions": {"en": [{"ext": "vtt"}]}
        });
        assert!(metadata_from_probe(&info).captions_available);
    }

    #[tokio::test]
    async fn test_find_output_skips_partials() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc123.mp4.part"), b"x").unwrap();
        std::fs::write(dir.path().join("abc123.mp4"), b"video").unwrap();
        std::fs::write(dir.path().join("other.mp4"), b"video").unwrap();

        let found = find_output(dir.path(), "abc123", None).await.unwrap();
        assert_eq!(found.unwrap().file_name().unwrap(), "abc123.mp4");
    }

    #[tokio::test]
    async fn test_find_output_extension_filter() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sub1.en.vtt"), b"WEBVTT").unwrap();
        std::fs::write(dir.path().join("sub1.info.json"), b"{}").unwrap();

        let found = find_output(dir.path(), "sub1", Some(&[".vtt", ".srt"]))
            .await
            .unwrap();
        assert_eq!(found.unwrap().file_name().unwrap(), "sub1.en.vtt");

        let none = find_output(dir.path(), "sub2", Some(&[".vtt", ".srt"]))
            .await
            .unwrap();
        assert!(none.is_none());
    }
}
