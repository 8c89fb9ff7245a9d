use std::path::{Path, PathBuf};

use log::{debug, warn};
use uuid::Uuid;

use crate::config::{ClipStrategyConfig, ImagesConfig, MediaConfig};
use crate::error::IngestError;
use crate::fetch::{extension_for, PageFetcher};
use crate::media::{frames, MediaFetcher};
use crate::model::{CandidateOrigin, ImageCandidate};

/// Moves candidate images between scratch and permanent storage. Candidates
/// live in the scratch directory until a selection is made; finalizing moves
/// the chosen file, cleanup deletes the rest.
pub struct ImageStore {
    scratch_dir: PathBuf,
    permanent_dir: PathBuf,
    fetcher: PageFetcher,
}

impl ImageStore {
    pub fn new(config: &ImagesConfig, fetcher: PageFetcher) -> Self {
        Self {
            scratch_dir: PathBuf::from(&config.scratch_dir),
            permanent_dir: PathBuf::from(&config.permanent_dir),
            fetcher,
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Persist a manually uploaded image into scratch storage as a candidate.
    pub async fn save_upload(
        &self,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> Result<ImageCandidate, IngestError> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let name = format!("{}{}", Uuid::new_v4(), extension_for(content_type));
        let path = self.scratch_dir.join(name);
        tokio::fs::write(&path, bytes).await?;
        Ok(ImageCandidate::local(
            path.to_string_lossy(),
            CandidateOrigin::Upload,
        ))
    }

    /// Move a chosen candidate into permanent storage and return its new
    /// path. Remote candidates are downloaded; local scratch files are
    /// renamed under a fresh name.
    pub async fn finalize(&self, candidate: &ImageCandidate) -> Result<String, IngestError> {
        tokio::fs::create_dir_all(&self.permanent_dir).await?;

        if candidate.is_remote() {
            let path = self
                .fetcher
                .download_image(&candidate.path, &self.permanent_dir)
                .await?;
            return Ok(path.to_string_lossy().to_string());
        }

        let source = Path::new(&candidate.path);
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg");
        let target = self.permanent_dir.join(format!("{}.{}", Uuid::new_v4(), ext));
        move_file(source, &target).await?;
        Ok(target.to_string_lossy().to_string())
    }

    /// Delete the scratch files of rejected candidates. `keep` names a path
    /// that must survive even if it appears in the rejected list; remote
    /// candidates have nothing on disk.
    pub async fn cleanup_rejected(&self, rejected: &[ImageCandidate], keep: Option<&str>) {
        for candidate in rejected {
            if candidate.is_remote() || !candidate.is_temporary {
                continue;
            }
            if keep.is_some_and(|k| k == candidate.path) {
                continue;
            }
            match tokio::fs::remove_file(&candidate.path).await {
                Ok(()) => debug!("Removed rejected candidate {}", candidate.path),
                Err(e) => debug!("Candidate {} already gone: {}", candidate.path, e),
            }
        }
    }

    /// Replace a finalized low-resolution frame with one re-captured from a
    /// higher-resolution clip. Failures only log; the low-res frame stays.
    pub async fn upgrade_frame(
        &self,
        media: &dyn MediaFetcher,
        config: &MediaConfig,
        url: &str,
        timestamp: f64,
        permanent_path: &str,
    ) {
        if let Err(e) = self
            .try_upgrade_frame(media, config, url, timestamp, permanent_path)
            .await
        {
            warn!("Frame upgrade for {} failed: {}", url, e);
        }
    }

    async fn try_upgrade_frame(
        &self,
        media: &dyn MediaFetcher,
        config: &MediaConfig,
        url: &str,
        timestamp: f64,
        permanent_path: &str,
    ) -> Result<(), IngestError> {
        let scratch = tempfile::tempdir()?;
        let strategy = ClipStrategyConfig {
            name: "upgrade".to_string(),
            format: config.upgrade_format.clone(),
            player_client: None,
        };
        let clip = media
            .download_clip(url, &strategy, config.clip_seconds, scratch.path())
            .await?;
        let frame = frames::extract_frame(config, &clip, timestamp, scratch.path()).await?;
        replace_file(&frame, Path::new(permanent_path)).await?;
        debug!("Upgraded frame at {}s for {}", timestamp, url);
        Ok(())
    }
}

/// Rename, or copy and remove when source and target sit on different
/// filesystems.
async fn move_file(source: &Path, target: &Path) -> Result<(), IngestError> {
    if tokio::fs::rename(source, target).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(source, target).await?;
    tokio::fs::remove_file(source).await.ok();
    Ok(())
}

/// Overwrite `target` without a window where it is missing or half-written:
/// stage next to it, then rename over it.
async fn replace_file(source: &Path, target: &Path) -> Result<(), IngestError> {
    let staged = target.with_extension("tmp");
    move_file(source, &staged).await?;
    tokio::fs::rename(&staged, target).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetcherConfig;

    fn store_at(root: &Path) -> ImageStore {
        let config = ImagesConfig {
            scratch_dir: root.join("candidates").to_string_lossy().to_string(),
            permanent_dir: root.join("permanent").to_string_lossy().to_string(),
            cleanup_delay: 0,
        };
        ImageStore::new(&config, PageFetcher::new(&FetcherConfig::default()))
    }

    #[tokio::test]
    async fn test_finalize_moves_local_candidate() {
        let root = tempfile::tempdir().unwrap();
        let store = store_at(root.path());

        tokio::fs::create_dir_all(store.scratch_dir()).await.unwrap();
        let source = store.scratch_dir().join("frame.jpg");
        tokio::fs::write(&source, b"jpeg bytes").await.unwrap();

        let candidate = ImageCandidate::local(
            source.to_string_lossy(),
            CandidateOrigin::Frame {
                timestamp_seconds: 5.0,
            },
        );
        let final_path = store.finalize(&candidate).await.unwrap();

        assert!(final_path.ends_with(".jpg"));
        assert!(Path::new(&final_path).exists());
        assert!(!source.exists());
        assert_eq!(
            tokio::fs::read(&final_path).await.unwrap(),
            b"jpeg bytes".to_vec()
        );
    }

    #[tokio::test]
    async fn test_finalize_downloads_remote_candidate() {
        let mut server = mockito::Server::new_async().await;
        let image_mock = server
            .mock("GET", "/thumb.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(b"png bytes".to_vec())
            .create_async()
            .await;

        let root = tempfile::tempdir().unwrap();
        let store = store_at(root.path());
        let candidate = ImageCandidate::remote(
            format!("{}/thumb.png", server.url()),
            CandidateOrigin::Thumbnail,
        );

        let final_path = store.finalize(&candidate).await.unwrap();
        image_mock.assert_async().await;
        assert!(final_path.ends_with(".png"));
        assert_eq!(
            tokio::fs::read(&final_path).await.unwrap(),
            b"png bytes".to_vec()
        );
    }

    #[tokio::test]
    async fn test_cleanup_skips_kept_path_and_remote() {
        let root = tempfile::tempdir().unwrap();
        let store = store_at(root.path());
        tokio::fs::create_dir_all(store.scratch_dir()).await.unwrap();

        let kept = store.scratch_dir().join("kept.jpg");
        let doomed = store.scratch_dir().join("doomed.jpg");
        tokio::fs::write(&kept, b"a").await.unwrap();
        tokio::fs::write(&doomed, b"b").await.unwrap();

        let rejected = vec![
            ImageCandidate::local(
                kept.to_string_lossy(),
                CandidateOrigin::Frame {
                    timestamp_seconds: 0.05,
                },
            ),
            ImageCandidate::local(
                doomed.to_string_lossy(),
                CandidateOrigin::Frame {
                    timestamp_seconds: 5.0,
                },
            ),
            ImageCandidate::remote("https://example.com/x.jpg", CandidateOrigin::Thumbnail),
        ];

        let keep = kept.to_string_lossy().to_string();
        store.cleanup_rejected(&rejected, Some(&keep)).await;

        assert!(kept.exists());
        assert!(!doomed.exists());
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_missing_files() {
        let root = tempfile::tempdir().unwrap();
        let store = store_at(root.path());
        let rejected = vec![ImageCandidate::local(
            root.path().join("never-existed.jpg").to_string_lossy(),
            CandidateOrigin::Upload,
        )];
        store.cleanup_rejected(&rejected, None).await;
    }

    #[tokio::test]
    async fn test_save_upload_lands_in_scratch() {
        let root = tempfile::tempdir().unwrap();
        let store = store_at(root.path());

        let candidate = store
            .save_upload(b"png bytes", Some("image/png"))
            .await
            .unwrap();

        assert_eq!(candidate.origin, CandidateOrigin::Upload);
        assert!(candidate.is_temporary);
        assert!(candidate.path.ends_with(".png"));
        assert!(Path::new(&candidate.path).starts_with(store.scratch_dir()));
        assert_eq!(
            tokio::fs::read(&candidate.path).await.unwrap(),
            b"png bytes".to_vec()
        );
    }

    #[tokio::test]
    async fn test_replace_file_overwrites_target() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("new.jpg");
        let target = root.path().join("old.jpg");
        tokio::fs::write(&source, b"new").await.unwrap();
        tokio::fs::write(&target, b"old").await.unwrap();

        replace_file(&source, &target).await.unwrap();

        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"new".to_vec());
        assert!(!source.exists());
    }
}
