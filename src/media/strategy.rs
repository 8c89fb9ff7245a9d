use std::path::{Path, PathBuf};

use log::{debug, info};

use super::MediaFetcher;
use crate::config::ClipStrategyConfig;

/// Try each clip download strategy in order and return the first non-empty
/// file. A strategy that errors, or that leaves a zero-byte file, is
/// discarded (the file deleted) and the next one tried. `None` when every
/// strategy is exhausted; callers degrade to thumbnail-only candidates.
pub async fn download_clip_with_strategies(
    fetcher: &dyn MediaFetcher,
    url: &str,
    strategies: &[ClipStrategyConfig],
    max_seconds: f64,
    dir: &Path,
) -> Option<PathBuf> {
    for strategy in strategies {
        match fetcher.download_clip(url, strategy, max_seconds, dir).await {
            Ok(path) => {
                let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
                if size == 0 {
                    debug!("Clip strategy '{}' produced an empty file", strategy.name);
                    tokio::fs::remove_file(&path).await.ok();
                    continue;
                }
                debug!(
                    "Clip strategy '{}' succeeded ({} bytes)",
                    strategy.name, size
                );
                return Some(path);
            }
            Err(e) => {
                debug!("Clip strategy '{}' failed: {}", strategy.name, e);
            }
        }
    }

    info!("All clip strategies exhausted for {}", url);
    None
}
