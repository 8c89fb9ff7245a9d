use std::path::{Path, PathBuf};

use log::debug;

use crate::config::MediaConfig;
use crate::error::IngestError;
use crate::media::{ensure_success, run_tool};

/// How an oversized audio file gets cut for transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPlan {
    pub count: u32,
    pub chunk_seconds: f64,
}

/// Chunk count is the ceiling of size over threshold; each chunk gets an
/// equal share of the duration. Files within the threshold (or with unknown
/// duration, which cannot be cut by time) stay whole.
pub fn plan_chunks(file_size: u64, threshold: u64, duration_seconds: f64) -> ChunkPlan {
    if file_size <= threshold || duration_seconds <= 0.0 {
        return ChunkPlan {
            count: 1,
            chunk_seconds: duration_seconds,
        };
    }
    let count = (file_size as f64 / threshold as f64).ceil() as u32;
    ChunkPlan {
        count,
        chunk_seconds: duration_seconds / count as f64,
    }
}

/// Cut `audio` into `plan.count` pieces with ffmpeg stream copy. Output
/// files land next to nothing permanent; the caller owns `dir`.
pub async fn split_audio(
    config: &MediaConfig,
    audio: &Path,
    plan: &ChunkPlan,
    dir: &Path,
) -> Result<Vec<PathBuf>, IngestError> {
    if plan.count <= 1 {
        return Ok(vec![audio.to_path_buf()]);
    }

    let stem = audio
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string());

    let mut chunks = Vec::with_capacity(plan.count as usize);
    for i in 0..plan.count {
        let start = i as f64 * plan.chunk_seconds;
        let out = dir.join(format!("{}_part{}.mp3", stem, i));
        let args = vec![
            "-ss".to_string(),
            start.to_string(),
            "-i".to_string(),
            audio.to_string_lossy().to_string(),
            "-t".to_string(),
            plan.chunk_seconds.to_string(),
            "-acodec".to_string(),
            "copy".to_string(),
            "-y".to_string(),
            out.to_string_lossy().to_string(),
        ];
        let output = run_tool(&config.ffmpeg_path, &args, config.tool_timeout).await?;
        ensure_success(&output, "audio chunking")?;
        chunks.push(out);
    }

    debug!("Split {} into {} chunks", audio.display(), chunks.len());
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_small_file_stays_whole() {
        let plan = plan_chunks(10 * MB, 24 * MB, 600.0);
        assert_eq!(plan.count, 1);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let plan = plan_chunks(24 * MB, 24 * MB, 600.0);
        assert_eq!(plan.count, 1);
    }

    #[test]
    fn test_oversized_file_chunk_count() {
        // 50 MB over a 24 MB threshold: ceil(50/24) = 3 chunks
        let plan = plan_chunks(50 * MB, 24 * MB, 900.0);
        assert_eq!(plan.count, 3);
        assert_eq!(plan.chunk_seconds, 300.0);
    }

    #[test]
    fn test_just_over_threshold() {
        let plan = plan_chunks(24 * MB + 1, 24 * MB, 120.0);
        assert_eq!(plan.count, 2);
        assert_eq!(plan.chunk_seconds, 60.0);
    }

    #[test]
    fn test_unknown_duration_stays_whole() {
        let plan = plan_chunks(50 * MB, 24 * MB, 0.0);
        assert_eq!(plan.count, 1);
    }
}
