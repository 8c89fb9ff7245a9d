pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod images;
pub mod media;
pub mod model;
pub mod pipeline;
pub mod speech;
pub mod store;
pub mod tasks;
pub mod transcript;

use std::sync::Arc;

pub use config::IngestConfig;
pub use error::IngestError;
pub use model::{ExtractedRecipe, ImageCandidate, PipelineOutcome, StoredRecipe};
pub use pipeline::Pipeline;

use engine::{GenerativeEngine, ProviderFactory};
use fetch::PageFetcher;
use images::ImageStore;
use media::YtDlpFetcher;
use speech::WhisperClient;
use store::MemoryStore;

/// Build a pipeline wired with the collaborators `config` describes: yt-dlp
/// media retrieval, Whisper transcription, the configured completion provider,
/// and an in-memory store.
pub fn build_pipeline(config: IngestConfig) -> Result<Pipeline, IngestError> {
    let fetcher = PageFetcher::new(&config.fetcher);
    let images = Arc::new(ImageStore::new(&config.images, fetcher.clone()));
    let media = Arc::new(YtDlpFetcher::new(config.media.clone()));
    let speech = Arc::new(WhisperClient::new(&config.speech)?);
    let provider = ProviderFactory::get_default_provider(&config)?;
    let engine = GenerativeEngine::new(provider, &config.engine);
    let store = Arc::new(MemoryStore::new());

    Ok(Pipeline::new(
        config, fetcher, media, speech, engine, store, images,
    ))
}

/// One-shot acquisition: load configuration, build a pipeline, run the
/// requested path, and flush background work before returning.
pub async fn acquire_url(url: &str, generative: bool) -> Result<PipelineOutcome, IngestError> {
    let pipeline = build_pipeline(IngestConfig::load()?)?;
    let outcome = if generative {
        pipeline.acquire_generative(url).await
    } else {
        pipeline.acquire(url).await
    };
    pipeline.shutdown().await;
    Ok(outcome)
}
