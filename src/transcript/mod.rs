use log::{debug, info};

use crate::config::MediaConfig;
use crate::error::IngestError;
use crate::media::MediaFetcher;
use crate::model::{Transcript, TranscriptTier, VideoMetadata};
use crate::speech::SpeechToText;

pub mod captions;
pub mod chunking;

/// Builds a transcript for a video source by walking the tiers in order:
/// platform captions, then audio transcription, then the description text.
/// The first tier that yields non-empty text wins; failures inside a tier
/// are logged and the next tier tried.
pub struct TranscriptAssembler<'a> {
    media: &'a dyn MediaFetcher,
    speech: &'a dyn SpeechToText,
    config: &'a MediaConfig,
}

impl<'a> TranscriptAssembler<'a> {
    pub fn new(
        media: &'a dyn MediaFetcher,
        speech: &'a dyn SpeechToText,
        config: &'a MediaConfig,
    ) -> Self {
        Self {
            media,
            speech,
            config,
        }
    }

    pub async fn assemble(
        &self,
        url: &str,
        metadata: &VideoMetadata,
    ) -> Result<Transcript, IngestError> {
        if metadata.captions_available {
            match self.from_captions(url).await {
                Ok(Some(text)) => {
                    info!("Transcript from captions ({} chars)", text.len());
                    return Ok(Transcript {
                        text,
                        tier: TranscriptTier::Captions,
                    });
                }
                Ok(None) => debug!("Caption tier produced no text"),
                Err(e) => debug!("Caption tier failed: {}", e),
            }
        } else {
            debug!("No captions advertised, skipping caption tier");
        }

        match self.from_audio(url, metadata).await {
            Ok(Some(text)) => {
                info!("Transcript from audio ({} chars)", text.len());
                return Ok(Transcript {
                    text,
                    tier: TranscriptTier::Audio,
                });
            }
            Ok(None) => debug!("Audio tier produced no text"),
            Err(e) => debug!("Audio tier failed: {}", e),
        }

        let synthesized = synthesize_from_metadata(metadata);
        if !synthesized.is_empty() {
            info!("Transcript from description ({} chars)", synthesized.len());
            return Ok(Transcript {
                text: synthesized,
                tier: TranscriptTier::Description,
            });
        }

        Err(IngestError::TranscriptExhausted)
    }

    async fn from_captions(&self, url: &str) -> Result<Option<String>, IngestError> {
        let scratch = tempfile::tempdir()?;
        let Some(path) = self.media.download_captions(url, scratch.path()).await? else {
            return Ok(None);
        };
        let raw = tokio::fs::read_to_string(&path).await?;
        let cleaned = captions::clean_caption_text(&raw);
        if cleaned.is_empty() {
            Ok(None)
        } else {
            Ok(Some(cleaned))
        }
    }

    async fn from_audio(
        &self,
        url: &str,
        metadata: &VideoMetadata,
    ) -> Result<Option<String>, IngestError> {
        let scratch = tempfile::tempdir()?;
        let audio = self.media.download_audio(url, scratch.path()).await?;
        let size = tokio::fs::metadata(&audio).await?.len();

        let plan = chunking::plan_chunks(
            size,
            self.config.chunk_threshold_bytes,
            metadata.duration_seconds,
        );
        let chunks = chunking::split_audio(self.config, &audio, &plan, scratch.path()).await?;
        debug!("Transcribing {} audio chunk(s)", chunks.len());

        // concurrent per chunk; try_join_all preserves input order so the
        // concatenation matches the original audio
        let pieces = futures::future::try_join_all(
            chunks.iter().map(|chunk| self.speech.transcribe(chunk)),
        )
        .await?;

        let text = pieces
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }
}

/// Tier 3: the platform description as a stand-in transcript. A bare title
/// carries no recipe content, so an empty description means an empty result.
fn synthesize_from_metadata(metadata: &VideoMetadata) -> String {
    let description = metadata.description.trim();
    if description.is_empty() {
        return String::new();
    }
    format!("{}\n\n{}", metadata.title.trim(), description)
        .trim()
        .to_string()
}
