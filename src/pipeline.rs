use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use scraper::{Html, Selector};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::classify;
use crate::config::IngestConfig;
use crate::engine::{EngineOutput, GenerativeEngine, SourceContext};
use crate::error::IngestError;
use crate::extract;
use crate::fetch::PageFetcher;
use crate::images::{CandidateAssembler, ImageStore};
use crate::media::MediaFetcher;
use crate::model::{
    AcquisitionRequest, CandidateOrigin, DraftRecipe, ExtractedRecipe, ImageCandidate,
    PipelineOutcome, RecipeId, SourceKind, StoredRecipe, VideoMetadata,
};
use crate::speech::SpeechToText;
use crate::store::{RecipeStore, RecipeUpdate};
use crate::tasks::{Task, TaskContext, TaskScheduler};
use crate::transcript::TranscriptAssembler;

const AI_MESSAGE: &str = "Standard scraping failed. Would you like to try with AI?";
const VIDEO_AI_MESSAGE: &str =
    "Video sources skip standard scraping. Would you like to try with AI?";

/// Drives a URL through the acquisition tiers and owns the shared state the
/// tiers cannot: the stored-recipe check, the draft registry awaiting image
/// selection, and the background task queue.
pub struct Pipeline {
    config: IngestConfig,
    fetcher: PageFetcher,
    media: Arc<dyn MediaFetcher>,
    speech: Arc<dyn SpeechToText>,
    engine: GenerativeEngine,
    store: Arc<dyn RecipeStore>,
    images: Arc<ImageStore>,
    scheduler: TaskScheduler,
    drafts: Mutex<HashMap<String, DraftRecipe>>,
}

impl Pipeline {
    /// Wire up the orchestrator. The background scheduler starts here and
    /// owns clones of the shared resources, so its tasks keep running after
    /// a request's borrows are gone.
    pub fn new(
        config: IngestConfig,
        fetcher: PageFetcher,
        media: Arc<dyn MediaFetcher>,
        speech: Arc<dyn SpeechToText>,
        engine: GenerativeEngine,
        store: Arc<dyn RecipeStore>,
        images: Arc<ImageStore>,
    ) -> Self {
        let scheduler = TaskScheduler::new(TaskContext {
            store: Arc::clone(&store),
            images: Arc::clone(&images),
            media: Arc::clone(&media),
            media_config: Arc::new(config.media.clone()),
        });

        Self {
            config,
            fetcher,
            media,
            speech,
            engine,
            store,
            images,
            scheduler,
            drafts: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire a URL through the deterministic path. Never returns an error:
    /// anything unrecoverable folds into [`PipelineOutcome::Failed`].
    pub async fn acquire(&self, url: &str) -> PipelineOutcome {
        match self.try_acquire(url).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!("Acquisition failed for {}: {}", url, error);
                PipelineOutcome::Failed { error }
            }
        }
    }

    async fn try_acquire(&self, url: &str) -> Result<PipelineOutcome, IngestError> {
        let replace = match self.existing_recipe(url).await? {
            Existing::ShortCircuit(stored) => {
                return Ok(PipelineOutcome::Exists { recipe: stored })
            }
            Existing::Replace(id) => Some(id),
            Existing::None => None,
        };

        let request = AcquisitionRequest {
            url: url.to_string(),
            kind: classify::source_kind(url),
        };
        if request.kind == SourceKind::VideoAudio {
            debug!("{} is a media URL; library extraction skipped", request.url);
            return Ok(PipelineOutcome::AiRequired {
                message: VIDEO_AI_MESSAGE.to_string(),
            });
        }

        let html = self.fetcher.fetch_html(&request.url).await?;
        match extract::run(&request.url, &html) {
            Ok(mut recipe) => {
                self.attach_remote_image(&mut recipe).await;
                let stored = self.persist(&recipe, replace).await?;
                info!("Created recipe #{} \"{}\"", stored.id, stored.recipe.title);
                Ok(PipelineOutcome::Created {
                    recipe: stored,
                    candidates: Vec::new(),
                })
            }
            Err(e) => {
                if e.is_not_supported() {
                    debug!("No structured recipe data on {}", url);
                } else {
                    warn!("Library extraction failed for {}: {}", url, e);
                }
                Ok(PipelineOutcome::AiRequired {
                    message: AI_MESSAGE.to_string(),
                })
            }
        }
    }

    /// Run the generative path, once the caller has accepted the AI prompt.
    /// Failures fold into [`PipelineOutcome::Failed`].
    pub async fn acquire_generative(&self, url: &str) -> PipelineOutcome {
        match self.try_acquire_generative(url).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!("Generative acquisition failed for {}: {}", url, error);
                PipelineOutcome::Failed { error }
            }
        }
    }

    /// Typed variant of [`Self::acquire_generative`] for callers that branch
    /// on the error, e.g. to surface a rate-limit wait separately.
    pub async fn try_acquire_generative(
        &self,
        url: &str,
    ) -> Result<PipelineOutcome, IngestError> {
        let replace = match self.existing_recipe(url).await? {
            Existing::ShortCircuit(stored) => {
                return Ok(PipelineOutcome::Exists { recipe: stored })
            }
            Existing::Replace(id) => Some(id),
            Existing::None => None,
        };

        let (output, metadata) = self.run_engine(url).await?;
        let candidates = match &metadata {
            Some(metadata) => self.assemble_candidates(url, metadata).await,
            None => Vec::new(),
        };
        self.fold_outcome(output, candidates, replace).await
    }

    /// Resolve a parked draft: move the chosen image into permanent storage,
    /// persist the recipe, and queue cleanup of the leftovers. Removing the
    /// draft under the registry lock makes finalization exclusive per draft;
    /// a second call for the same id gets [`IngestError::UnknownDraft`].
    pub async fn finalize_selection(
        &self,
        draft_id: &str,
        chosen: Option<ImageCandidate>,
        rejected: Vec<ImageCandidate>,
    ) -> Result<StoredRecipe, IngestError> {
        let draft = self
            .drafts
            .lock()
            .await
            .remove(draft_id)
            .ok_or_else(|| IngestError::UnknownDraft(draft_id.to_string()))?;

        let mut recipe = draft.recipe;
        let mut keep_path = None;
        let mut frame_upgrade = None;

        if let Some(candidate) = &chosen {
            // The chosen file is never deleted, even when the move fails.
            keep_path = Some(candidate.path.clone());
            match self.images.finalize(candidate).await {
                Ok(path) => {
                    if let CandidateOrigin::Frame { timestamp_seconds } = candidate.origin {
                        frame_upgrade = Some((timestamp_seconds, path.clone()));
                    }
                    recipe.image_url = Some(path);
                }
                Err(e) => {
                    warn!("Could not finalize candidate {}: {}", candidate.path, e);
                }
            }
        }

        let stored = self.persist(&recipe, None).await?;
        info!(
            "Finalized draft {} as recipe #{} \"{}\"",
            draft_id, stored.id, stored.recipe.title
        );

        self.scheduler.enqueue_after(
            Task::CleanupCandidates {
                rejected,
                keep_path,
            },
            Duration::from_secs(self.config.images.cleanup_delay),
        );
        if let Some((timestamp_seconds, permanent_path)) = frame_upgrade {
            self.scheduler.enqueue(Task::UpgradeFrame {
                source_url: stored.recipe.source_url.clone(),
                timestamp_seconds,
                permanent_path,
            });
        }

        Ok(stored)
    }

    /// Re-run generative extraction for a stored recipe and update it in
    /// place. When the source yields several recipes the first one wins. The
    /// cached instruction template is cleared and re-derived.
    pub async fn reextract(&self, recipe_id: RecipeId) -> Result<StoredRecipe, IngestError> {
        let stored = self
            .store
            .get_recipe(recipe_id)
            .await?
            .ok_or_else(|| IngestError::Store(format!("recipe {} not found", recipe_id)))?;
        let url = stored.recipe.source_url;

        let (output, _metadata) = self.run_engine(&url).await?;
        let mut recipe = output
            .recipes
            .into_iter()
            .next()
            .ok_or_else(|| IngestError::Schema("no recipes returned".to_string()))?;
        self.attach_remote_image(&mut recipe).await;

        self.persist(&recipe, Some(recipe_id)).await
    }

    /// Flush the background queue and wait for its tasks. Call once no more
    /// work will be enqueued; the CLI does this before exiting.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }

    async fn existing_recipe(&self, url: &str) -> Result<Existing, IngestError> {
        match self.store.get_recipe_by_source_url(url).await? {
            Some(stored) if !self.config.pipeline.reacquire_existing => {
                info!("Recipe for {} already stored as #{}", url, stored.id);
                Ok(Existing::ShortCircuit(stored))
            }
            Some(stored) => {
                debug!("Re-acquiring {} over stored recipe #{}", url, stored.id);
                Ok(Existing::Replace(stored.id))
            }
            None => Ok(Existing::None),
        }
    }

    /// Produce engine output for a URL, plus the probed metadata when the
    /// source was a video (callers use it to assemble image candidates).
    async fn run_engine(
        &self,
        url: &str,
    ) -> Result<(EngineOutput, Option<VideoMetadata>), IngestError> {
        let request = AcquisitionRequest {
            url: url.to_string(),
            kind: classify::source_kind(url),
        };
        match request.kind {
            SourceKind::Text => {
                let html = self.fetcher.fetch_html(&request.url).await?;
                let text = page_text(&html);
                debug!(
                    "Extracted {} chars of page text from {}",
                    text.len(),
                    request.url
                );
                let output = self.engine.extract(&request.url, &text, None).await?;
                Ok((output, None))
            }
            SourceKind::VideoAudio => {
                let metadata = self.media.probe(&request.url).await?;
                info!(
                    "Probed \"{}\" ({:.0}s of video)",
                    metadata.title, metadata.duration_seconds
                );
                let assembler = TranscriptAssembler::new(
                    self.media.as_ref(),
                    self.speech.as_ref(),
                    &self.config.media,
                );
                let transcript = assembler.assemble(&request.url, &metadata).await?;
                let context = SourceContext {
                    title: metadata.title.clone(),
                    description: metadata.description.clone(),
                };
                let output = self
                    .engine
                    .extract(&request.url, &transcript.text, Some(&context))
                    .await?;
                Ok((output, Some(metadata)))
            }
        }
    }

    async fn assemble_candidates(
        &self,
        url: &str,
        metadata: &VideoMetadata,
    ) -> Vec<ImageCandidate> {
        CandidateAssembler::new(
            self.media.as_ref(),
            &self.fetcher,
            &self.images,
            &self.config.media,
        )
        .assemble(url, metadata)
        .await
    }

    /// Sort one engine output into the created/needs-selection/multi-recipe
    /// arms. A single recipe with at most one candidate resolves immediately;
    /// anything else parks drafts for an explicit finalize call.
    async fn fold_outcome(
        &self,
        output: EngineOutput,
        candidates: Vec<ImageCandidate>,
        replace: Option<RecipeId>,
    ) -> Result<PipelineOutcome, IngestError> {
        let truncated = output.truncated;
        let mut recipes = output.recipes;

        if recipes.len() > 1 {
            let drafts = self.register_drafts(recipes, truncated).await;
            info!(
                "Extracted {} recipes; awaiting per-recipe finalize",
                drafts.len()
            );
            return Ok(PipelineOutcome::MultiRecipe { drafts, candidates });
        }

        let mut recipe = recipes
            .pop()
            .ok_or_else(|| IngestError::Schema("no recipes returned".to_string()))?;

        if candidates.len() > 1 {
            let draft = self.register_draft(recipe, truncated).await;
            info!(
                "Extracted \"{}\"; {} image candidates to choose from",
                draft.recipe.title,
                candidates.len()
            );
            return Ok(PipelineOutcome::NeedsSelection { draft, candidates });
        }

        // Zero or one candidate: nothing to choose, resolve inline.
        if let Some(candidate) = candidates.first() {
            match self.images.finalize(candidate).await {
                Ok(path) => {
                    if let CandidateOrigin::Frame { timestamp_seconds } = candidate.origin {
                        self.scheduler.enqueue(Task::UpgradeFrame {
                            source_url: recipe.source_url.clone(),
                            timestamp_seconds,
                            permanent_path: path.clone(),
                        });
                    }
                    recipe.image_url = Some(path);
                }
                Err(e) => warn!("Could not finalize sole candidate: {}", e),
            }
        } else {
            self.attach_remote_image(&mut recipe).await;
        }

        let stored = self.persist(&recipe, replace).await?;
        info!("Created recipe #{} \"{}\"", stored.id, stored.recipe.title);
        Ok(PipelineOutcome::Created {
            recipe: stored,
            candidates,
        })
    }

    /// Create the record, or replace an existing one in place when
    /// re-acquisition targets it. Either way the template backfill runs
    /// afterwards.
    async fn persist(
        &self,
        recipe: &ExtractedRecipe,
        replace: Option<RecipeId>,
    ) -> Result<StoredRecipe, IngestError> {
        let stored = match replace {
            Some(id) => {
                self.store
                    .update_recipe(
                        id,
                        RecipeUpdate {
                            recipe: Some(recipe.clone()),
                            instruction_template: Some(None),
                            ..Default::default()
                        },
                    )
                    .await?;
                self.store.get_recipe(id).await?.ok_or_else(|| {
                    IngestError::Store(format!("recipe {} vanished during update", id))
                })?
            }
            None => {
                let id = self.store.create_recipe(recipe).await?;
                StoredRecipe {
                    id,
                    recipe: recipe.clone(),
                    instruction_template: None,
                }
            }
        };

        self.scheduler.enqueue(Task::BackfillTemplate {
            recipe_id: stored.id,
        });
        Ok(stored)
    }

    /// Pull a remote image straight into permanent storage and point the
    /// recipe at the local path. On download failure the remote URL stays;
    /// an unreachable image is not worth losing the recipe over.
    async fn attach_remote_image(&self, recipe: &mut ExtractedRecipe) {
        let Some(url) = recipe.image_url.clone() else {
            return;
        };
        if !url.starts_with("http") {
            return;
        }
        let candidate = ImageCandidate::remote(&url, CandidateOrigin::Scraped);
        match self.images.finalize(&candidate).await {
            Ok(path) => recipe.image_url = Some(path),
            Err(e) => warn!("Could not download image {}: {}", url, e),
        }
    }

    async fn register_draft(&self, recipe: ExtractedRecipe, truncated: bool) -> DraftRecipe {
        let draft = DraftRecipe {
            draft_id: Uuid::new_v4().to_string(),
            recipe,
            truncated_source: truncated,
        };
        self.drafts
            .lock()
            .await
            .insert(draft.draft_id.clone(), draft.clone());
        draft
    }

    async fn register_drafts(
        &self,
        recipes: Vec<ExtractedRecipe>,
        truncated: bool,
    ) -> Vec<DraftRecipe> {
        let mut drafts = Vec::with_capacity(recipes.len());
        for recipe in recipes {
            drafts.push(self.register_draft(recipe, truncated).await);
        }
        drafts
    }
}

enum Existing {
    ShortCircuit(StoredRecipe),
    Replace(RecipeId),
    None,
}

/// Flatten a page to the text of its `<body>`: the fallback feed for the
/// generative engine when no structured data exists.
fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let selector = Selector::parse("body").expect("static selector");
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}
