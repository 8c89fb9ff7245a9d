use std::collections::HashSet;
use std::future::poll_fn;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::time::delay_queue::Key;
use tokio_util::time::DelayQueue;

use crate::config::MediaConfig;
use crate::engine::quantity;
use crate::error::IngestError;
use crate::images::ImageStore;
use crate::media::MediaFetcher;
use crate::model::{ImageCandidate, RecipeId};
use crate::store::{RecipeStore, RecipeUpdate};

/// Work that runs after the caller already has its answer. Tasks are
/// idempotent and carry everything they need by value.
#[derive(Debug)]
pub enum Task {
    /// Cache the quantity-tagged instruction rendering on a stored recipe.
    BackfillTemplate { recipe_id: RecipeId },
    /// Delete rejected candidate files, sparing `keep_path`.
    CleanupCandidates {
        rejected: Vec<ImageCandidate>,
        keep_path: Option<String>,
    },
    /// Replace a finalized low-res frame with a higher-quality capture.
    UpgradeFrame {
        source_url: String,
        timestamp_seconds: f64,
        permanent_path: String,
    },
}

impl Task {
    fn describe(&self) -> &'static str {
        match self {
            Task::BackfillTemplate { .. } => "template backfill",
            Task::CleanupCandidates { .. } => "candidate cleanup",
            Task::UpgradeFrame { .. } => "frame upgrade",
        }
    }
}

/// Resources the worker owns outright. Tasks run after the originating
/// request is gone, so nothing here is borrowed from one.
#[derive(Clone)]
pub struct TaskContext {
    pub store: Arc<dyn RecipeStore>,
    pub images: Arc<ImageStore>,
    pub media: Arc<dyn MediaFetcher>,
    pub media_config: Arc<MediaConfig>,
}

enum Command {
    Run { task: Task, delay: Duration },
    Drain,
}

/// Fire-and-forget scheduler. A single worker holds a [`DelayQueue`] and
/// spawns each task when its deadline passes; results are never reported back
/// to the enqueuer, failures only reach the log.
pub struct TaskScheduler {
    sender: mpsc::UnboundedSender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TaskScheduler {
    /// Start the worker. Must be called on a tokio runtime.
    pub fn new(context: TaskContext) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(receiver, context));
        Self {
            sender,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue a task for immediate execution.
    pub fn enqueue(&self, task: Task) {
        self.enqueue_after(task, Duration::ZERO);
    }

    /// Queue a task to run once `delay` has passed.
    pub fn enqueue_after(&self, task: Task, delay: Duration) {
        if self
            .sender
            .send(Command::Run { task, delay })
            .is_err()
        {
            warn!("Task scheduler already shut down; dropping task");
        }
    }

    /// Run everything still queued, ignoring any remaining delay, and wait
    /// for in-flight tasks to finish. The CLI calls this before exiting;
    /// tests call it to observe task effects deterministically.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(Command::Drain);
        if let Some(worker) = self.worker.lock().await.take() {
            let _ = worker.await;
        }
    }
}

async fn run_worker(mut receiver: mpsc::UnboundedReceiver<Command>, context: TaskContext) {
    let mut queue: DelayQueue<Task> = DelayQueue::new();
    let mut pending: HashSet<Key> = HashSet::new();
    let mut running = JoinSet::new();

    loop {
        tokio::select! {
            command = receiver.recv() => match command {
                Some(Command::Run { task, delay }) => {
                    debug!("Queued {} (delay {:?})", task.describe(), delay);
                    pending.insert(queue.insert(task, delay));
                }
                // A closed channel drains the same way an explicit request does.
                Some(Command::Drain) | None => break,
            },
            Some(expired) = poll_fn(|cx| queue.poll_expired(cx)), if !queue.is_empty() => {
                pending.remove(&expired.key());
                let task = expired.into_inner();
                let context = context.clone();
                running.spawn(async move { run_task(task, &context).await });
            }
            Some(result) = running.join_next(), if !running.is_empty() => {
                if let Err(e) = result {
                    warn!("Background task panicked: {}", e);
                }
            }
        }
    }

    // Drain: pull every remaining deadline forward and run the stragglers so
    // the shutdown caller sees their effects.
    for key in pending.drain() {
        queue.reset(&key, Duration::ZERO);
    }
    while let Some(expired) = poll_fn(|cx| queue.poll_expired(cx)).await {
        run_task(expired.into_inner(), &context).await;
    }
    while running.join_next().await.is_some() {}
}

async fn run_task(task: Task, context: &TaskContext) {
    let name = task.describe();
    debug!("Running {}", name);
    if let Err(e) = execute(task, context).await {
        warn!("Background {} failed: {}", name, e);
    }
}

async fn execute(task: Task, context: &TaskContext) -> Result<(), IngestError> {
    match task {
        Task::BackfillTemplate { recipe_id } => backfill_template(recipe_id, context).await,
        Task::CleanupCandidates {
            rejected,
            keep_path,
        } => {
            context
                .images
                .cleanup_rejected(&rejected, keep_path.as_deref())
                .await;
            Ok(())
        }
        Task::UpgradeFrame {
            source_url,
            timestamp_seconds,
            permanent_path,
        } => {
            context
                .images
                .upgrade_frame(
                    context.media.as_ref(),
                    &context.media_config,
                    &source_url,
                    timestamp_seconds,
                    &permanent_path,
                )
                .await;
            Ok(())
        }
    }
}

/// Derive and cache the `[[qty:...]]`-tagged instructions. Records that
/// already carry a template are left alone, so re-enqueueing is harmless.
async fn backfill_template(recipe_id: RecipeId, context: &TaskContext) -> Result<(), IngestError> {
    let stored = context
        .store
        .get_recipe(recipe_id)
        .await?
        .ok_or_else(|| IngestError::Store(format!("recipe {} not found", recipe_id)))?;

    if stored.instruction_template.is_some() {
        debug!("Recipe {} already has an instruction template", recipe_id);
        return Ok(());
    }

    let template = quantity::tag_instructions(&stored.recipe.instructions);
    context
        .store
        .update_recipe(
            recipe_id,
            RecipeUpdate {
                instruction_template: Some(Some(template)),
                ..Default::default()
            },
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    use async_trait::async_trait;

    use crate::config::{ClipStrategyConfig, FetcherConfig, ImagesConfig};
    use crate::fetch::PageFetcher;
    use crate::model::{CandidateOrigin, ExtractedRecipe, VideoMetadata};
    use crate::store::MemoryStore;

    struct UnusedMedia;

    #[async_trait]
    impl MediaFetcher for UnusedMedia {
        async fn probe(&self, _url: &str) -> Result<VideoMetadata, IngestError> {
            Err(IngestError::MediaTool("not used".to_string()))
        }

        async fn download_captions(
            &self,
            _url: &str,
            _dir: &Path,
        ) -> Result<Option<PathBuf>, IngestError> {
            Err(IngestError::MediaTool("not used".to_string()))
        }

        async fn download_audio(&self, _url: &str, _dir: &Path) -> Result<PathBuf, IngestError> {
            Err(IngestError::MediaTool("not used".to_string()))
        }

        async fn download_clip(
            &self,
            _url: &str,
            _strategy: &ClipStrategyConfig,
            _max_seconds: f64,
            _dir: &Path,
        ) -> Result<PathBuf, IngestError> {
            Err(IngestError::MediaTool("not used".to_string()))
        }
    }

    fn context_at(root: &Path, store: Arc<MemoryStore>) -> TaskContext {
        let images_config = ImagesConfig {
            scratch_dir: root.join("candidates").to_string_lossy().to_string(),
            permanent_dir: root.join("permanent").to_string_lossy().to_string(),
            cleanup_delay: 0,
        };
        TaskContext {
            store,
            images: Arc::new(ImageStore::new(
                &images_config,
                PageFetcher::new(&FetcherConfig::default()),
            )),
            media: Arc::new(UnusedMedia),
            media_config: Arc::new(MediaConfig::default()),
        }
    }

    fn recipe_with_quantities() -> ExtractedRecipe {
        ExtractedRecipe {
            title: "Pancakes".to_string(),
            ingredients: vec!["2 cups flour".to_string()],
            instructions: vec![
                "Add 2 cups of flour.".to_string(),
                "Bake at 350 degrees for 20 minutes.".to_string(),
            ],
            source_url: "https://example.com/pancakes".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_backfill_derives_template() {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let id = store.create_recipe(&recipe_with_quantities()).await.unwrap();
        let context = context_at(root.path(), Arc::clone(&store));

        let scheduler = TaskScheduler::new(context);
        scheduler.enqueue(Task::BackfillTemplate { recipe_id: id });
        scheduler.shutdown().await;

        let stored = store.get_recipe(id).await.unwrap().unwrap();
        let template = stored.instruction_template.unwrap();
        assert_eq!(template[0], "Add [[qty:2]] cups of flour.");
        // temperatures and durations stay untouched
        assert_eq!(template[1], "Bake at 350 degrees for 20 minutes.");
    }

    #[tokio::test]
    async fn test_backfill_skips_existing_template() {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let id = store.create_recipe(&recipe_with_quantities()).await.unwrap();
        store
            .update_recipe(
                id,
                RecipeUpdate {
                    instruction_template: Some(Some(vec!["hand-written".to_string()])),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let context = context_at(root.path(), Arc::clone(&store));

        let scheduler = TaskScheduler::new(context);
        scheduler.enqueue(Task::BackfillTemplate { recipe_id: id });
        scheduler.shutdown().await;

        let stored = store.get_recipe(id).await.unwrap().unwrap();
        assert_eq!(
            stored.instruction_template,
            Some(vec!["hand-written".to_string()])
        );
    }

    #[tokio::test]
    async fn test_shutdown_drains_delayed_cleanup() {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let context = context_at(root.path(), store);

        let scratch = context.images.scratch_dir().to_path_buf();
        tokio::fs::create_dir_all(&scratch).await.unwrap();
        let kept = scratch.join("kept.jpg");
        let doomed = scratch.join("doomed.jpg");
        tokio::fs::write(&kept, b"a").await.unwrap();
        tokio::fs::write(&doomed, b"b").await.unwrap();

        let scheduler = TaskScheduler::new(context);
        scheduler.enqueue_after(
            Task::CleanupCandidates {
                rejected: vec![
                    ImageCandidate::local(kept.to_string_lossy(), CandidateOrigin::Upload),
                    ImageCandidate::local(doomed.to_string_lossy(), CandidateOrigin::Upload),
                ],
                keep_path: Some(kept.to_string_lossy().to_string()),
            },
            // far enough out that only the drain can run it
            Duration::from_secs(600),
        );
        scheduler.shutdown().await;

        assert!(kept.exists());
        assert!(!doomed.exists());
    }

    #[tokio::test]
    async fn test_failed_task_does_not_stop_the_worker() {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let id = store.create_recipe(&recipe_with_quantities()).await.unwrap();
        let context = context_at(root.path(), Arc::clone(&store));

        let scheduler = TaskScheduler::new(context);
        scheduler.enqueue(Task::BackfillTemplate { recipe_id: 9999 });
        scheduler.enqueue(Task::BackfillTemplate { recipe_id: id });
        scheduler.shutdown().await;

        let stored = store.get_recipe(id).await.unwrap().unwrap();
        assert!(stored.instruction_template.is_some());
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_is_dropped() {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let id = store.create_recipe(&recipe_with_quantities()).await.unwrap();
        let context = context_at(root.path(), Arc::clone(&store));

        let scheduler = TaskScheduler::new(context);
        scheduler.shutdown().await;
        scheduler.enqueue(Task::BackfillTemplate { recipe_id: id });
        scheduler.shutdown().await;

        let stored = store.get_recipe(id).await.unwrap().unwrap();
        assert!(stored.instruction_template.is_none());
    }
}
