use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// Stable identifier assigned by the recipe store.
pub type RecipeId = u64;

/// How a source URL should be acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Regular web page; HTML is fetched and parsed.
    Text,
    /// Known audio/video platform; content comes from media, not markup.
    VideoAudio,
}

/// One acquisition attempt, built per call and never mutated.
#[derive(Debug, Clone)]
pub struct AcquisitionRequest {
    pub url: String,
    pub kind: SourceKind,
}

/// Metadata probed from a video source before any download.
#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub captions_available: bool,
    pub description: String,
    pub duration_seconds: f64,
}

impl Default for VideoMetadata {
    fn default() -> Self {
        Self {
            title: "Video Recipe".to_string(),
            thumbnail_url: None,
            captions_available: false,
            description: String::new(),
            duration_seconds: 0.0,
        }
    }
}

/// A normalized recipe, the common output of every extraction path.
///
/// Ingredients and instructions are flat strings; nested structures from
/// source data are flattened before they reach this type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedRecipe {
    pub title: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub servings: Option<u32>,
    #[serde(default = "default_yield_unit")]
    pub yield_unit: String,
    pub image_url: Option<String>,
    pub source_url: String,
}

fn default_yield_unit() -> String {
    "servings".to_string()
}

impl ExtractedRecipe {
    /// A recipe is usable only with at least one ingredient and one
    /// instruction. Times, servings and image are optional.
    pub fn is_usable(&self) -> bool {
        self.ingredients.iter().any(|i| !i.trim().is_empty())
            && self.instructions.iter().any(|i| !i.trim().is_empty())
    }
}

/// A persisted recipe plus its cached quantity-tagged instruction rendering.
#[derive(Debug, Clone)]
pub struct StoredRecipe {
    pub id: RecipeId,
    pub recipe: ExtractedRecipe,
    pub instruction_template: Option<Vec<String>>,
}

/// Where an image candidate came from.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOrigin {
    /// The platform-declared thumbnail (remote URL).
    Thumbnail,
    /// A frame captured from the video at the given offset.
    Frame { timestamp_seconds: f64 },
    /// An image scraped from a link in the video description.
    Scraped,
    /// A user-uploaded file.
    Upload,
}

/// A potential recipe image, remote or sitting in scratch storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCandidate {
    /// Remote URL, or a path to a local scratch file.
    pub path: String,
    pub origin: CandidateOrigin,
    /// Local scratch files are temporary until finalized; remote URLs have
    /// nothing on disk to clean up.
    pub is_temporary: bool,
}

impl ImageCandidate {
    pub fn remote(url: impl Into<String>, origin: CandidateOrigin) -> Self {
        Self {
            path: url.into(),
            origin,
            is_temporary: false,
        }
    }

    pub fn local(path: impl Into<String>, origin: CandidateOrigin) -> Self {
        Self {
            path: path.into(),
            origin,
            is_temporary: true,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.path.starts_with("http://") || self.path.starts_with("https://")
    }
}

/// Which transcript tier produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptTier {
    Captions,
    Audio,
    Description,
}

/// Assembled transcript and the tier that won.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    pub tier: TranscriptTier,
}

/// An extracted recipe awaiting image selection, parked in the draft
/// registry until the caller finalizes it.
#[derive(Debug, Clone)]
pub struct DraftRecipe {
    pub draft_id: String,
    pub recipe: ExtractedRecipe,
    /// True when the generative input was cut at the prompt cap; surfaced so
    /// callers can warn that the recipe may be incomplete.
    pub truncated_source: bool,
}

/// Every way an acquisition can end. `Failed` carries the typed error so
/// callers can distinguish rate limiting from schema failures.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// The source URL already has a stored recipe and re-acquisition is off.
    Exists { recipe: StoredRecipe },
    /// A recipe was created; any candidates listed were already resolved.
    Created {
        recipe: StoredRecipe,
        candidates: Vec<ImageCandidate>,
    },
    /// One recipe extracted, several images to choose from.
    NeedsSelection {
        draft: DraftRecipe,
        candidates: Vec<ImageCandidate>,
    },
    /// The source contained several distinct recipes sharing one image pool.
    MultiRecipe {
        drafts: Vec<DraftRecipe>,
        candidates: Vec<ImageCandidate>,
    },
    /// Deterministic extraction declined; generative extraction is needed
    /// and requires an explicit follow-up call.
    AiRequired { message: String },
    /// The acquisition failed outright.
    Failed { error: IngestError },
}
