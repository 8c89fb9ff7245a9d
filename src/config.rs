use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;

/// Top-level configuration for the acquisition pipeline
#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Default generative provider to use when not specified
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Map of provider name to provider configuration
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// HTTP fetching configuration
    #[serde(default)]
    pub fetcher: FetcherConfig,
    /// Speech-to-text configuration
    #[serde(default)]
    pub speech: SpeechConfig,
    /// Media tooling (yt-dlp / ffmpeg) configuration
    #[serde(default)]
    pub media: MediaConfig,
    /// Image candidate storage configuration
    #[serde(default)]
    pub images: ImagesConfig,
    /// Generative engine configuration
    #[serde(default)]
    pub engine: EngineConfig,
    /// Orchestration policy
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Configuration for a specific generative provider
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    /// Whether this provider is enabled
    pub enabled: bool,
    /// Model identifier (e.g., "gpt-4o-mini", "claude-3-5-haiku-latest")
    pub model: String,
    /// Temperature for generation (0.0-1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// API key for authentication (can also be set via environment variable)
    pub api_key: Option<String>,
    /// Base URL for API endpoint (for proxies or OpenAI-compatible vendors)
    pub base_url: Option<String>,
}

/// Configuration for page fetching
#[derive(Debug, Deserialize, Clone)]
pub struct FetcherConfig {
    /// Request timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub timeout: u64,
    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Configuration for audio transcription
#[derive(Debug, Deserialize, Clone)]
pub struct SpeechConfig {
    /// Transcription model identifier
    #[serde(default = "default_speech_model")]
    pub model: String,
    /// API key (falls back to the OPENAI_API_KEY environment variable)
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible transcription endpoint
    #[serde(default = "default_speech_base_url")]
    pub base_url: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            model: default_speech_model(),
            api_key: None,
            base_url: default_speech_base_url(),
        }
    }
}

/// Configuration for media retrieval subprocesses
#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    /// Path to the yt-dlp binary
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,
    /// Path to the ffmpeg binary
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    /// Timeout for metadata/caption/clip subprocess calls, in seconds
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout: u64,
    /// Timeout for audio downloads, which can run long, in seconds
    #[serde(default = "default_audio_timeout")]
    pub audio_timeout: u64,
    /// Audio files above this size are split into chunks for transcription
    #[serde(default = "default_chunk_threshold_bytes")]
    pub chunk_threshold_bytes: u64,
    /// How many leading seconds of video to download for frame capture
    #[serde(default = "default_clip_seconds")]
    pub clip_seconds: f64,
    /// Timestamps (seconds) at which frames are captured from the clip
    #[serde(default = "default_frame_offsets")]
    pub frame_offsets: Vec<f64>,
    /// Ordered download strategies for the low-resolution clip
    #[serde(default = "default_clip_strategies")]
    pub clip_strategies: Vec<ClipStrategyConfig>,
    /// Format selector used when re-fetching a frame at higher quality
    #[serde(default = "default_upgrade_format")]
    pub upgrade_format: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: default_ytdlp_path(),
            ffmpeg_path: default_ffmpeg_path(),
            tool_timeout: default_tool_timeout(),
            audio_timeout: default_audio_timeout(),
            chunk_threshold_bytes: default_chunk_threshold_bytes(),
            clip_seconds: default_clip_seconds(),
            frame_offsets: default_frame_offsets(),
            clip_strategies: default_clip_strategies(),
            upgrade_format: default_upgrade_format(),
        }
    }
}

/// One attempt profile for downloading the frame-capture clip
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ClipStrategyConfig {
    /// Label used in logs
    pub name: String,
    /// yt-dlp format selector
    pub format: String,
    /// Optional extractor player client (e.g. "ios", "android")
    pub player_client: Option<String>,
}

/// Configuration for image candidate storage
#[derive(Debug, Deserialize, Clone)]
pub struct ImagesConfig {
    /// Directory holding not-yet-chosen candidate files
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,
    /// Directory holding finalized recipe images
    #[serde(default = "default_permanent_dir")]
    pub permanent_dir: String,
    /// Grace period before rejected candidates are deleted, in seconds
    #[serde(default = "default_cleanup_delay")]
    pub cleanup_delay: u64,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            permanent_dir: default_permanent_dir(),
            cleanup_delay: default_cleanup_delay(),
        }
    }
}

/// Configuration for the generative extraction engine
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Source text beyond this many characters is truncated before prompting
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

/// Orchestration policy knobs
#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// When false (the default), a source URL that already has a stored
    /// recipe short-circuits to Exists. When true, acquisition re-runs and
    /// replaces the stored content in place.
    #[serde(default)]
    pub reacquire_existing: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reacquire_existing: false,
        }
    }
}

// Default value functions
fn default_provider() -> String {
    "openai".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_fetch_timeout() -> u64 {
    15
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_speech_model() -> String {
    "whisper-1".to_string()
}

fn default_speech_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_tool_timeout() -> u64 {
    60
}

fn default_audio_timeout() -> u64 {
    300
}

fn default_chunk_threshold_bytes() -> u64 {
    24 * 1024 * 1024
}

fn default_clip_seconds() -> f64 {
    20.0
}

fn default_frame_offsets() -> Vec<f64> {
    vec![0.05, 5.0, 10.0, 15.0]
}

fn default_clip_strategies() -> Vec<ClipStrategyConfig> {
    vec![
        ClipStrategyConfig {
            name: "low-res".to_string(),
            format: "best[height<=360]/worst".to_string(),
            player_client: None,
        },
        ClipStrategyConfig {
            name: "ios-client".to_string(),
            format: "best[height<=360]/worst".to_string(),
            player_client: Some("ios".to_string()),
        },
        ClipStrategyConfig {
            name: "android-client".to_string(),
            format: "worst".to_string(),
            player_client: Some("android".to_string()),
        },
    ]
}

fn default_upgrade_format() -> String {
    "best[height<=1080]/best".to_string()
}

fn default_scratch_dir() -> String {
    "images/recipes/candidates".to_string()
}

fn default_permanent_dir() -> String {
    "images/recipes".to_string()
}

fn default_cleanup_delay() -> u64 {
    600
}

fn default_max_prompt_chars() -> usize {
    50_000
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            providers: HashMap::new(),
            fetcher: FetcherConfig::default(),
            speech: SpeechConfig::default(),
            media: MediaConfig::default(),
            images: ImagesConfig::default(),
            engine: EngineConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables with RECIPE_INGEST__ prefix
    /// 2. config.toml file in current directory
    /// 3. Default values
    ///
    /// Environment variable format: RECIPE_INGEST__PROVIDERS__OPENAI__API_KEY
    pub fn load() -> Result<Self, ConfigError> {
        load_config()
    }
}

/// Load configuration from file and environment variables
///
/// See [`IngestConfig::load`].
pub fn load_config() -> Result<IngestConfig, ConfigError> {
    let settings = Config::builder()
        // Optional config file (can be missing)
        .add_source(File::with_name("config").required(false))
        // Use double underscore for nested: RECIPE_INGEST__PROVIDERS__OPENAI__API_KEY
        .add_source(
            Environment::with_prefix("RECIPE_INGEST")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}
