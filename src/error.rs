use thiserror::Error;

/// Errors that can occur while acquiring and normalizing a recipe
#[derive(Error, Debug)]
pub enum IngestError {
    /// The page carries no structured recipe data this crate understands.
    /// Expected outcome for most video platforms and JS-rendered sites;
    /// callers treat it as the trigger for the generative path.
    #[error("No structured recipe data found on this page")]
    NotSupported,

    /// Failed to fetch a URL
    #[error("Failed to fetch URL: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Every transcript tier came back empty
    #[error("No transcript could be produced for this source")]
    TranscriptExhausted,

    /// Model output did not match the required recipe shape
    #[error("Recipe extraction returned invalid data: {0}")]
    Schema(String),

    /// Upstream provider rejected the request for quota reasons
    #[error("Rate limited by provider{}", retry_after_secs.map(|s| format!(" (retry after {}s)", s)).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    /// Provider returned a non-success status
    #[error("Provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// A media subprocess (yt-dlp, ffmpeg) failed or timed out
    #[error("Media tool error: {0}")]
    MediaTool(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persistence layer error
    #[error("Store error: {0}")]
    Store(String),

    /// Finalization referenced a draft that is gone or never existed
    #[error("Unknown draft: {0}")]
    UnknownDraft(String),

    /// Error parsing HTTP headers
    #[error("Header parse error: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl IngestError {
    /// Errors that mean "this path declined", not "this path broke".
    pub fn is_not_supported(&self) -> bool {
        matches!(self, IngestError::NotSupported)
    }
}

/// Map a non-success provider response to an error, keeping 429 distinct so
/// callers can surface retry timing.
pub(crate) async fn error_from_response(response: reqwest::Response) -> IngestError {
    let status = response.status().as_u16();
    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return IngestError::RateLimited { retry_after_secs };
    }
    let message = response.text().await.unwrap_or_default();
    IngestError::Provider { status, message }
}
