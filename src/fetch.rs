use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use uuid::Uuid;

use crate::config::FetcherConfig;
use crate::error::IngestError;

/// HTTP fetcher with a browser-like profile. Many recipe sites serve
/// stripped-down or blocked responses to obvious bot user agents.
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(config: &FetcherConfig) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    /// Fetch a page body as text. Non-success statuses are errors.
    pub async fn fetch_html(&self, url: &str) -> Result<String, IngestError> {
        debug!("Fetching HTML from {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    /// Fetch raw bytes plus the response content type.
    pub async fn fetch_bytes(&self, url: &str) -> Result<(Vec<u8>, Option<String>), IngestError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), content_type))
    }

    /// Download an image into `dir` under a fresh name, picking the file
    /// extension from the response content type.
    pub async fn download_image(&self, url: &str, dir: &Path) -> Result<PathBuf, IngestError> {
        let (bytes, content_type) = self.fetch_bytes(url).await?;
        let ext = extension_for(content_type.as_deref());
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}{}", Uuid::new_v4(), ext));
        tokio::fs::write(&path, &bytes).await?;
        debug!("Downloaded image {} -> {}", url, path.display());
        Ok(path)
    }
}

pub(crate) fn extension_for(content_type: Option<&str>) -> &'static str {
    match content_type.map(|ct| ct.split(';').next().unwrap_or("").trim()) {
        Some("image/png") => ".png",
        Some("image/webp") => ".webp",
        Some("image/gif") => ".gif",
        // jpeg and anything unrecognized land on .jpg
        _ => ".jpg",
    }
}
