use std::sync::OnceLock;

use log::{debug, warn};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::classify::source_kind;
use crate::config::MediaConfig;
use crate::fetch::PageFetcher;
use crate::media::strategy::download_clip_with_strategies;
use crate::media::{frames, MediaFetcher};
use crate::model::{CandidateOrigin, ImageCandidate, SourceKind, VideoMetadata};

pub mod store;

pub use store::ImageStore;

/// Gathers the image candidate pool for a video recipe: the declared
/// thumbnail, frames captured from a short clip, and an image scraped from
/// the first non-platform link in the description. Every source degrades
/// independently; an empty pool is a valid outcome.
pub struct CandidateAssembler<'a> {
    media: &'a dyn MediaFetcher,
    fetcher: &'a PageFetcher,
    store: &'a ImageStore,
    config: &'a MediaConfig,
}

impl<'a> CandidateAssembler<'a> {
    pub fn new(
        media: &'a dyn MediaFetcher,
        fetcher: &'a PageFetcher,
        store: &'a ImageStore,
        config: &'a MediaConfig,
    ) -> Self {
        Self {
            media,
            fetcher,
            store,
            config,
        }
    }

    pub async fn assemble(&self, url: &str, metadata: &VideoMetadata) -> Vec<ImageCandidate> {
        let mut candidates = Vec::new();

        if let Some(thumbnail) = metadata.thumbnail_url.as_deref() {
            if !thumbnail.is_empty() {
                candidates.push(ImageCandidate::remote(thumbnail, CandidateOrigin::Thumbnail));
            }
        }

        candidates.extend(self.capture_frame_candidates(url).await);

        if let Some(scraped) = self.scrape_description_image(&metadata.description).await {
            candidates.push(scraped);
        }

        candidates
    }

    async fn capture_frame_candidates(&self, url: &str) -> Vec<ImageCandidate> {
        let clip_dir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!("No scratch directory for clip download: {}", e);
                return Vec::new();
            }
        };

        let Some(clip) = download_clip_with_strategies(
            self.media,
            url,
            &self.config.clip_strategies,
            self.config.clip_seconds,
            clip_dir.path(),
        )
        .await
        else {
            return Vec::new();
        };

        frames::capture_frames(self.config, &clip, self.store.scratch_dir())
            .await
            .into_iter()
            .map(|(offset, path)| {
                ImageCandidate::local(
                    path.to_string_lossy(),
                    CandidateOrigin::Frame {
                        timestamp_seconds: offset,
                    },
                )
            })
            .collect()
    }

    /// Creators often link the written recipe in the description; its page
    /// usually carries a better photo than any video frame.
    async fn scrape_description_image(&self, description: &str) -> Option<ImageCandidate> {
        let link = first_external_link(description)?;
        let html = match self.fetcher.fetch_html(&link).await {
            Ok(html) => html,
            Err(e) => {
                debug!("Description link {} not fetchable: {}", link, e);
                return None;
            }
        };
        let image_url = find_page_image(&html)?;

        match self
            .fetcher
            .download_image(&image_url, self.store.scratch_dir())
            .await
        {
            Ok(path) => Some(ImageCandidate::local(
                path.to_string_lossy(),
                CandidateOrigin::Scraped,
            )),
            Err(e) => {
                debug!("Could not download scraped image {}: {}", image_url, e);
                None
            }
        }
    }
}

/// First link in the text that does not point back at a media platform.
fn first_external_link(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("static pattern"));

    for m in re.find_iter(text) {
        let link = m.as_str().trim_end_matches(['.', ',', ')', ']']);
        if source_kind(link) == SourceKind::Text {
            return Some(link.to_string());
        }
    }
    None
}

/// Pull a representative image URL out of a page: og:image, then
/// twitter:image, then any JSON-LD image.
fn find_page_image(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for raw in [
        r#"meta[property="og:image"]"#,
        r#"meta[name="twitter:image"]"#,
    ] {
        let selector = Selector::parse(raw).expect("static selector");
        if let Some(content) = document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("content"))
        {
            let content = content.trim();
            if !content.is_empty() {
                return Some(content.to_string());
            }
        }
    }

    let scripts =
        Selector::parse(r#"script[type="application/ld+json"]"#).expect("static selector");
    for script in document.select(&scripts) {
        let text = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        if let Some(url) = json_ld_image(&value) {
            return Some(url);
        }
    }

    None
}

fn json_ld_image(value: &Value) -> Option<String> {
    let image = match value {
        Value::Object(map) => map.get("image").or_else(|| {
            map.get("@graph")
                .and_then(|g| g.as_array())
                .and_then(|entries| entries.iter().find_map(|e| e.get("image")))
        })?,
        Value::Array(entries) => return entries.iter().find_map(json_ld_image),
        _ => return None,
    };
    image_url_from(image)
}

fn image_url_from(image: &Value) -> Option<String> {
    match image {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Object(map) => map
            .get("url")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        Value::Array(entries) => entries.iter().find_map(image_url_from),
        _ => None,
    }
}
