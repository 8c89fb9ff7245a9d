use std::path::Path;

use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;

use crate::config::SpeechConfig;
use crate::error::{error_from_response, IngestError};

/// Audio transcription seam. Production uses an OpenAI-compatible endpoint;
/// tests substitute fakes.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<String, IngestError>;
}

/// Client for `/v1/audio/transcriptions` (OpenAI Whisper and compatible
/// vendors).
pub struct WhisperClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl WhisperClient {
    /// Create a client from configuration. The API key falls back to the
    /// OPENAI_API_KEY environment variable.
    pub fn new(config: &SpeechConfig) -> Result<Self, IngestError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                config::ConfigError::Message(
                    "speech API key not found in config or OPENAI_API_KEY".to_string(),
                )
            })?;

        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            model,
        }
    }
}

#[async_trait]
impl SpeechToText for WhisperClient {
    async fn transcribe(&self, audio: &Path) -> Result<String, IngestError> {
        debug!("Transcribing {}", audio.display());
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.mp3".to_string());
        let part = Part::bytes(bytes).file_name(file_name).mime_str("audio/mpeg")?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: Value = response.json().await?;
        body["text"]
            .as_str()
            .map(|t| t.to_string())
            .ok_or_else(|| IngestError::Provider {
                status: 200,
                message: "transcription response had no text field".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn temp_audio() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp3");
        std::fs::write(&path, b"fake mp3 bytes").unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_transcribe() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/audio/transcriptions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"text": "boil the pasta for nine minutes"}"#)
            .create_async()
            .await;

        let (_dir, audio) = temp_audio();
        let client = WhisperClient::with_base_url(
            "fake_api_key".to_string(),
            server.url(),
            "whisper-1".to_string(),
        );

        let text = client.transcribe(&audio).await.unwrap();
        assert_eq!(text, "boil the pasta for nine minutes");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_transcribe_rate_limited() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/audio/transcriptions")
            .with_status(429)
            .with_header("retry-after", "21")
            .with_body(r#"{"error": "rate limit exceeded"}"#)
            .create_async()
            .await;

        let (_dir, audio) = temp_audio();
        let client = WhisperClient::with_base_url(
            "fake_api_key".to_string(),
            server.url(),
            "whisper-1".to_string(),
        );

        let result = client.transcribe(&audio).await;
        assert!(matches!(
            result,
            Err(IngestError::RateLimited {
                retry_after_secs: Some(21)
            })
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_transcribe_server_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/audio/transcriptions")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let (_dir, audio) = temp_audio();
        let client = WhisperClient::with_base_url(
            "fake_api_key".to_string(),
            server.url(),
            "whisper-1".to_string(),
        );

        let result = client.transcribe(&audio).await;
        match result {
            Err(IngestError::Provider { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("expected provider error, got {:?}", other),
        }
        mock.assert_async().await;
    }
}
