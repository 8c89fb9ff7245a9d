use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::CompletionProvider;
use crate::config::ProviderConfig;
use crate::error::{error_from_response, IngestError};

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicProvider {
    /// Create a provider from configuration. The API key falls back to the
    /// ANTHROPIC_API_KEY environment variable.
    pub fn new(config: &ProviderConfig) -> Result<Self, IngestError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                config::ConfigError::Message(
                    "ANTHROPIC_API_KEY not found in config or environment".to_string(),
                )
            })?;

        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            model,
            temperature: 0.2,
            max_tokens: 4000,
        }
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        _json_response: bool,
    ) -> Result<String, IngestError> {
        // the messages API has no response_format knob; the system prompt
        // alone has to pin the output to JSON
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&json!({
                "model": self.model,
                "max_tokens": self.max_tokens,
                "temperature": self.temperature,
                "system": system,
                "messages": [
                    {"role": "user", "content": user}
                ]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let response_body: Value = response.json().await?;
        debug!("anthropic response: {:?}", response_body);

        response_body["content"][0]["text"]
            .as_str()
            .map(|c| c.to_string())
            .ok_or_else(|| IngestError::Provider {
                status: 200,
                message: "message response had no text content".to_string(),
            })
    }
}
