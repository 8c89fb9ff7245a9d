use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::{openai_compatible_defaults, CompletionProvider};
use crate::config::ProviderConfig;
use crate::error::{error_from_response, IngestError};

/// Chat-completions client covering OpenAI and compatible vendors (Groq,
/// OpenRouter) that differ only in base URL and API key.
pub struct OpenAiProvider {
    client: Client,
    name: String,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiProvider {
    /// Create a provider from configuration. The API key falls back to the
    /// vendor's environment variable (OPENAI_API_KEY, GROQ_API_KEY, ...).
    pub fn new(name: &str, config: &ProviderConfig) -> Result<Self, IngestError> {
        let (env_var, default_base) = openai_compatible_defaults(name).ok_or_else(|| {
            config::ConfigError::Message(format!("'{}' is not an OpenAI-compatible vendor", name))
        })?;

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(env_var).ok())
            .ok_or_else(|| {
                config::ConfigError::Message(format!(
                    "{} not found in config or environment",
                    env_var
                ))
            })?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base.to_string());

        Ok(Self {
            client: Client::new(),
            name: name.to_string(),
            api_key,
            base_url,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    #[doc(hidden)]
    pub fn with_base_url(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            name: "openai".to_string(),
            api_key,
            base_url,
            model,
            temperature: 0.2,
            max_tokens: 4000,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        json_response: bool,
    ) -> Result<String, IngestError> {
        let mut body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens
        });
        if json_response {
            body["response_format"] = json!({"type": "json_object"});
        }

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let response_body: Value = response.json().await?;
        debug!("{} response: {:?}", self.name, response_body);

        response_body["choices"][0]["message"]["content"]
            .as_str()
            .map(|c| c.to_string())
            .ok_or_else(|| IngestError::Provider {
                status: 200,
                message: "completion response had no message content".to_string(),
            })
    }
}
