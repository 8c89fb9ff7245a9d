use async_trait::async_trait;

use super::anthropic::AnthropicProvider;
use super::open_ai::OpenAiProvider;
use crate::config::{IngestConfig, ProviderConfig};
use crate::error::IngestError;

/// A chat-completion backend for the generative extraction engine.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    /// Request a completion. When `json_response` is set the provider asks
    /// the backend for a guaranteed JSON object where the API supports it.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        json_response: bool,
    ) -> Result<String, IngestError>;
}

/// Known OpenAI-compatible vendors and their defaults.
pub(crate) fn openai_compatible_defaults(name: &str) -> Option<(&'static str, &'static str)> {
    match name {
        "openai" => Some(("OPENAI_API_KEY", "https://api.openai.com")),
        "groq" => Some(("GROQ_API_KEY", "https://api.groq.com/openai")),
        "openrouter" => Some(("OPENROUTER_API_KEY", "https://openrouter.ai/api")),
        _ => None,
    }
}

pub struct ProviderFactory;

impl ProviderFactory {
    /// Create a provider instance from configuration
    pub fn create(
        provider_name: &str,
        config: &ProviderConfig,
    ) -> Result<Box<dyn CompletionProvider>, IngestError> {
        if !config.enabled {
            return Err(config::ConfigError::Message(format!(
                "Provider '{}' is not enabled in configuration",
                provider_name
            ))
            .into());
        }

        if openai_compatible_defaults(provider_name).is_some() {
            return Ok(Box::new(OpenAiProvider::new(provider_name, config)?));
        }
        match provider_name {
            "anthropic" => Ok(Box::new(AnthropicProvider::new(config)?)),
            _ => Err(config::ConfigError::Message(format!(
                "Unknown provider: {}",
                provider_name
            ))
            .into()),
        }
    }

    /// Get the default provider from configuration
    pub fn get_default_provider(
        config: &IngestConfig,
    ) -> Result<Box<dyn CompletionProvider>, IngestError> {
        let provider_name = &config.default_provider;
        let provider_config = config.providers.get(provider_name).ok_or_else(|| {
            config::ConfigError::Message(format!(
                "Default provider '{}' not found in configuration",
                provider_name
            ))
        })?;

        Self::create(provider_name, provider_config)
    }

    /// List all supported provider names
    pub fn available_providers() -> Vec<&'static str> {
        vec!["openai", "groq", "openrouter", "anthropic"]
    }
}
