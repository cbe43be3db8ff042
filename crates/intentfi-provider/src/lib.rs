pub mod openai;
pub mod openai_compat;
pub mod types;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use openai::OpenAiProvider;
pub use openai_compat::{custom, deepseek, groq, ollama_with_base};
pub use types::*;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse>;
}

// ============================================================
// Provider Configuration
// ============================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    OpenAI,
    DeepSeek,
    Groq,
    Ollama,
    /// Custom OpenAI-compatible endpoint
    Custom,
    /// Offline echo provider for local runs and tests
    Stub,
}

impl ProviderType {
    pub fn requires_api_key(self) -> bool {
        !matches!(self, Self::Ollama | Self::Stub)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ProviderConfig {
    pub fn new(provider_type: ProviderType) -> Self {
        Self {
            provider_type,
            api_key: None,
            base_url: None,
            timeout_secs: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    fn required_key(&self, name: &str) -> Result<String> {
        self.api_key
            .as_ref()
            .filter(|k| !k.trim().is_empty())
            .cloned()
            .ok_or_else(|| anyhow!("{name} requires api_key"))
    }
}

/// Create a provider from configuration.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match config.provider_type {
        ProviderType::OpenAI => {
            let key = config.required_key("openai")?;
            let base_url = config
                .base_url
                .as_deref()
                .unwrap_or(openai_compat::OPENAI_BASE_URL);
            match config.timeout_secs {
                Some(secs) => Arc::new(OpenAiProvider::with_timeout(key, base_url, secs)),
                None => Arc::new(OpenAiProvider::new(key, base_url)),
            }
        }
        ProviderType::DeepSeek => Arc::new(deepseek(config.required_key("deepseek")?)),
        ProviderType::Groq => Arc::new(groq(config.required_key("groq")?)),
        ProviderType::Ollama => {
            let base_url = config
                .base_url
                .as_deref()
                .unwrap_or(openai_compat::OLLAMA_BASE_URL);
            Arc::new(ollama_with_base(base_url))
        }
        ProviderType::Custom => {
            let key = config.required_key("custom provider")?;
            let base_url = config
                .base_url
                .as_ref()
                .ok_or_else(|| anyhow!("custom provider requires base_url"))?;
            Arc::new(custom(key, base_url.clone()))
        }
        ProviderType::Stub => Arc::new(StubProvider),
    };
    tracing::debug!(provider = ?config.provider_type, "llm provider created");
    Ok(provider)
}

pub struct StubProvider;

#[async_trait]
impl LlmProvider for StubProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let user_text = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(LlmResponse {
            text: format!("[stub:{}] {}", request.model, user_text),
        })
    }
}
