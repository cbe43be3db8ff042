use std::sync::Arc;

use intentfi_provider::{LlmProvider, LlmRequest};

use crate::config::LlmConfig;
use crate::format;

/// Answers messages no intent rule recognised by asking a language model.
#[derive(Clone)]
pub struct FallbackResponder {
    provider: Arc<dyn LlmProvider>,
    model: String,
    system_prompt: String,
    max_tokens: u32,
    temperature: f32,
}

impl FallbackResponder {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Never fails: provider errors become the reply text.
    pub async fn respond(&self, text: &str) -> String {
        let request = LlmRequest::simple(
            self.model.clone(),
            Some(self.system_prompt.clone()),
            text.to_string(),
        )
        .with_max_tokens(self.max_tokens)
        .with_temperature(self.temperature);

        match self.provider.chat(request).await {
            Ok(resp) => resp.text.trim().to_string(),
            Err(err) => {
                tracing::warn!(error = %err, "completion call failed");
                format::completion_error(&err)
            }
        }
    }
}
