use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{LlmMessage, LlmProvider, LlmRequest, LlmResponse};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Chat-completions client for OpenAI and any endpoint speaking the same API.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self::with_timeout(api_key, api_base, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        timeout_secs: u64,
    ) -> Self {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "openai http client builder failed, using defaults");
                reqwest::Client::new()
            });
        Self {
            client,
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub(crate) fn to_api_request(request: LlmRequest) -> ApiRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system {
            messages.push(LlmMessage::system(system));
        }
        messages.extend(request.messages);

        ApiRequest {
            model: request.model,
            messages,
            max_tokens: Some(request.max_tokens),
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.api_base);
        let payload = Self::to_api_request(request);

        let resp = self
            .client
            .post(url)
            .timeout(self.timeout)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    anyhow!(
                        "openai api error (timeout): no answer after {}s",
                        self.timeout.as_secs()
                    )
                } else {
                    err.into()
                }
            })?;

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await?;
            let parsed = serde_json::from_str::<ApiErrorEnvelope>(&text).ok();
            return Err(format_api_error(status, parsed));
        }

        let body: ApiResponse = resp.json().await?;
        let text = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("openai api error: empty choices"))?
            .message
            .content
            .unwrap_or_default();
        Ok(LlmResponse { text })
    }
}

/// Status plus the provider's own message when the error body parses.
pub(crate) fn format_api_error(status: StatusCode, parsed: Option<ApiErrorEnvelope>) -> anyhow::Error {
    match parsed {
        Some(api_error) => anyhow!("openai api error ({status}): {}", api_error.error.message),
        None => anyhow!("openai api error ({status})"),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiRequest {
    pub model: String,
    pub messages: Vec<LlmMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiResponse {
    pub choices: Vec<ApiChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiChoice {
    pub message: ApiChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_api_request_puts_system_first() {
        let req = LlmRequest::simple(
            "gpt-3.5-turbo".into(),
            Some("You are a helpful assistant.".into()),
            "salut".into(),
        )
        .with_temperature(0.7);

        let api = OpenAiProvider::to_api_request(req);
        assert_eq!(api.messages.len(), 2);
        assert_eq!(api.messages[0].role, "system");
        assert_eq!(api.messages[1].content, "salut");
        assert_eq!(api.max_tokens, Some(256));
        assert_eq!(api.temperature, Some(0.7));
    }

    #[test]
    fn to_api_request_without_system() {
        let api = OpenAiProvider::to_api_request(LlmRequest::simple("m".into(), None, "q".into()));
        assert_eq!(api.messages.len(), 1);
        assert_eq!(api.messages[0].role, "user");
    }

    #[test]
    fn api_response_ignores_usage_and_finish_reason() {
        let body: ApiResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"content": "  Bonjour !  "}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 7, "completion_tokens": 3}
        }))
        .unwrap();
        assert_eq!(body.choices[0].message.content.as_deref(), Some("  Bonjour !  "));
    }

    #[test]
    fn api_error_carries_status_and_provider_message() {
        let parsed = ApiErrorEnvelope {
            error: ApiErrorBody {
                message: "slow down".into(),
            },
        };
        let err = format_api_error(StatusCode::TOO_MANY_REQUESTS, Some(parsed)).to_string();
        assert_eq!(err, "openai api error (429 Too Many Requests): slow down");
    }

    #[test]
    fn api_error_without_body_is_status_only() {
        let err = format_api_error(StatusCode::UNAUTHORIZED, None).to_string();
        assert_eq!(err, "openai api error (401 Unauthorized)");
    }
}
