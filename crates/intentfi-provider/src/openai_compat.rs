//! Presets for hosted and local endpoints that speak the OpenAI chat API.

use crate::OpenAiProvider;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// DeepSeek API
pub fn deepseek(api_key: impl Into<String>) -> OpenAiProvider {
    OpenAiProvider::new(api_key, "https://api.deepseek.com/v1")
}

/// Groq API
pub fn groq(api_key: impl Into<String>) -> OpenAiProvider {
    OpenAiProvider::new(api_key, "https://api.groq.com/openai/v1")
}

pub fn ollama_with_base(base_url: impl Into<String>) -> OpenAiProvider {
    // Ollama ignores the bearer token
    OpenAiProvider::new("ollama", base_url)
}

pub fn custom(api_key: impl Into<String>, base_url: impl Into<String>) -> OpenAiProvider {
    OpenAiProvider::new(api_key, base_url)
}
