use std::{fs, net::SocketAddr, path::Path};

use anyhow::{anyhow, Context, Result};
use intentfi_provider::{ProviderConfig, ProviderType};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant specialized in crypto and finance. You can also answer about football teams, their statistics and upcoming matches if the user asks.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default = "default_env")]
    pub env: String,
}

fn default_env() -> String {
    "dev".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Address this agent signs its envelopes with
    pub address: String,
    /// Agent that answers unmatched messages asynchronously. Local fallback
    /// completion is used when unset.
    #[serde(default)]
    pub collaborator: Option<String>,
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_pending_capacity() -> usize {
    1024
}

fn default_pending_ttl_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfig {
    #[serde(default = "default_pending_capacity")]
    pub capacity: usize,
    #[serde(default = "default_pending_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            capacity: default_pending_capacity(),
            ttl_secs: default_pending_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainConfig {
    pub app: AppConfig,
    pub agent: AgentConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pending: PendingConfig,
}

fn default_stats_timeout_secs() -> u64 {
    intentfi_stats::DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    pub base_url: String,
    #[serde(default = "default_stats_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u32 {
    256
}

fn default_temperature() -> f32 {
    0.7
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: ProviderConfig,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::new(ProviderType::Stub),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentfiConfig {
    pub main: MainConfig,
    pub stats: StatsConfig,
    pub llm: LlmConfig,
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

fn resolve_opt(value: &mut Option<String>) {
    if let Some(v) = value {
        *v = resolve_env_var(v);
    }
}

/// Reads `main.yaml`, `stats.yaml` and `llm.yaml` from `root` and expands
/// `${VAR}` placeholders. No validation.
pub fn read_config(root: &Path) -> Result<IntentfiConfig> {
    let mut main: MainConfig = read_yaml_file(&root.join("main.yaml"))?;
    let mut stats: StatsConfig = read_yaml_file(&root.join("stats.yaml"))?;
    let mut llm: LlmConfig = read_yaml_file(&root.join("llm.yaml"))?;

    resolve_main_env(&mut main);
    stats.base_url = resolve_env_var(&stats.base_url);
    resolve_llm_env(&mut llm);

    Ok(IntentfiConfig { main, stats, llm })
}

pub fn load_config(root: &Path) -> Result<IntentfiConfig> {
    let config = read_config(root)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &IntentfiConfig) -> Result<()> {
    let provider = &config.llm.provider;
    let has_key = provider
        .api_key
        .as_deref()
        .is_some_and(|k| !k.trim().is_empty());
    if provider.provider_type.requires_api_key() && !has_key {
        return Err(anyhow!(
            "llm api_key is missing for provider {:?} (set it in llm.yaml or via OPENAI_API_KEY)",
            provider.provider_type
        ));
    }

    if config.stats.base_url.trim().is_empty() {
        return Err(anyhow!("stats base_url must not be empty"));
    }

    if config.stats.timeout_secs == 0 || provider.timeout_secs == Some(0) {
        return Err(anyhow!("timeout_secs must be positive"));
    }

    if config.main.agent.address.trim().is_empty() {
        return Err(anyhow!("agent address must not be empty"));
    }

    if config.main.pending.capacity == 0 || config.main.pending.ttl_secs == 0 {
        return Err(anyhow!("pending capacity and ttl_secs must be positive"));
    }

    config
        .main
        .server
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid server bind address: {}", config.main.server.bind))?;

    Ok(())
}

fn read_yaml_file<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))
}

fn resolve_main_env(main: &mut MainConfig) {
    main.app.name = resolve_env_var(&main.app.name);
    main.app.env = resolve_env_var(&main.app.env);
    main.agent.address = resolve_env_var(&main.agent.address);
    resolve_opt(&mut main.agent.collaborator);
    main.server.bind = resolve_env_var(&main.server.bind);

    // an empty placeholder means "no collaborator"
    if main
        .agent
        .collaborator
        .as_deref()
        .is_some_and(|c| c.trim().is_empty())
    {
        main.agent.collaborator = None;
    }
}

fn resolve_llm_env(llm: &mut LlmConfig) {
    resolve_opt(&mut llm.provider.api_key);
    resolve_opt(&mut llm.provider.base_url);
    llm.model = resolve_env_var(&llm.model);
    llm.system_prompt = resolve_env_var(&llm.system_prompt);
}
