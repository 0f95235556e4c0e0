//! Gateway Configuration
//!
//! Everything is read from the environment (after `.env` is loaded).

use std::str::FromStr;

use agent_core::{
    error::{AgentError, Result},
    provider::ProviderKind,
    reasoning::DEFAULT_MAX_ROUNDS,
};
use agent_runtime::{McpServerConfig, ProviderSettings};
use serde::Deserialize;

/// Gateway configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,

    /// Provider for sessions that do not choose one
    pub provider: ProviderKind,

    /// Model override for the default provider (`LLM_MODEL`)
    pub model: Option<String>,

    pub max_tokens: u32,
    pub max_rounds: usize,
    pub system_prompt: Option<String>,

    /// Idle time after which a session is evicted
    pub session_timeout_secs: u64,

    /// How often the eviction sweep runs
    pub sweep_interval_secs: u64,

    pub providers: ProviderSettings,
    pub mcp: McpServerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            provider: ProviderKind::Anthropic,
            model: None,
            max_tokens: 1000,
            max_rounds: DEFAULT_MAX_ROUNDS,
            system_prompt: None,
            session_timeout_secs: 1800,
            sweep_interval_secs: 60,
            providers: ProviderSettings::default(),
            mcp: McpServerConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let provider = match std::env::var("LLM_PROVIDER") {
            Ok(value) if !value.trim().is_empty() => ProviderKind::from_str(value.trim())?,
            _ => defaults.provider,
        };

        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            provider,
            model: non_empty_var("LLM_MODEL"),
            max_tokens: parse_var("MAX_TOKENS")?.unwrap_or(defaults.max_tokens),
            max_rounds: parse_var("MAX_ROUNDS")?.unwrap_or(defaults.max_rounds),
            system_prompt: non_empty_var("SYSTEM_PROMPT"),
            session_timeout_secs: parse_var("SESSION_TIMEOUT_SECS")?.unwrap_or(defaults.session_timeout_secs),
            sweep_interval_secs: parse_var("SESSION_SWEEP_SECS")?.unwrap_or(defaults.sweep_interval_secs),
            providers: ProviderSettings::from_env(),
            mcp: McpServerConfig::from_env(),
        })
    }

    /// Resolve the settings for a new session.
    ///
    /// Request values win; `LLM_MODEL` only applies to the default provider,
    /// otherwise the provider's own default model is used.
    pub fn session_settings(&self, overrides: Option<&SessionOverrides>) -> Result<SessionSettings> {
        let empty = SessionOverrides::default();
        let overrides = overrides.unwrap_or(&empty);

        let provider = match overrides.provider.as_deref() {
            Some(name) => ProviderKind::from_str(name)?,
            None => self.provider,
        };

        let model = overrides
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| self.model.clone().filter(|_| provider == self.provider))
            .unwrap_or_else(|| self.providers.default_model(provider).to_string());

        // MAX_ROUNDS is a ceiling; clients may only lower it
        let max_rounds = overrides
            .max_rounds
            .map_or(self.max_rounds, |rounds| rounds.min(self.max_rounds));
        if max_rounds == 0 {
            return Err(AgentError::Config("maxRounds must be at least 1".into()));
        }

        Ok(SessionSettings {
            provider,
            model,
            max_tokens: overrides.max_tokens.unwrap_or(self.max_tokens),
            temperature: overrides.temperature,
            max_rounds,
            system_prompt: overrides.system_prompt.clone().or_else(|| self.system_prompt.clone()),
        })
    }
}

/// Per-session settings a client may supply with its first message
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub max_rounds: Option<usize>,
    pub system_prompt: Option<String>,
}

/// Fully resolved settings for one session
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSettings {
    pub provider: ProviderKind,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub max_rounds: usize,
    pub system_prompt: Option<String>,
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>> {
    match non_empty_var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AgentError::Config(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(None),
    }
}
