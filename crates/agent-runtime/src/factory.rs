//! Provider selection
//!
//! Builds the adapter for a [`ProviderKind`] from environment-derived
//! settings. Missing credentials are not an error here; the provider will
//! reject the request and the caller sees a provider error.

use std::sync::Arc;

use agent_core::{
    error::Result,
    provider::{LlmProvider, ProviderKind},
};

use crate::anthropic::{AnthropicConfig, AnthropicProvider};
use crate::openai::{OpenAiConfig, OpenAiProvider};

/// Settings for every supported provider
#[derive(Clone, Debug, Default)]
pub struct ProviderSettings {
    pub openai: OpenAiConfig,
    pub anthropic: AnthropicConfig,
}

impl ProviderSettings {
    pub fn from_env() -> Self {
        Self {
            openai: OpenAiConfig::from_env(),
            anthropic: AnthropicConfig::from_env(),
        }
    }

    /// Model used for `kind` when the caller does not name one
    pub fn default_model(&self, kind: ProviderKind) -> &str {
        match kind {
            ProviderKind::OpenAi => &self.openai.default_model,
            ProviderKind::Anthropic => &self.anthropic.default_model,
        }
    }

    /// Whether an API key is present for `kind`
    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::OpenAi => self.openai.api_key.is_some(),
            ProviderKind::Anthropic => self.anthropic.api_key.is_some(),
        }
    }

    /// Build the adapter for `kind`
    pub fn build(&self, kind: ProviderKind) -> Result<Arc<dyn LlmProvider>> {
        let provider: Arc<dyn LlmProvider> = match kind {
            ProviderKind::OpenAi => Arc::new(OpenAiProvider::from_config(self.openai.clone())?),
            ProviderKind::Anthropic => Arc::new(AnthropicProvider::from_config(self.anthropic.clone())?),
        };
        Ok(provider)
    }
}
