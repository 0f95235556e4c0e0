//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for the model providers (OpenAI-style function
//! calling, Anthropic-style tool use) so the orchestration loop runs the same
//! way against every backend.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{LlmProvider, GenerationOptions};
//!
//! let schemas = catalog.to_provider_schema(provider.kind());
//! let completion = provider.complete(conversation.turns(), &schemas, &options).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::message::{ToolRequest, Turn};

/// Which wire format a provider speaks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// `/chat/completions` with `tools` / `tool_calls`
    #[serde(alias = "openai-compatible")]
    OpenAi,
    /// `/v1/messages` with `tool_use` blocks
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" | "gpt" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            other => Err(AgentError::Config(format!("unknown provider '{}'", other))),
        }
    }
}

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "gpt-4o-mini", "claude-3-5-sonnet-20241022")
    pub model: String,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for sampling; provider default when unset
    #[serde(default)]
    pub temperature: Option<f32>,

    /// System prompt, sent the way each provider expects it
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_max_tokens() -> u32 { 1000 }

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-20241022".into(),
            max_tokens: default_max_tokens(),
            temperature: None,
            system_prompt: None,
        }
    }
}

/// Normalized outcome of one provider round
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    /// The model answered; concatenated text blocks, possibly empty
    Final { text: String },

    /// The model wants tools run, in this order
    ToolRequests {
        /// Prose emitted alongside the calls
        #[serde(default)]
        text: String,
        calls: Vec<ToolRequest>,
    },
}

impl Decision {
    pub fn final_text(text: impl Into<String>) -> Self {
        Decision::Final { text: text.into() }
    }

    /// Tool requests with no accompanying prose. An empty call list is
    /// treated as a final answer.
    pub fn tools(calls: Vec<ToolRequest>) -> Self {
        Decision::tools_with_text(String::new(), calls)
    }

    pub fn tools_with_text(text: impl Into<String>, calls: Vec<ToolRequest>) -> Self {
        if calls.is_empty() {
            Decision::Final { text: text.into() }
        } else {
            Decision::ToolRequests {
                text: text.into(),
                calls,
            }
        }
    }
}

/// Response from an LLM completion
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    /// What the model decided
    pub decision: Decision,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    /// Completion with only a decision, used by adapters that report nothing else
    pub fn from_decision(decision: Decision, model: impl Into<String>) -> Self {
        Self {
            decision,
            model: model.into(),
            usage: None,
            finish_reason: None,
        }
    }
}

/// Token usage statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    /// Map the provider's own stop/finish reason string
    pub fn from_provider(reason: &str) -> Self {
        match reason {
            "stop" | "end_turn" | "stop_sequence" => FinishReason::Stop,
            "length" | "max_tokens" => FinishReason::Length,
            "tool_calls" | "function_call" | "tool_use" => FinishReason::ToolUse,
            "content_filter" | "refusal" => FinishReason::ContentFilter,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The orchestration loop works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Wire format, used to shape the tool schema list
    fn kind(&self) -> ProviderKind;

    /// Send the whole history plus tool schemas; exactly one network call.
    ///
    /// An empty `tools` slice means the request carries no `tools` field.
    /// Non-success statuses map to [`AgentError::Provider`] and are not retried.
    async fn complete(
        &self,
        history: &[Turn],
        tools: &[Value],
        options: &GenerationOptions,
    ) -> Result<Completion>;
}
