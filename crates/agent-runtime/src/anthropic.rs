//! Anthropic Provider
//!
//! `POST {base_url}/v1/messages` with `tool_use` / `tool_result` content blocks.

use agent_core::{
    error::{AgentError, Result},
    message::{ToolArguments, ToolRequest, Turn},
    provider::{Completion, Decision, FinishReason, GenerationOptions, LlmProvider, ProviderKind, TokenUsage},
};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::http::{build_client, send_json};

/// API version header value
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic provider configuration
#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    /// API root, without `/v1/messages`
    pub base_url: String,

    /// Sent as `x-api-key`; requests go out without one when unset
    pub api_key: Option<String>,

    /// Model used when the session does not pick one
    pub default_model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".into(),
            api_key: None,
            default_model: "claude-3-5-sonnet-20241022".into(),
            timeout_secs: 120,
        }
    }
}

impl AnthropicConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("ANTHROPIC_BASE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.is_empty()),
            default_model: std::env::var("ANTHROPIC_MODEL").unwrap_or(defaults.default_model),
            timeout_secs: std::env::var("PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// Anthropic LLM provider
pub struct AnthropicProvider {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    /// Create from configuration
    pub fn from_config(config: AnthropicConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            config,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(AnthropicConfig::from_env())
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    /// Convert the turn log to `messages`.
    ///
    /// Empty text blocks are dropped and adjacent messages with the same role
    /// are merged, so every batch of tool results lands in a single user
    /// message right after the assistant's `tool_use` blocks.
    fn convert_messages(history: &[Turn]) -> Vec<Value> {
        let mut merged: Vec<(&'static str, Vec<Value>)> = Vec::new();

        for turn in history {
            let (role, blocks) = match turn {
                Turn::UserText { text } => ("user", text_block(text)),
                Turn::AssistantText { text } => ("assistant", text_block(text)),
                Turn::AssistantToolRequest { text, calls } => {
                    let mut blocks = text_block(text);
                    blocks.extend(calls.iter().map(|call| {
                        let input = match &call.arguments {
                            ToolArguments::Structured { value } => value.clone(),
                            ToolArguments::Malformed { .. } => json!({}),
                        };
                        json!({"type": "tool_use", "id": call.call_id, "name": call.tool_name, "input": input})
                    }));
                    ("assistant", blocks)
                }
                Turn::ToolResult { call_id, text, is_error } => {
                    let mut block = json!({"type": "tool_result", "tool_use_id": call_id, "content": text});
                    if *is_error {
                        block["is_error"] = Value::Bool(true);
                    }
                    ("user", vec![block])
                }
            };

            if blocks.is_empty() {
                continue;
            }
            match merged.last_mut() {
                Some((last_role, last_blocks)) if *last_role == role => last_blocks.extend(blocks),
                _ => merged.push((role, blocks)),
            }
        }

        merged
            .into_iter()
            .map(|(role, content)| json!({"role": role, "content": content}))
            .collect()
    }

    /// Build the request body; `tools` is left out entirely when empty
    fn build_request(history: &[Turn], tools: &[Value], options: &GenerationOptions) -> Value {
        let mut body = json!({
            "model": options.model,
            "max_tokens": options.max_tokens,
            "messages": Self::convert_messages(history),
        });

        if let Some(system) = &options.system_prompt {
            body["system"] = json!(system);
        }
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.to_vec());
        }

        body
    }

    /// Parse a `message` body; `None` when it has no content list
    fn parse_response(body: &Value, requested_model: &str) -> Option<Completion> {
        let blocks = body.get("content")?.as_array()?;

        let mut text = String::new();
        let mut calls = Vec::new();
        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(t) = block.get("text").and_then(Value::as_str) {
                        text.push_str(t);
                    }
                }
                Some("tool_use") => {
                    let Some(name) = block.get("name").and_then(Value::as_str) else {
                        continue;
                    };
                    let call_id = block
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(ToolRequest::generate_call_id);
                    let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                    calls.push(ToolRequest::new(call_id, name, ToolArguments::structured(input)));
                }
                _ => {}
            }
        }

        let stop_reason = body.get("stop_reason").and_then(Value::as_str);
        let decision = if stop_reason == Some("tool_use") {
            Decision::tools_with_text(text, calls)
        } else {
            Decision::final_text(text)
        };

        let usage = body.get("usage").map(|u| {
            let input = u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0);
            let output = u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0);
            TokenUsage {
                prompt_tokens: u32::try_from(input).unwrap_or(u32::MAX),
                completion_tokens: u32::try_from(output).unwrap_or(u32::MAX),
                total_tokens: u32::try_from(input + output).unwrap_or(u32::MAX),
            }
        });

        Some(Completion {
            decision,
            model: body
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or(requested_model)
                .to_string(),
            usage,
            finish_reason: stop_reason.map(FinishReason::from_provider),
        })
    }
}

fn text_block(text: &str) -> Vec<Value> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![json!({"type": "text", "text": text})]
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn complete(
        &self,
        history: &[Turn],
        tools: &[Value],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let body = Self::build_request(history, tools, options);
        tracing::debug!(model = %options.model, turns = history.len(), tools = tools.len(), "Anthropic request");

        let mut request = self
            .client
            .post(self.endpoint())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.header("x-api-key", key);
        }

        let (status, value) = send_json(request).await?;
        Self::parse_response(&value, &options.model).ok_or_else(|| AgentError::Provider {
            status,
            body: value.to_string(),
        })
    }
}
