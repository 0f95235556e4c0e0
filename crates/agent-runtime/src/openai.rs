//! OpenAI-style Provider
//!
//! `POST {base_url}/chat/completions` with function calling. Any server that
//! speaks the same format (local inference servers, gateways) works by
//! pointing `OPENAI_BASE_URL` at it.

use agent_core::{
    error::{AgentError, Result},
    message::{ToolArguments, ToolRequest, Turn},
    provider::{Completion, Decision, FinishReason, GenerationOptions, LlmProvider, ProviderKind, TokenUsage},
};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::http::{build_client, send_json};

/// OpenAI provider configuration
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// API root, without the `/chat/completions` suffix
    pub base_url: String,

    /// Bearer token; requests go out without one when unset
    pub api_key: Option<String>,

    /// Model used when the session does not pick one
    pub default_model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
            default_model: "gpt-4o-mini".into(),
            timeout_secs: 120,
        }
    }
}

impl OpenAiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            default_model: std::env::var("OPENAI_MODEL").unwrap_or(defaults.default_model),
            timeout_secs: std::env::var("PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// OpenAI-style LLM provider
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    /// Create from configuration
    pub fn from_config(config: OpenAiConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            config,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(OpenAiConfig::from_env())
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Convert the turn log to chat messages
    fn convert_messages(history: &[Turn], system_prompt: Option<&str>) -> Vec<Value> {
        let mut messages = Vec::with_capacity(history.len() + 1);

        if let Some(system) = system_prompt {
            messages.push(json!({"role": "system", "content": system}));
        }

        for turn in history {
            let message = match turn {
                Turn::UserText { text } => json!({"role": "user", "content": text}),
                Turn::AssistantText { text } => json!({"role": "assistant", "content": text}),
                Turn::AssistantToolRequest { text, calls } => {
                    let tool_calls: Vec<Value> = calls
                        .iter()
                        .map(|call| json!({
                            "id": call.call_id,
                            "type": "function",
                            "function": {
                                "name": call.tool_name,
                                "arguments": call.arguments.to_json_string(),
                            }
                        }))
                        .collect();
                    let content = if text.is_empty() { Value::Null } else { Value::String(text.clone()) };
                    json!({"role": "assistant", "content": content, "tool_calls": tool_calls})
                }
                Turn::ToolResult { call_id, text, .. } => {
                    json!({"role": "tool", "tool_call_id": call_id, "content": text})
                }
            };
            messages.push(message);
        }

        messages
    }

    /// Build the request body; `tools` is left out entirely when empty
    fn build_request(history: &[Turn], tools: &[Value], options: &GenerationOptions) -> Value {
        let mut body = json!({
            "model": options.model,
            "max_tokens": options.max_tokens,
            "messages": Self::convert_messages(history, options.system_prompt.as_deref()),
        });

        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.to_vec());
        }

        body
    }

    /// Parse a `chat.completion` body; `None` when it has no message
    fn parse_response(body: &Value, requested_model: &str) -> Option<Completion> {
        let choice = body.get("choices")?.get(0)?;
        let message = choice.get("message")?;

        let text = match message.get("content") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(parts)) => parts
                .iter()
                .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect(),
            _ => String::new(),
        };

        let calls: Vec<ToolRequest> = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| calls.iter().filter_map(Self::parse_tool_call).collect())
            .unwrap_or_default();

        let usage = body.get("usage").map(|u| TokenUsage {
            prompt_tokens: read_u32(u, "prompt_tokens"),
            completion_tokens: read_u32(u, "completion_tokens"),
            total_tokens: read_u32(u, "total_tokens"),
        });

        Some(Completion {
            decision: Decision::tools_with_text(text, calls),
            model: body
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or(requested_model)
                .to_string(),
            usage,
            finish_reason: choice
                .get("finish_reason")
                .and_then(Value::as_str)
                .map(FinishReason::from_provider),
        })
    }

    fn parse_tool_call(call: &Value) -> Option<ToolRequest> {
        let function = call.get("function")?;
        let name = function.get("name").and_then(Value::as_str)?;
        let call_id = call
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(ToolRequest::generate_call_id);

        let arguments = match function.get("arguments") {
            Some(Value::String(raw)) => ToolArguments::parse(raw),
            Some(Value::Null) | None => ToolArguments::parse(""),
            Some(other) => ToolArguments::structured(other.clone()),
        };

        Some(ToolRequest::new(call_id, name, arguments))
    }
}

fn read_u32(value: &Value, key: &str) -> u32 {
    value
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn complete(
        &self,
        history: &[Turn],
        tools: &[Value],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let body = Self::build_request(history, tools, options);
        tracing::debug!(model = %options.model, turns = history.len(), tools = tools.len(), "OpenAI request");

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let (status, value) = send_json(request).await?;
        Self::parse_response(&value, &options.model).ok_or_else(|| AgentError::Provider {
            status,
            body: value.to_string(),
        })
    }
}
