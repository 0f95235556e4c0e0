//! Conversation Turns
//!
//! The append-only log of a single conversation. Every provider adapter
//! translates this log into its own message format; nothing else is stored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};

/// Arguments the model supplied for one tool call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolArguments {
    /// Decoded JSON arguments
    Structured { value: Value },

    /// An argument string that failed to decode, kept verbatim so it can be
    /// replayed to the provider
    Malformed { raw: String, reason: String },
}

impl ToolArguments {
    pub fn structured(value: Value) -> Self {
        ToolArguments::Structured { value }
    }

    /// Decode a JSON-encoded argument string (OpenAI style).
    /// An empty string stands for "no arguments".
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return ToolArguments::structured(Value::Object(serde_json::Map::new()));
        }

        match serde_json::from_str::<Value>(raw) {
            Ok(value) => ToolArguments::Structured { value },
            Err(e) => ToolArguments::Malformed {
                raw: raw.to_string(),
                reason: e.to_string(),
            },
        }
    }

    /// The decoded arguments, or a `ToolArgument` error
    pub fn value(&self) -> Result<&Value> {
        match self {
            ToolArguments::Structured { value } => Ok(value),
            ToolArguments::Malformed { reason, .. } => Err(AgentError::ToolArgument(reason.clone())),
        }
    }

    /// JSON-encoded form; malformed arguments come back exactly as received
    pub fn to_json_string(&self) -> String {
        match self {
            ToolArguments::Structured { value } => value.to_string(),
            ToolArguments::Malformed { raw, .. } => raw.clone(),
        }
    }
}

/// One tool invocation requested by the model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Provider-issued correlation id
    pub call_id: String,

    /// Tool to invoke
    pub tool_name: String,

    pub arguments: ToolArguments,
}

impl ToolRequest {
    pub fn new(call_id: impl Into<String>, tool_name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Generate a call id for providers that omit one
    pub fn generate_call_id() -> String {
        format!("call_{}", uuid::Uuid::new_v4().simple())
    }
}

/// A single entry in the conversation log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Turn {
    /// User input
    UserText { text: String },

    /// Final assistant answer for a round
    AssistantText { text: String },

    /// Assistant asked for tools; `text` is any prose emitted alongside
    AssistantToolRequest {
        #[serde(default)]
        text: String,
        calls: Vec<ToolRequest>,
    },

    /// Normalized result of one tool call
    ToolResult {
        call_id: String,
        text: String,
        is_error: bool,
    },
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Turn::UserText { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Turn::AssistantText { text: text.into() }
    }

    pub fn tool_request(text: impl Into<String>, calls: Vec<ToolRequest>) -> Self {
        Turn::AssistantToolRequest {
            text: text.into(),
            calls,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, text: impl Into<String>, is_error: bool) -> Self {
        Turn::ToolResult {
            call_id: call_id.into(),
            text: text.into(),
            is_error,
        }
    }
}

/// Ordered, append-only conversation log
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// All turns, oldest first
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Get the last turn
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Drop every turn
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Number of turns
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Check that every tool result answers a call of the tool request it
    /// directly follows (results of one request form a contiguous block)
    pub fn validate(&self) -> Result<()> {
        let mut open: Option<&[ToolRequest]> = None;

        for (index, turn) in self.turns.iter().enumerate() {
            match turn {
                Turn::AssistantToolRequest { calls, .. } => open = Some(calls.as_slice()),
                Turn::ToolResult { call_id, .. } => {
                    let known = open
                        .map(|calls| calls.iter().any(|c| &c.call_id == call_id))
                        .unwrap_or(false);
                    if !known {
                        return Err(AgentError::Session(format!(
                            "tool result at turn {} references unknown call id '{}'",
                            index, call_id
                        )));
                    }
                }
                Turn::UserText { .. } | Turn::AssistantText { .. } => open = None,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_arguments() {
        assert_eq!(
            ToolArguments::parse(r#"{"a": 2, "b": 2}"#),
            ToolArguments::structured(json!({"a": 2, "b": 2}))
        );
        assert_eq!(ToolArguments::parse(""), ToolArguments::structured(json!({})));

        let bad = ToolArguments::parse("{\"a\": ");
        assert!(matches!(bad, ToolArguments::Malformed { .. }));
        assert_eq!(bad.to_json_string(), "{\"a\": ");
        assert!(matches!(bad.value(), Err(AgentError::ToolArgument(_))));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut conv = Conversation::new();
        conv.push(Turn::user("Hi"));
        conv.push(Turn::assistant("Hello!"));

        conv.clear();
        assert!(conv.is_empty());
        conv.clear();
        assert!(conv.turns().is_empty());
    }

    #[test]
    fn test_validate_tool_result_references() {
        let mut conv = Conversation::new();
        conv.push(Turn::user("what is 2+2"));
        conv.push(Turn::tool_request(
            "",
            vec![ToolRequest::new("call_1", "add", ToolArguments::structured(json!({"a": 2, "b": 2})))],
        ));
        conv.push(Turn::tool_result("call_1", "Result: 4", false));
        conv.push(Turn::assistant("The answer is 4."));
        assert!(conv.validate().is_ok());

        conv.push(Turn::tool_result("call_1", "late", false));
        assert!(conv.validate().is_err());
    }

    #[test]
    fn test_turn_serialization_is_tagged() {
        let turn = Turn::tool_result("call_9", "Error: boom", true);
        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(value["type"], "tool_result");
        assert_eq!(value["is_error"], true);
    }
}
