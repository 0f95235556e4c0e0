//! JSON-RPC 2.0 message types used on the MCP stdio channel

use agent_core::tool::ToolDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP protocol version sent in `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC 2.0 request or notification (no `id`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: Some(Value::from(id)),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: None,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A line read from the server, by shape
#[derive(Debug)]
pub enum Incoming {
    Response(JsonRpcResponse),
    /// A request or notification initiated by the server
    ServerMessage { method: String, id: Option<Value> },
    Invalid(String),
}

impl Incoming {
    pub fn classify(value: Value) -> Self {
        if let Some(method) = value.get("method").and_then(Value::as_str) {
            return Incoming::ServerMessage {
                method: method.to_string(),
                id: value.get("id").cloned(),
            };
        }

        match serde_json::from_value::<JsonRpcResponse>(value) {
            Ok(response) => Incoming::Response(response),
            Err(e) => Incoming::Invalid(e.to_string()),
        }
    }
}

/// `tools/list` result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}
