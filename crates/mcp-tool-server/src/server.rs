//! JSON-RPC dispatch over newline-delimited stdio

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{codes, Result, ToolServerError};
use crate::tool::ToolRegistry;

/// Protocol version we answer with when the client does not ask for one
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP server over a tool registry
pub struct McpServer {
    registry: ToolRegistry,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Serve until the reader reaches EOF
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let Some(response) = self.handle_line(&line).await else {
                continue;
            };

            let mut out = serde_json::to_string(&response)?;
            out.push('\n');
            writer.write_all(out.as_bytes()).await?;
            writer.flush().await?;
        }

        tracing::info!("Client closed stdin, shutting down");
        Ok(())
    }

    /// Handle one line; `None` for notifications
    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        let message: Value = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable message");
                return Some(error_response(Value::Null, codes::PARSE_ERROR, &format!("Parse error: {}", e)));
            }
        };

        let id = message.get("id").cloned();
        let Some(method) = message.get("method").and_then(Value::as_str) else {
            return Some(error_response(
                id.unwrap_or(Value::Null),
                codes::INVALID_REQUEST,
                "Invalid request: missing method",
            ));
        };
        let params = message.get("params").cloned().unwrap_or(Value::Null);

        let Some(id) = id else {
            tracing::debug!(method, "Notification");
            return None;
        };

        tracing::debug!(method, id = %id, "Request");
        Some(match self.dispatch(method, &params).await {
            Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Err(e) => {
                tracing::warn!(method, error = %e, "Request failed");
                error_response(id, e.code(), &e.to_string())
            }
        })
    }

    async fn dispatch(&self, method: &str, params: &Value) -> Result<Value> {
        match method {
            "initialize" => Ok(self.initialize(params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({"tools": self.registry.definitions()})),
            "tools/call" => self.call_tool(params).await,
            other => Err(ToolServerError::MethodNotFound(other.to_string())),
        }
    }

    fn initialize(&self, params: &Value) -> Value {
        let version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);

        if let Some(client) = params.get("clientInfo") {
            tracing::info!(client = %client, tools = self.registry.len(), "Client connected");
        }

        json!({
            "protocolVersion": version,
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        })
    }

    /// Unknown tools and schema violations are protocol errors; a tool that
    /// runs and fails yields an `isError` result
    async fn call_tool(&self, params: &Value) -> Result<Value> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolServerError::InvalidParams("missing tool name".into()))?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        match self.registry.call(name, &arguments).await {
            Ok(text) => {
                tracing::debug!(tool = name, "Tool succeeded");
                Ok(text_result(&text, false))
            }
            Err(ToolServerError::Execution(message)) => {
                tracing::info!(tool = name, error = %message, "Tool reported an error");
                Ok(text_result(&message, true))
            }
            Err(e) => Err(e),
        }
    }
}

fn text_result(text: &str, is_error: bool) -> Value {
    json!({
        "content": [{"type": "text", "text": text}],
        "isError": is_error,
    })
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message},
    })
}
