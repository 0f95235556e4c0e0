//! Tool System
//!
//! The tool catalog advertised by a tool server, the provider-specific schema
//! projection of that catalog, and the invoker that runs one call and folds
//! whatever the server returns into a single block of text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::{ToolRequest, Turn};
use crate::provider::ProviderKind;

/// A tool as listed by the tool server
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to the model)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema of the accepted arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Schema with every field filled in
    pub fn schema(&self) -> ToolSchema {
        let description = match self.description.as_deref() {
            Some(d) if !d.trim().is_empty() => d.to_string(),
            _ => format!("Execute {}", self.name),
        };

        let parameters = match &self.input_schema {
            Some(schema) if !schema.is_null() => schema.clone(),
            _ => empty_object_schema(),
        };

        ToolSchema {
            name: self.name.clone(),
            description,
            parameters,
        }
    }
}

/// `{"type": "object", "properties": {}}`
pub fn empty_object_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// Tool definition with defaults applied, ready for function calling
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSchema {
    /// Shape this schema for one provider's request body
    pub fn for_provider(&self, kind: ProviderKind) -> Value {
        match kind {
            ProviderKind::OpenAi => json!({
                "type": "function",
                "function": {
                    "name": self.name,
                    "description": self.description,
                    "parameters": self.parameters,
                }
            }),
            ProviderKind::Anthropic => json!({
                "name": self.name,
                "description": self.description,
                "input_schema": self.parameters,
            }),
        }
    }
}

// ============================================================================
// Tool Server Seam
// ============================================================================

/// One item of a tool result's content sequence
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ToolContent {
    Text { text: String },
    /// Images, resources, anything that is not text
    Other(Value),
}

impl ToolContent {
    pub fn from_value(value: Value) -> Self {
        let is_text = value.get("type").and_then(Value::as_str) == Some("text");
        match value.get("text").and_then(Value::as_str) {
            Some(text) if is_text => ToolContent::Text { text: text.to_string() },
            _ => ToolContent::Other(value),
        }
    }
}

/// Shape of a tool server's answer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ToolPayload {
    /// `content: [...]`
    Content(Vec<ToolContent>),
    /// A bare string
    Text(String),
    /// Anything else, kept whole
    Raw(Value),
}

/// Raw result of one `call_tool`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationResult {
    pub payload: ToolPayload,

    /// Set when the server reports the call itself failed
    #[serde(default)]
    pub is_error: bool,
}

impl ToolInvocationResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            payload: ToolPayload::Content(vec![ToolContent::Text { text: text.into() }]),
            is_error: false,
        }
    }

    /// Interpret a `tools/call` result object
    pub fn from_value(value: Value) -> Self {
        let is_error = value
            .get("isError")
            .or_else(|| value.get("is_error"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let payload = match value {
            Value::String(text) => ToolPayload::Text(text),
            Value::Object(mut map) => match map.remove("content") {
                Some(Value::Array(items)) => {
                    ToolPayload::Content(items.into_iter().map(ToolContent::from_value).collect())
                }
                Some(Value::String(text)) => ToolPayload::Text(text),
                Some(other) => {
                    map.insert("content".into(), other);
                    ToolPayload::Raw(Value::Object(map))
                }
                None => ToolPayload::Raw(Value::Object(map)),
            },
            other => ToolPayload::Raw(other),
        };

        Self { payload, is_error }
    }

    /// Collapse the payload into one text blob
    pub fn normalized_text(&self) -> String {
        match &self.payload {
            ToolPayload::Content(items) => items
                .iter()
                .map(|item| match item {
                    ToolContent::Text { text } => text.clone(),
                    ToolContent::Other(value) => value.to_string(),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            ToolPayload::Text(text) => text.clone(),
            ToolPayload::Raw(value) => value.to_string(),
        }
    }
}

/// Connection to a tool server (MCP or anything with the same contract)
#[async_trait]
pub trait ToolServer: Send + Sync {
    /// Current tool listing, in server order
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Run one tool. Transport and protocol failures are `AgentError::Transport`.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolInvocationResult>;
}

// ============================================================================
// Catalog
// ============================================================================

/// Tools advertised by the connected server, in server order
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a listing, keeping the first of any duplicated names
    pub fn from_tools(tools: Vec<ToolDescriptor>) -> Self {
        let mut seen = HashSet::new();
        let tools = tools
            .into_iter()
            .filter(|tool| {
                let fresh = seen.insert(tool.name.clone());
                if !fresh {
                    tracing::warn!(tool = %tool.name, "Duplicate tool name in listing, keeping the first");
                }
                fresh
            })
            .collect();

        Self { tools }
    }

    /// Replace the catalog with the server's current listing.
    ///
    /// On failure the catalog is left empty, never stale.
    pub async fn load(&mut self, server: &dyn ToolServer) -> Result<()> {
        match server.list_tools().await {
            Ok(tools) => {
                *self = Self::from_tools(tools);
                tracing::debug!(count = self.len(), "Loaded tool catalog");
                Ok(())
            }
            Err(e) => {
                self.tools.clear();
                tracing::warn!(error = %e, "Tool listing failed, continuing without tools");
                Err(AgentError::CatalogUnavailable(e.to_string()))
            }
        }
    }

    /// Provider-specific function schemas, one per tool, same order
    pub fn to_provider_schema(&self, kind: ProviderKind) -> Vec<Value> {
        self.schemas().iter().map(|s| s.for_provider(kind)).collect()
    }

    /// Schemas with defaults applied
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(ToolDescriptor::schema).collect()
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Number of tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ============================================================================
// Invoker
// ============================================================================

/// Normalized result of one tool call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub call_id: String,
    pub tool_name: String,
    pub text: String,
    pub is_error: bool,
}

impl ToolOutcome {
    fn failure(request: &ToolRequest, error: &AgentError) -> Self {
        let detail = match error {
            AgentError::ToolArgument(reason) => {
                format!("invalid arguments for tool '{}': {}", request.tool_name, reason)
            }
            AgentError::Transport(msg) => msg.clone(),
            other => other.to_string(),
        };

        Self {
            call_id: request.call_id.clone(),
            tool_name: request.tool_name.clone(),
            text: format!("Error: {}", detail),
            is_error: true,
        }
    }

    pub fn into_turn(self) -> Turn {
        Turn::tool_result(self.call_id, self.text, self.is_error)
    }
}

/// Runs tool requests against one server connection
#[derive(Clone)]
pub struct ToolInvoker {
    server: Arc<dyn ToolServer>,
}

impl ToolInvoker {
    pub fn new(server: Arc<dyn ToolServer>) -> Self {
        Self { server }
    }

    /// The underlying connection
    pub fn server(&self) -> &dyn ToolServer {
        self.server.as_ref()
    }

    /// Run one request. Never fails: every failure becomes an error outcome
    /// the model can read.
    pub async fn call(&self, request: &ToolRequest) -> ToolOutcome {
        let arguments = match request.arguments.value() {
            Ok(value) => value.clone(),
            Err(e) => {
                tracing::warn!(tool = %request.tool_name, error = %e, "Rejecting malformed tool arguments");
                return ToolOutcome::failure(request, &e);
            }
        };

        tracing::debug!(tool = %request.tool_name, call_id = %request.call_id, "Calling tool");

        match self.server.call_tool(&request.tool_name, arguments).await {
            Ok(result) => {
                let mut text = result.normalized_text();
                if result.is_error && !text.starts_with("Error") {
                    text = format!("Error: {}", text);
                }
                ToolOutcome {
                    call_id: request.call_id.clone(),
                    tool_name: request.tool_name.clone(),
                    text,
                    is_error: result.is_error,
                }
            }
            Err(e) => {
                tracing::warn!(tool = %request.tool_name, error = %e, "Tool call failed");
                ToolOutcome::failure(request, &e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolArguments;
    use std::sync::Mutex;

    struct StaticServer {
        listing: Option<Vec<ToolDescriptor>>,
        reply: Mutex<Option<Result<ToolInvocationResult>>>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl StaticServer {
        fn listing(tools: Vec<ToolDescriptor>) -> Self {
            Self { listing: Some(tools), reply: Mutex::new(None), calls: Mutex::new(Vec::new()) }
        }

        fn replying(reply: Result<ToolInvocationResult>) -> Self {
            Self { listing: None, reply: Mutex::new(Some(reply)), calls: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ToolServer for StaticServer {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
            self.listing.clone().ok_or_else(|| AgentError::Transport("server exited".into()))
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolInvocationResult> {
            self.calls.lock().unwrap().push((name.to_string(), arguments));
            self.reply.lock().unwrap().take().unwrap_or_else(|| Ok(ToolInvocationResult::text("ok")))
        }
    }

    fn request(args: ToolArguments) -> ToolRequest {
        ToolRequest::new("call_1", "add", args)
    }

    #[test]
    fn test_schema_defaults_and_order() {
        let catalog = ToolCatalog::from_tools(vec![
            ToolDescriptor::new("zeta"),
            ToolDescriptor::new("add")
                .with_description("Add two numbers")
                .with_input_schema(json!({"type": "object", "properties": {"a": {"type": "number"}}})),
            ToolDescriptor::new("blank").with_description("   "),
        ]);

        let schemas = catalog.to_provider_schema(ProviderKind::OpenAi);
        assert_eq!(schemas.len(), 3);
        assert_eq!(schemas[0]["function"]["name"], "zeta");
        assert_eq!(schemas[0]["function"]["description"], "Execute zeta");
        assert_eq!(schemas[0]["function"]["parameters"], empty_object_schema());
        assert_eq!(schemas[1]["function"]["description"], "Add two numbers");
        assert_eq!(schemas[1]["function"]["parameters"]["properties"]["a"]["type"], "number");
        assert_eq!(schemas[2]["function"]["description"], "Execute blank");

        let anthropic = catalog.to_provider_schema(ProviderKind::Anthropic);
        assert_eq!(anthropic[0]["name"], "zeta");
        assert_eq!(anthropic[0]["input_schema"], empty_object_schema());
        assert!(anthropic[0].get("type").is_none());
    }

    #[test]
    fn test_schema_is_deterministic() {
        let catalog = ToolCatalog::from_tools(vec![ToolDescriptor::new("a"), ToolDescriptor::new("b")]);
        assert_eq!(
            catalog.to_provider_schema(ProviderKind::Anthropic),
            catalog.to_provider_schema(ProviderKind::Anthropic)
        );
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let catalog = ToolCatalog::from_tools(vec![
            ToolDescriptor::new("echo").with_description("first"),
            ToolDescriptor::new("echo").with_description("second"),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("echo").unwrap().description.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_failed_load_empties_catalog() {
        let mut catalog = ToolCatalog::new();
        catalog.load(&StaticServer::listing(vec![ToolDescriptor::new("add")])).await.unwrap();
        assert_eq!(catalog.names(), vec!["add"]);

        let err = catalog.load(&StaticServer::replying(Ok(ToolInvocationResult::text("x")))).await;
        assert!(matches!(err, Err(AgentError::CatalogUnavailable(_))));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_normalize_content_sequence() {
        let result = ToolInvocationResult::from_value(json!({
            "content": [
                {"type": "text", "text": "line one"},
                {"type": "image", "data": "AAA", "mimeType": "image/png"},
                {"type": "text", "text": "line two"}
            ]
        }));
        assert!(!result.is_error);
        assert_eq!(
            result.normalized_text(),
            "line one\n{\"data\":\"AAA\",\"mimeType\":\"image/png\",\"type\":\"image\"}\nline two"
        );
    }

    #[test]
    fn test_normalize_string_and_raw() {
        assert_eq!(ToolInvocationResult::from_value(json!("plain")).normalized_text(), "plain");
        assert_eq!(ToolInvocationResult::from_value(json!({"content": "inline"})).normalized_text(), "inline");
        assert_eq!(ToolInvocationResult::from_value(json!({"temp": 21})).normalized_text(), "{\"temp\":21}");
    }

    #[tokio::test]
    async fn test_invoker_transport_error_becomes_result() {
        let server = Arc::new(StaticServer::replying(Err(AgentError::Transport("Unknown tool: nope".into()))));
        let invoker = ToolInvoker::new(server);

        let outcome = invoker.call(&request(ToolArguments::structured(json!({})))).await;
        assert!(outcome.is_error);
        assert_eq!(outcome.text, "Error: Unknown tool: nope");
        assert_eq!(outcome.call_id, "call_1");
    }

    #[tokio::test]
    async fn test_invoker_rejects_malformed_arguments_without_calling() {
        let server = Arc::new(StaticServer::replying(Ok(ToolInvocationResult::text("never"))));
        let invoker = ToolInvoker::new(server.clone());

        let outcome = invoker.call(&request(ToolArguments::parse("{oops"))).await;
        assert!(outcome.is_error);
        assert!(outcome.text.starts_with("Error: invalid arguments for tool 'add'"));
        assert!(server.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invoker_flags_server_reported_errors() {
        let server = Arc::new(StaticServer::replying(Ok(ToolInvocationResult::from_value(json!({
            "content": [{"type": "text", "text": "division by zero"}],
            "isError": true
        })))));
        let invoker = ToolInvoker::new(server);

        let outcome = invoker.call(&request(ToolArguments::structured(json!({"a": 1})))).await;
        assert!(outcome.is_error);
        assert_eq!(outcome.text, "Error: division by zero");
    }
}
