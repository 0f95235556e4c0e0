//! Tool System
//!
//! Tools describe themselves with a JSON Schema and are looked up by name.
//! Arguments are checked against the schema before a tool runs, so
//! `execute` can assume required fields are present with the right types.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, ToolServerError};

/// Tool definition as advertised in `tools/list`
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and input schema
    fn definition(&self) -> ToolDefinition;

    /// Run with already validated arguments; returns the result text
    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String>;

    /// Check `arguments` against the input schema
    fn validate(&self, arguments: &Value) -> Result<()> {
        validate_arguments(&self.definition().input_schema, arguments)
    }
}

/// Schema-driven argument check: object shape, required fields, declared
/// JSON types and `enum` values. Unknown properties are allowed.
pub fn validate_arguments(schema: &Value, arguments: &Value) -> Result<()> {
    let Some(args) = arguments.as_object() else {
        return Err(ToolServerError::InvalidParams("arguments must be a JSON object".into()));
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if args.get(name).is_none_or(Value::is_null) {
                return Err(ToolServerError::InvalidParams(format!(
                    "missing required parameter: {}",
                    name
                )));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (name, value) in args {
        let Some(property) = properties.get(name) else {
            continue;
        };

        if let Some(expected) = property.get("type").and_then(Value::as_str) {
            if !matches_type(expected, value) {
                return Err(ToolServerError::InvalidParams(format!(
                    "parameter '{}' must be of type {}",
                    name, expected
                )));
            }
        }

        if let Some(allowed) = property.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                let options: Vec<String> = allowed.iter().map(Value::to_string).collect();
                return Err(ToolServerError::InvalidParams(format!(
                    "parameter '{}' must be one of {}",
                    name,
                    options.join(", ")
                )));
            }
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

/// Registry for available tools; listing keeps registration order
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a new tool, replacing any tool with the same name
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let tool: Arc<dyn Tool> = Arc::new(tool);
        let name = tool.definition().name;
        match self.index.get(&name) {
            Some(&slot) => self.tools[slot] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&slot| self.tools[slot].clone())
    }

    /// Validate and run a tool
    pub async fn call(&self, name: &str, arguments: &Value) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolServerError::UnknownTool(name.to_string()))?;

        // Absent arguments are an empty object
        let empty = Value::Object(Map::new());
        let arguments = if arguments.is_null() { &empty } else { arguments };

        tool.validate(arguments)?;
        let args = arguments
            .as_object()
            .ok_or_else(|| ToolServerError::InvalidParams("arguments must be a JSON object".into()))?;

        tool.execute(args).await
    }

    /// All tool definitions
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.definition().name).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
