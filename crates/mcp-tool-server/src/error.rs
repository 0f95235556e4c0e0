//! Error Types

use thiserror::Error;

/// Result type alias for tool server operations
pub type Result<T> = std::result::Result<T, ToolServerError>;

/// JSON-RPC error codes
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Tool server error types
#[derive(Error, Debug)]
pub enum ToolServerError {
    /// No tool registered under this name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments do not match the tool's input schema
    #[error("Invalid arguments: {0}")]
    InvalidParams(String),

    /// Method is not part of the protocol surface we serve
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// The tool ran and failed; reported to the caller as an error result
    #[error("{0}")]
    Execution(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ToolServerError {
    /// JSON-RPC error code for this error
    pub fn code(&self) -> i64 {
        match self {
            ToolServerError::UnknownTool(_) | ToolServerError::InvalidParams(_) => codes::INVALID_PARAMS,
            ToolServerError::MethodNotFound(_) => codes::METHOD_NOT_FOUND,
            ToolServerError::Json(_) => codes::PARSE_ERROR,
            ToolServerError::Execution(_) | ToolServerError::Io(_) => codes::INTERNAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(ToolServerError::UnknownTool("x".into()).code(), -32602);
        assert_eq!(ToolServerError::InvalidParams("x".into()).code(), -32602);
        assert_eq!(ToolServerError::MethodNotFound("x".into()).code(), -32601);
    }
}
