//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Tool listing failed; the catalog was reset to empty
    #[error("Tool catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// Provider endpoint answered with a non-success status (or an unreadable body)
    #[error("Provider error (HTTP {status}): {body}")]
    Provider { status: u16, body: String },

    /// Provider could not be reached at all
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Model supplied arguments that could not be decoded
    #[error("Invalid tool arguments: {0}")]
    ToolArgument(String),

    /// Tool server unreachable or failed while serving a request
    #[error("Tool transport error: {0}")]
    Transport(String),

    /// Session error
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// HTTP status reported by the provider, if any
    pub fn provider_status(&self) -> Option<u16> {
        match self {
            AgentError::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::CatalogUnavailable(_) => "The tool server did not return its tool list.".into(),
            AgentError::Provider { status: 401 | 403, .. } => {
                "The AI service rejected the credentials. Please check the API key.".into()
            }
            AgentError::Provider { status: 429, .. } => {
                "The AI service is rate limiting requests. Please wait a moment.".into()
            }
            AgentError::Provider { status, .. } => {
                format!("The AI service returned an error (HTTP {}).", status)
            }
            AgentError::ProviderUnavailable(_) => "The AI service is currently unavailable. Please try again.".into(),
            AgentError::ToolArgument(msg) => format!("Invalid tool input: {}", msg),
            AgentError::Transport(msg) => format!("The tool server failed: {}", msg),
            AgentError::Session(msg) => msg.clone(),
            AgentError::Config(msg) => format!("Invalid configuration: {}", msg),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}
