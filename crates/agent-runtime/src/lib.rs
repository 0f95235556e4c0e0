//! # agent-runtime
//!
//! Concrete collaborators for the reasoning loop in `agent-core`.
//!
//! ## Providers
//!
//! - **Anthropic** (default): `POST /v1/messages` with `tool_use` blocks
//! - **OpenAI**: `POST /chat/completions` with function calling; also used
//!   for OpenAI-compatible servers via `OPENAI_BASE_URL`
//!
//! ## Tool servers
//!
//! - **MCP over stdio**: [`McpClient`] spawns a server process and speaks
//!   newline-delimited JSON-RPC 2.0 on its stdin/stdout
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{McpClient, McpServerConfig, ProviderSettings};
//!
//! let tools = Arc::new(McpClient::spawn(&McpServerConfig::from_env()).await?);
//! let provider = ProviderSettings::from_env().build(ProviderKind::Anthropic)?;
//! let mut agent = AgentBuilder::new()
//!     .provider(provider)
//!     .tool_server(tools)
//!     .build()?;
//! agent.reload_tools().await?;
//! ```

pub mod anthropic;
pub mod factory;
mod http;
pub mod mcp;
pub mod openai;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use factory::ProviderSettings;
pub use mcp::{McpClient, McpServerConfig};
pub use openai::{OpenAiConfig, OpenAiProvider};

// Re-export core types for convenience
pub use agent_core::{Agent, AgentError, LlmProvider, ProviderKind, Result, Session, ToolServer};
