//! MCP (Model Context Protocol) client for tool servers running as child
//! processes, speaking newline-delimited JSON-RPC 2.0 over stdio.

pub mod client;
pub mod protocol;

pub use client::{McpClient, McpServerConfig};
pub use protocol::PROTOCOL_VERSION;
