//! # agent-core
//!
//! Provider-agnostic tool-calling orchestration for MCP tool servers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Session                              │
//! │  ┌──────────────┐  ┌──────────────────────────────────────┐  │
//! │  │ Conversation │◀─│                Agent                  │  │
//! │  │  (Turn log)  │  │  ┌───────────┐ ┌────────┐ ┌────────┐  │  │
//! │  └──────────────┘  │  │LlmProvider│ │Catalog │ │Invoker │  │  │
//! │                    │  │(Strategy) │ │        │ │        │  │  │
//! │                    │  └───────────┘ └────────┘ └───┬────┘  │  │
//! │                    └───────────────────────────────┼───────┘  │
//! └────────────────────────────────────────────────────┼──────────┘
//!                                                  ToolServer
//! ```
//!
//! The `LlmProvider` trait hides the OpenAI / Anthropic wire formats and the
//! `ToolServer` trait hides the transport to the tool process, so the loop in
//! [`reasoning`] is written once.

pub mod provider;
pub mod tool;
pub mod reasoning;
pub mod message;
pub mod error;
pub mod session;

pub use error::{AgentError, Result};
pub use message::{Conversation, ToolArguments, ToolRequest, Turn};
pub use provider::{Completion, Decision, GenerationOptions, LlmProvider, ProviderKind};
pub use reasoning::{Agent, AgentBuilder, AgentConfig, RunOutcome};
pub use session::{Session, SessionId, SessionStore, SessionSummary, SharedSession};
pub use tool::{
    ToolCatalog, ToolContent, ToolDescriptor, ToolInvocationResult, ToolInvoker, ToolOutcome,
    ToolPayload, ToolSchema, ToolServer,
};
