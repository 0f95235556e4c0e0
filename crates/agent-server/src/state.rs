//! Application State

use std::sync::Arc;

use agent_core::{
    error::Result,
    reasoning::{Agent, AgentBuilder},
    session::{Session, SessionId, SessionStore, SharedSession},
};
use agent_runtime::{McpClient, McpServerConfig, ProviderSettings};
use async_trait::async_trait;

use crate::config::{ServerConfig, SessionOverrides, SessionSettings};

/// Builds the agent behind a new session
#[async_trait]
pub trait AgentFactory: Send + Sync {
    async fn create(&self, settings: &SessionSettings) -> Result<Agent>;
}

/// Production factory: one MCP server process per session
pub struct McpAgentFactory {
    providers: ProviderSettings,
    mcp: McpServerConfig,
}

impl McpAgentFactory {
    pub fn new(providers: ProviderSettings, mcp: McpServerConfig) -> Self {
        Self { providers, mcp }
    }
}

#[async_trait]
impl AgentFactory for McpAgentFactory {
    async fn create(&self, settings: &SessionSettings) -> Result<Agent> {
        let provider = self.providers.build(settings.provider)?;
        let client = McpClient::spawn(&self.mcp).await?;

        let mut agent = configure(AgentBuilder::new(), settings)
            .provider(provider)
            .tool_server(Arc::new(client))
            .build()?;

        // A session without tools is still usable
        if let Err(e) = agent.reload_tools().await {
            tracing::warn!(error = %e, "Starting session with an empty tool catalog");
        }

        Ok(agent)
    }
}

/// Apply resolved settings to a builder
pub fn configure(builder: AgentBuilder, settings: &SessionSettings) -> AgentBuilder {
    let mut builder = builder
        .model(settings.model.clone())
        .max_tokens(settings.max_tokens)
        .max_rounds(settings.max_rounds);
    if let Some(temperature) = settings.temperature {
        builder = builder.temperature(temperature);
    }
    if let Some(prompt) = &settings.system_prompt {
        builder = builder.system_prompt(prompt.clone());
    }
    builder
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Live sessions
    pub store: Arc<SessionStore>,

    /// Effective configuration
    pub config: Arc<ServerConfig>,

    /// Creates the agent for each new session
    pub factory: Arc<dyn AgentFactory>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let factory = McpAgentFactory::new(config.providers.clone(), config.mcp.clone());
        Self::with_factory(config, Arc::new(factory))
    }

    pub fn with_factory(config: ServerConfig, factory: Arc<dyn AgentFactory>) -> Self {
        Self {
            store: Arc::new(SessionStore::new()),
            config: Arc::new(config),
            factory,
        }
    }

    /// Existing session for `id`, or a new one created with `overrides`.
    ///
    /// A new session gets `id` when one was supplied, otherwise a fresh one.
    pub async fn session(
        &self,
        id: Option<&str>,
        overrides: Option<&SessionOverrides>,
    ) -> Result<SharedSession> {
        let id = id.map_or_else(SessionId::new, SessionId::from_string);
        if let Some(session) = self.store.get(&id).await {
            return Ok(session);
        }

        let settings = self.config.session_settings(overrides)?;
        let agent = self.factory.create(&settings).await?;
        tracing::info!(
            session = %id,
            provider = %settings.provider,
            model = %settings.model,
            tools = agent.catalog().len(),
            "Session created"
        );

        Ok(self.store.insert(Session::new(id, agent)).await)
    }
}
