//! mcp-bridge HTTP Gateway
//!
//! Axum-based REST gateway in front of the tool-calling agent. Each session
//! owns its conversation, provider adapter and MCP tool-server process.

mod config;
mod handlers;
mod state;

use std::time::Duration;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::handlers::{
    chat_handler, clear_session, delete_session, health_check, list_sessions, session_history,
    session_tools, show_config,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;

    tracing::info!(
        "Default provider: {} ({})",
        config.provider,
        config.model.as_deref().unwrap_or_else(|| config.providers.default_model(config.provider))
    );
    for kind in [agent_core::ProviderKind::Anthropic, agent_core::ProviderKind::OpenAi] {
        if config.providers.is_configured(kind) {
            tracing::info!("✓ {} API key configured", kind);
        } else {
            tracing::warn!("⚠ {} API key not set - requests to it will be rejected", kind);
        }
    }
    tracing::info!("Tool server: {} {}", config.mcp.command, config.mcp.args.join(" "));

    let bind_addr = config.bind_addr.clone();
    let timeout = chrono::Duration::seconds(i64::try_from(config.session_timeout_secs).unwrap_or(i64::MAX));
    let sweep = Duration::from_secs(config.sweep_interval_secs.max(1));

    let state = AppState::new(config);
    spawn_eviction(state.clone(), timeout, sweep);

    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 mcp-bridge gateway running on http://{}", bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  POST   /chat                  - Send message");
    tracing::info!("  GET    /sessions              - List sessions");
    tracing::info!("  DELETE /sessions/{{id}}         - Delete session");
    tracing::info!("  POST   /sessions/{{id}}/clear   - Clear conversation");
    tracing::info!("  GET    /sessions/{{id}}/tools   - Session tools");
    tracing::info!("  GET    /sessions/{{id}}/history - Conversation history");
    tracing::info!("  GET    /health                - Health check");
    tracing::info!("  GET    /config                - Effective defaults");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drop sessions idle for longer than `timeout`
fn spawn_eviction(state: AppState, timeout: chrono::Duration, every: Duration) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        loop {
            tick.tick().await;
            let evicted = state.store.evict_idle(timeout).await;
            if !evicted.is_empty() {
                tracing::info!(count = evicted.len(), "Evicted idle sessions");
            }
        }
    });
}

fn build_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/config", get(show_config))

        // Agent API
        .route("/chat", post(chat_handler))

        // Sessions
        .route("/sessions", get(list_sessions))
        .route("/sessions/{id}", delete(delete_session))
        .route("/sessions/{id}/clear", post(clear_session))
        .route("/sessions/{id}/tools", get(session_tools))
        .route("/sessions/{id}/history", get(session_history))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use agent_core::{
        error::{AgentError, Result},
        message::{ToolArguments, ToolRequest, Turn},
        provider::{Completion, Decision, GenerationOptions, LlmProvider, ProviderKind},
        reasoning::{Agent, AgentBuilder},
        tool::{ToolDescriptor, ToolInvocationResult, ToolServer},
    };
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::SessionSettings;
    use crate::state::{configure, AgentFactory};

    /// Provider that replays a script shared by every session it backs
    struct ScriptedProvider {
        replies: Arc<Mutex<VecDeque<Result<Decision>>>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Anthropic
        }

        async fn complete(&self, _: &[Turn], _: &[Value], options: &GenerationOptions) -> Result<Completion> {
            let decision = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Decision::final_text("done")))?;
            Ok(Completion::from_decision(decision, options.model.clone()))
        }
    }

    struct AddServer;

    #[async_trait]
    impl ToolServer for AddServer {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
            Ok(vec![ToolDescriptor::new("add").with_description("Add two numbers")])
        }

        async fn call_tool(&self, _: &str, arguments: Value) -> Result<ToolInvocationResult> {
            let sum = arguments["a"].as_i64().unwrap_or(0) + arguments["b"].as_i64().unwrap_or(0);
            Ok(ToolInvocationResult::text(sum.to_string()))
        }
    }

    struct FakeFactory {
        replies: Arc<Mutex<VecDeque<Result<Decision>>>>,
        fail_spawn: bool,
    }

    #[async_trait]
    impl AgentFactory for FakeFactory {
        async fn create(&self, settings: &SessionSettings) -> Result<Agent> {
            if self.fail_spawn {
                return Err(AgentError::Transport("failed to spawn tool server 'missing'".into()));
            }
            let mut agent = configure(AgentBuilder::new(), settings)
                .provider(Arc::new(ScriptedProvider { replies: self.replies.clone() }))
                .tool_server(Arc::new(AddServer))
                .build()?;
            agent.reload_tools().await?;
            Ok(agent)
        }
    }

    fn app_with(replies: Vec<Result<Decision>>, fail_spawn: bool) -> (Router, AppState) {
        let factory = FakeFactory {
            replies: Arc::new(Mutex::new(replies.into())),
            fail_spawn,
        };
        let state = AppState::with_factory(ServerConfig::default(), Arc::new(factory));
        (build_router(state.clone()), state)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    fn add_call() -> Decision {
        Decision::tools(vec![ToolRequest::new(
            "call_1",
            "add",
            ToolArguments::structured(json!({"a": 2, "b": 3})),
        )])
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app_with(vec![], false);
        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["activeSessions"], 0);
    }

    #[tokio::test]
    async fn test_chat_with_tool_round() {
        let (app, state) = app_with(vec![Ok(add_call()), Ok(Decision::final_text("2 + 3 = 5"))], false);

        let (status, body) = call(&app, "POST", "/chat", Some(json!({"message": "add 2 and 3"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "2 + 3 = 5");
        assert_eq!(body["toolsUsed"], json!(["add"]));
        assert_eq!(body["conversationLength"], 4);
        assert_eq!(state.store.len().await, 1);

        let id = body["sessionId"].as_str().unwrap().to_string();
        let (status, history) = call(&app, "GET", &format!("/sessions/{}/history", id), None).await;
        assert_eq!(status, StatusCode::OK);
        let turns = history["history"].as_array().unwrap();
        assert_eq!(turns[1]["type"], "assistant_tool_request");
        assert_eq!(turns[2]["text"], "5");
    }

    #[tokio::test]
    async fn test_chat_reuses_session() {
        let (app, state) = app_with(vec![], false);

        let (_, first) = call(&app, "POST", "/chat", Some(json!({"message": "hi", "sessionId": "abc"}))).await;
        assert_eq!(first["sessionId"], "abc");
        assert_eq!(first["conversationLength"], 2);

        let (_, second) = call(&app, "POST", "/chat", Some(json!({"message": "again", "sessionId": "abc"}))).await;
        assert_eq!(second["conversationLength"], 4);
        assert_eq!(state.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (app, state) = app_with(vec![], false);
        let (status, body) = call(&app, "POST", "/chat", Some(json!({"message": "   "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "EMPTY_MESSAGE");
        assert!(state.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalid_provider_override() {
        let (app, _) = app_with(vec![], false);
        let body = json!({"message": "hi", "config": {"provider": "palm"}});
        let (status, body) = call(&app, "POST", "/chat", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_CONFIG");
    }

    #[tokio::test]
    async fn test_provider_error_is_bad_gateway() {
        let (app, _) = app_with(
            vec![Err(AgentError::Provider { status: 401, body: "invalid x-api-key".into() })],
            false,
        );
        let (status, body) = call(&app, "POST", "/chat", Some(json!({"message": "hi"}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "PROVIDER_ERROR");
        assert!(body["detail"].as_str().unwrap().contains("invalid x-api-key"));
    }

    #[tokio::test]
    async fn test_tool_server_spawn_failure() {
        let (app, state) = app_with(vec![], true);
        let (status, body) = call(&app, "POST", "/chat", Some(json!({"message": "hi"}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "TOOL_SERVER_ERROR");
        assert!(state.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (app, _) = app_with(vec![], false);
        call(&app, "POST", "/chat", Some(json!({"message": "hi", "sessionId": "s1"}))).await;

        let (status, list) = call(&app, "GET", "/sessions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["count"], 1);
        assert_eq!(list["sessions"][0]["sessionId"], "s1");
        assert_eq!(list["sessions"][0]["toolCount"], 1);

        let (_, tools) = call(&app, "GET", "/sessions/s1/tools", None).await;
        assert_eq!(tools["tools"][0]["name"], "add");
        assert_eq!(tools["tools"][0]["inputSchema"], json!({"type": "object", "properties": {}}));

        let (status, cleared) = call(&app, "POST", "/sessions/s1/clear", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cleared["cleared"], true);
        let (_, history) = call(&app, "GET", "/sessions/s1/history", None).await;
        assert_eq!(history["history"], json!([]));

        let (status, deleted) = call(&app, "DELETE", "/sessions/s1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["deleted"], true);

        let (status, missing) = call(&app, "DELETE", "/sessions/s1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(missing["code"], "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_unknown_session_routes_404() {
        let (app, _) = app_with(vec![], false);
        for (method, uri) in [
            ("POST", "/sessions/nope/clear"),
            ("GET", "/sessions/nope/tools"),
            ("GET", "/sessions/nope/history"),
        ] {
            let (status, _) = call(&app, method, uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{} {}", method, uri);
        }
    }

    #[tokio::test]
    async fn test_config_hides_credentials() {
        let mut config = ServerConfig::default();
        config.providers.anthropic.api_key = Some("sk-ant-secret".into());
        let factory = FakeFactory { replies: Arc::default(), fail_spawn: false };
        let app = build_router(AppState::with_factory(config, Arc::new(factory)));

        let (status, body) = call(&app, "GET", "/config", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["provider"], "anthropic");
        assert_eq!(body["anthropicConfigured"], true);
        assert_eq!(body["openaiConfigured"], false);
        assert!(!body.to_string().contains("sk-ant-secret"));
    }
}
