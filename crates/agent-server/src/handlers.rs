//! HTTP Handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use agent_core::{
    error::AgentError,
    message::Turn,
    session::{SessionId, SessionSummary, SharedSession},
};

use crate::config::SessionOverrides;
use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Only used when the session is created by this request
    #[serde(default)]
    pub config: Option<SessionOverrides>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub conversation_length: usize,
    pub tools_used: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub deleted: bool,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub cleared: bool,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsResponse {
    pub session_id: String,
    pub tools: Vec<ToolInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub session_id: String,
    pub history: Vec<Turn>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub provider: String,
    pub model: String,
    pub max_tokens: u32,
    pub max_rounds: usize,
    pub system_prompt: Option<String>,
    pub session_timeout_secs: u64,
    pub tool_server_command: String,
    pub tool_server_args: Vec<String>,
    pub openai_configured: bool,
    pub anthropic_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub detail: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>, detail: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
            detail: detail.into(),
        }),
    )
}

impl From<AgentError> for ErrorResponse {
    fn from(e: AgentError) -> Self {
        Self {
            error: e.user_message(),
            code: error_code(&e).into(),
            detail: e.to_string(),
        }
    }
}

fn error_code(e: &AgentError) -> &'static str {
    match e {
        AgentError::Provider { .. } => "PROVIDER_ERROR",
        AgentError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
        AgentError::Transport(_) => "TOOL_SERVER_ERROR",
        AgentError::CatalogUnavailable(_) => "CATALOG_UNAVAILABLE",
        AgentError::Session(_) => "SESSION_NOT_FOUND",
        AgentError::Config(_) | AgentError::ToolArgument(_) => "INVALID_CONFIG",
        _ => "INTERNAL_ERROR",
    }
}

fn status_for(e: &AgentError) -> StatusCode {
    match e {
        AgentError::Provider { .. } | AgentError::Transport(_) | AgentError::CatalogUnavailable(_) => {
            StatusCode::BAD_GATEWAY
        }
        AgentError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        AgentError::Session(_) => StatusCode::NOT_FOUND,
        AgentError::Config(_) | AgentError::ToolArgument(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn from_agent_error(e: AgentError) -> ApiError {
    let status = status_for(&e);
    if status.is_server_error() {
        tracing::error!(error = %e, "Request failed");
    }
    (status, Json(ErrorResponse::from(e)))
}

async fn find_session(state: &AppState, id: &str) -> Result<SharedSession, ApiError> {
    state
        .store
        .get(&SessionId::from_string(id))
        .await
        .ok_or_else(|| from_agent_error(AgentError::Session(format!("Session not found: {}", id))))
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        active_sessions: state.store.len().await,
    })
}

/// Send a message, creating the session if needed
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "EMPTY_MESSAGE",
            "Message must not be empty",
            "the 'message' field was empty",
        ));
    }

    let requested = payload.session_id.as_deref().filter(|id| !id.trim().is_empty());
    let session = state
        .session(requested, payload.config.as_ref())
        .await
        .map_err(from_agent_error)?;

    let mut session = session.lock().await;
    let outcome = session.send(&payload.message).await.map_err(from_agent_error)?;

    if outcome.bound_exceeded {
        tracing::warn!(session = %session.id, rounds = outcome.rounds, "Round limit reached");
    }

    Ok(Json(ChatResponse {
        response: outcome.text,
        session_id: session.id.to_string(),
        conversation_length: session.conversation_length(),
        tools_used: outcome.tools_used,
    }))
}

/// List active sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    let sessions = state.store.list().await;
    Json(SessionListResponse {
        count: sessions.len(),
        sessions,
    })
}

/// Delete a session and close its tool-server connection
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state
        .store
        .remove(&SessionId::from_string(id.as_str()))
        .await
        .ok_or_else(|| from_agent_error(AgentError::Session(format!("Session not found: {}", id))))?;

    tracing::info!(session = %id, "Session deleted");
    Ok(Json(DeleteResponse {
        deleted: true,
        session_id: id,
    }))
}

/// Forget a session's conversation, keeping its tools
pub async fn clear_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClearResponse>, ApiError> {
    let session = find_session(&state, &id).await?;
    session.lock().await.clear();

    Ok(Json(ClearResponse {
        cleared: true,
        session_id: id,
    }))
}

/// Tools advertised to the session's provider
pub async fn session_tools(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ToolsResponse>, ApiError> {
    let session = find_session(&state, &id).await?;
    let session = session.lock().await;

    let tools = session
        .agent()
        .catalog()
        .schemas()
        .into_iter()
        .map(|schema| ToolInfo {
            name: schema.name,
            description: schema.description,
            input_schema: schema.parameters,
        })
        .collect();

    Ok(Json(ToolsResponse {
        session_id: id,
        tools,
    }))
}

/// Full turn log of a session
pub async fn session_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let session = find_session(&state, &id).await?;
    let history = session.lock().await.conversation().turns().to_vec();

    Ok(Json(HistoryResponse {
        session_id: id,
        history,
    }))
}

/// Effective defaults (credentials are reported only as present/absent)
pub async fn show_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let config = &state.config;
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| config.providers.default_model(config.provider).to_string());

    Json(ConfigResponse {
        provider: config.provider.to_string(),
        model,
        max_tokens: config.max_tokens,
        max_rounds: config.max_rounds,
        system_prompt: config.system_prompt.clone(),
        session_timeout_secs: config.session_timeout_secs,
        tool_server_command: config.mcp.command.clone(),
        tool_server_args: config.mcp.args.clone(),
        openai_configured: config.providers.is_configured(agent_core::ProviderKind::OpenAi),
        anthropic_configured: config.providers.is_configured(agent_core::ProviderKind::Anthropic),
    })
}
