//! Session Management
//!
//! A session binds one conversation to the agent (provider, tool connection,
//! catalog) that drives it. The store keeps sessions by id; eviction of idle
//! sessions is driven from outside (a timer tick or a request).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::Result;
use crate::message::Conversation;
use crate::reasoning::{Agent, RunOutcome};

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A conversation plus the agent that drives it
pub struct Session {
    /// Unique identifier
    pub id: SessionId,

    agent: Agent,
    conversation: Conversation,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session around a ready agent
    pub fn new(id: SessionId, agent: Agent) -> Self {
        let now = Utc::now();
        Self {
            id,
            agent,
            conversation: Conversation::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Handle one user message
    pub async fn send(&mut self, message: &str) -> Result<RunOutcome> {
        self.touch();
        let outcome = self.agent.run(&mut self.conversation, message).await;
        self.touch();
        outcome
    }

    /// Forget the conversation; tools and connection stay
    pub fn clear(&mut self) {
        self.conversation.clear();
        self.touch();
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Turn count
    pub fn conversation_length(&self) -> usize {
        self.conversation.len()
    }

    /// Whether the session has been idle for longer than `timeout`
    pub fn is_idle(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        now - self.updated_at > timeout
    }

    pub fn summary(&self) -> SessionSummary {
        let generation = &self.agent.config().generation;
        SessionSummary {
            session_id: self.id.to_string(),
            created_at: self.created_at,
            last_activity: self.updated_at,
            conversation_length: self.conversation.len(),
            tool_count: self.agent.catalog().len(),
            provider: self.agent.provider().kind().to_string(),
            model: generation.model.clone(),
        }
    }
}

/// Listing view of a session
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub conversation_length: usize,
    pub tool_count: usize,
    pub provider: String,
    pub model: String,
}

/// Shared handle to one session; the mutex serializes its requests
pub type SharedSession = Arc<Mutex<Session>>;

/// In-memory session store
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SharedSession>>,
    // Last known summary of each session, served while it is busy
    summaries: Mutex<HashMap<SessionId, SessionSummary>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            summaries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a session
    pub async fn get(&self, id: &SessionId) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Insert a session unless one with the same id appeared meanwhile;
    /// returns whichever session is stored under the id afterwards
    pub async fn insert(&self, session: Session) -> SharedSession {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&session.id) {
            return existing.clone();
        }

        let id = session.id.clone();
        self.summaries.lock().await.insert(id.clone(), session.summary());
        let handle = Arc::new(Mutex::new(session));
        sessions.insert(id, handle.clone());
        handle
    }

    /// Remove a session; dropping it closes its tool connection
    pub async fn remove(&self, id: &SessionId) -> Option<SharedSession> {
        self.sessions.write().await.remove(id)
    }

    /// Number of sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Check if empty
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Summaries of every session, most recently active first.
    ///
    /// Never waits on a session busy with a request: those are reported with
    /// the summary taken the last time they were idle.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let handles: Vec<(SessionId, SharedSession)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();

        let mut summaries = self.summaries.lock().await;
        let mut result = Vec::with_capacity(handles.len());
        let mut listed = HashMap::with_capacity(handles.len());

        for (id, handle) in handles {
            let summary = match handle.try_lock() {
                Ok(session) => Some(session.summary()),
                Err(_) => summaries.get(&id).cloned(),
            };
            if let Some(summary) = summary {
                listed.insert(id, summary.clone());
                result.push(summary);
            }
        }

        // Drops removed and evicted sessions as well
        *summaries = listed;
        drop(summaries);

        result.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        result
    }

    /// Drop sessions idle for longer than `timeout`. Sessions busy with a
    /// request are skipped.
    pub async fn evict_idle(&self, timeout: chrono::Duration) -> Vec<SessionId> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;

        let expired: Vec<SessionId> = sessions
            .iter()
            .filter(|(_, handle)| {
                handle
                    .try_lock()
                    .map(|session| session.is_idle(now, timeout))
                    .unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            sessions.remove(id);
            tracing::info!(session = %id, "Evicted idle session");
        }

        expired
    }
}
