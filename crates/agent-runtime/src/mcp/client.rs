//! MCP stdio client
//!
//! Spawns the tool server, performs the `initialize` handshake and routes
//! responses back to their callers by request id. One client is one
//! connection; sessions never share it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    tool::{ToolDescriptor, ToolInvocationResult, ToolServer},
};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::{wrappers::LinesStream, StreamExt};

use super::protocol::{Incoming, JsonRpcRequest, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION};

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// How to launch a tool server
#[derive(Clone, Debug)]
pub struct McpServerConfig {
    /// Executable to run
    pub command: String,

    /// Command-line arguments
    pub args: Vec<String>,

    /// Extra environment variables
    pub env: HashMap<String, String>,

    /// Working directory (inherited when unset)
    pub cwd: Option<PathBuf>,

    /// How long to wait for any single response
    pub request_timeout: Duration,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            command: "mcp-tool-server".into(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl McpServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            command: std::env::var("MCP_SERVER_COMMAND").unwrap_or(defaults.command),
            args: std::env::var("MCP_SERVER_ARGS")
                .map(|a| a.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            env: HashMap::new(),
            cwd: std::env::var("MCP_SERVER_CWD").ok().map(PathBuf::from),
            request_timeout: std::env::var("MCP_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }
}

/// Connected MCP client
pub struct McpClient {
    writer: Mutex<Writer>,
    pending: Pending,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    request_timeout: Duration,
    reader: JoinHandle<()>,
    server_info: Option<Value>,
    // Killed on drop
    _child: Option<Child>,
}

impl McpClient {
    /// Spawn the configured server and complete the handshake
    pub async fn spawn(config: &McpServerConfig) -> Result<Self> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .envs(&config.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true);
        if let Some(cwd) = &config.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|e| {
            AgentError::Transport(format!("failed to spawn tool server '{}': {}", config.command, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentError::Transport("tool server stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Transport("tool server stdout unavailable".into()))?;

        let mut client = Self::connect(stdout, stdin, config.request_timeout).await?;
        tracing::info!(command = %config.command, pid = ?child.id(), "Connected to tool server");
        client._child = Some(child);
        Ok(client)
    }

    /// Handshake over an already open byte stream pair
    pub async fn connect<R, W>(reader: R, writer: W, request_timeout: Duration) -> Result<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_loop(reader, pending.clone(), closed.clone()));

        let mut client = Self {
            writer: Mutex::new(Box::new(writer)),
            pending,
            next_id: AtomicU64::new(1),
            closed,
            request_timeout,
            reader,
            server_info: None,
            _child: None,
        };

        client.initialize().await?;
        Ok(client)
    }

    async fn initialize(&mut self) -> Result<()> {
        let result = self
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                })),
            )
            .await?;

        self.server_info = result.get("serverInfo").cloned();
        self.notify("notifications/initialized", None).await?;
        tracing::debug!(server = ?self.server_info, "MCP handshake complete");
        Ok(())
    }

    /// `serverInfo` reported during the handshake
    pub fn server_info(&self) -> Option<&Value> {
        self.server_info.as_ref()
    }

    /// Whether the server side of the connection has gone away
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send a request and wait for its response's `result`
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if self.is_closed() {
            return Err(AgentError::Transport("tool server connection is closed".into()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        // The reader may have shut down between the check above and the insert
        if self.is_closed() {
            self.pending.lock().await.remove(&id);
            return Err(AgentError::Transport("tool server connection is closed".into()));
        }

        if let Err(e) = self.write(&JsonRpcRequest::new(id, method, params)).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(AgentError::Transport(format!(
                    "tool server closed the connection during '{}'",
                    method
                )));
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(AgentError::Transport(format!(
                    "timed out after {:?} waiting for '{}'",
                    self.request_timeout, method
                )));
            }
        };

        if let Some(error) = response.error {
            return Err(AgentError::Transport(error.message));
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Send a notification (no response expected)
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        self.write(&JsonRpcRequest::notification(method, params)).await
    }

    async fn write(&self, message: &JsonRpcRequest) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AgentError::Transport(format!("failed to write to tool server: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| AgentError::Transport(format!("failed to flush tool server stdin: {}", e)))
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Route every response line to its waiter until the stream ends, then fail
/// whatever is still pending
async fn read_loop<R>(reader: R, pending: Pending, closed: Arc<AtomicBool>)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut lines = LinesStream::new(BufReader::new(reader).lines());

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Tool server stdout read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let value: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, line = %line, "Ignoring non-JSON line from tool server");
                continue;
            }
        };

        match Incoming::classify(value) {
            Incoming::Response(response) => {
                let waiter = match response.id.as_ref().and_then(Value::as_u64) {
                    Some(id) => pending.lock().await.remove(&id),
                    None => None,
                };
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => tracing::warn!(id = ?response.id, "Response for unknown request id"),
                }
            }
            Incoming::ServerMessage { method, id: None } => {
                tracing::debug!(method = %method, "Tool server notification");
            }
            Incoming::ServerMessage { method, id: Some(_) } => {
                tracing::warn!(method = %method, "Ignoring request initiated by tool server");
            }
            Incoming::Invalid(reason) => {
                tracing::warn!(reason = %reason, "Ignoring malformed JSON-RPC message");
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    pending.lock().await.clear();
    tracing::info!("Tool server connection closed");
}

#[async_trait]
impl ToolServer for McpClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({"cursor": c}));
            let result = self.request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(result)
                .map_err(|e| AgentError::Transport(format!("invalid tools/list result: {}", e)))?;

            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolInvocationResult> {
        let result = self
            .request("tools/call", Some(json!({"name": name, "arguments": arguments})))
            .await?;
        Ok(ToolInvocationResult::from_value(result))
    }
}
