//! Orchestration Loop
//!
//! Drives one conversation: ask the provider, run any requested tools in
//! request order, feed the results back, and stop on a final answer or when
//! the round bound is reached.
//!
//! ```text
//! AwaitingUserInput ──▶ ProviderRound ──Final──▶ Done
//!                            │  ▲
//!                ToolRequests│  │all results appended
//!                            ▼  │
//!                        Dispatching
//! ```

use std::sync::Arc;

use serde::Serialize;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Turn};
use crate::provider::{Decision, GenerationOptions, LlmProvider};
use crate::tool::{ToolCatalog, ToolInvoker, ToolServer};

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Maximum provider rounds per user message
    pub max_rounds: usize,

    /// Generation options
    pub generation: GenerationOptions,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            generation: GenerationOptions::default(),
        }
    }
}

/// Default bound on provider rounds per user message
pub const DEFAULT_MAX_ROUNDS: usize = 10;

/// Result of handling one user message
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    /// Final text returned to the caller (may be empty)
    pub text: String,

    /// Provider rounds used
    pub rounds: usize,

    /// Names of tools dispatched, in call order
    pub tools_used: Vec<String>,

    /// The loop stopped on the round bound rather than a final answer
    pub bound_exceeded: bool,
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    invoker: ToolInvoker,
    catalog: ToolCatalog,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent with an empty catalog; call [`Agent::reload_tools`]
    /// to populate it
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        server: Arc<dyn ToolServer>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            invoker: ToolInvoker::new(server),
            catalog: ToolCatalog::new(),
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, server: Arc<dyn ToolServer>) -> Self {
        Self::new(provider, server, AgentConfig::default())
    }

    /// Replace the catalog with the server's current listing.
    /// On failure the catalog is empty and the agent keeps working without tools.
    pub async fn reload_tools(&mut self) -> Result<()> {
        self.catalog.load(self.invoker.server()).await
    }

    /// Handle one user message against `conversation`.
    ///
    /// A provider failure is returned as-is; whatever was appended before it
    /// (at least the user turn) stays in the log.
    pub async fn run(&self, conversation: &mut Conversation, message: &str) -> Result<RunOutcome> {
        conversation.push(Turn::user(message));

        let schemas = self.catalog.to_provider_schema(self.provider.kind());
        let mut outcome = RunOutcome::default();
        let mut partial = String::new();

        while outcome.rounds < self.config.max_rounds {
            outcome.rounds += 1;

            let completion = self
                .provider
                .complete(conversation.turns(), &schemas, &self.config.generation)
                .await
                .inspect_err(|e| {
                    tracing::error!(round = outcome.rounds, error = %e, "Provider round failed");
                })?;

            let (text, calls) = match completion.decision {
                Decision::Final { text } => {
                    tracing::debug!(round = outcome.rounds, "Provider returned final text");
                    conversation.push(Turn::assistant(text.clone()));
                    outcome.text = text;
                    return Ok(outcome);
                }
                Decision::ToolRequests { text, calls } => (text, calls),
            };

            tracing::debug!(round = outcome.rounds, calls = calls.len(), "Provider requested tools");
            if !text.is_empty() {
                partial.clone_from(&text);
            }
            conversation.push(Turn::tool_request(text, calls.clone()));

            for call in &calls {
                let result = self.invoker.call(call).await;
                outcome.tools_used.push(call.tool_name.clone());
                conversation.push(result.into_turn());
            }
        }

        tracing::warn!(
            max_rounds = self.config.max_rounds,
            "Round bound reached while the model was still requesting tools"
        );
        conversation.push(Turn::assistant(partial.clone()));
        outcome.text = partial;
        outcome.bound_exceeded = true;
        Ok(outcome)
    }

    /// Current tool catalog
    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn provider(&self) -> &dyn LlmProvider {
        self.provider.as_ref()
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    server: Option<Arc<dyn ToolServer>>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            server: None,
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool_server(mut self, server: Arc<dyn ToolServer>) -> Self {
        self.server = Some(server);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.generation.system_prompt = Some(prompt.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.config.generation.max_tokens = max;
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = Some(temp);
        self
    }

    pub fn max_rounds(mut self, max: usize) -> Self {
        self.config.max_rounds = max;
        self
    }

    /// Build without contacting the tool server
    pub fn build(self) -> Result<Agent> {
        let provider = self.provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;
        let server = self.server
            .ok_or_else(|| AgentError::Config("Tool server is required".into()))?;
        if self.config.max_rounds == 0 {
            return Err(AgentError::Config("max_rounds must be at least 1".into()));
        }

        Ok(Agent::new(provider, server, self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ToolArguments, ToolRequest};
    use crate::provider::{Completion, ProviderKind};
    use crate::tool::{ToolDescriptor, ToolInvocationResult};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays scripted decisions and records what it was sent
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<Decision>>>,
        seen: Mutex<Vec<(Vec<Turn>, Vec<Value>)>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<Decision>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<(Vec<Turn>, Vec<Value>)> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }

        async fn complete(
            &self,
            history: &[Turn],
            tools: &[Value],
            options: &GenerationOptions,
        ) -> Result<Completion> {
            self.seen.lock().unwrap().push((history.to_vec(), tools.to_vec()));
            let reply = self.replies.lock().unwrap().pop_front()
                .unwrap_or_else(|| Ok(Decision::final_text("")));
            reply.map(|d| Completion::from_decision(d, options.model.clone()))
        }
    }

    /// Calculator-ish tool server; `delays` slows individual calls down
    struct FakeServer {
        tools: Vec<ToolDescriptor>,
        delays: Vec<(String, u64)>,
        completed: Mutex<Vec<String>>,
    }

    impl FakeServer {
        fn new(tools: Vec<ToolDescriptor>) -> Arc<Self> {
            Self::with_delays(tools, Vec::new())
        }

        fn with_delays(tools: Vec<ToolDescriptor>, delays: Vec<(&str, u64)>) -> Arc<Self> {
            Arc::new(Self {
                tools,
                delays: delays.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
                completed: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ToolServer for FakeServer {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
            Ok(self.tools.clone())
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolInvocationResult> {
            let tag = arguments.get("tag").and_then(Value::as_str).unwrap_or_default().to_string();
            if let Some((_, ms)) = self.delays.iter().find(|(t, _)| *t == tag) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            self.completed.lock().unwrap().push(tag.clone());

            match name {
                "add" => {
                    let a = arguments["a"].as_f64().unwrap_or_default();
                    let b = arguments["b"].as_f64().unwrap_or_default();
                    Ok(ToolInvocationResult::text(format!("Result: {}", a + b)))
                }
                "echo" => Ok(ToolInvocationResult::text(format!("echo {}", tag))),
                other => Err(AgentError::Transport(format!("Unknown tool: {}", other))),
            }
        }
    }

    fn add_tool() -> ToolDescriptor {
        ToolDescriptor::new("add").with_input_schema(json!({
            "type": "object",
            "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
            "required": ["a", "b"]
        }))
    }

    fn call(id: &str, name: &str, args: Value) -> ToolRequest {
        ToolRequest::new(id, name, ToolArguments::structured(args))
    }

    async fn agent(provider: Arc<ScriptedProvider>, server: Arc<FakeServer>, max_rounds: usize) -> Agent {
        let mut agent = AgentBuilder::new()
            .provider(provider)
            .tool_server(server)
            .max_rounds(max_rounds)
            .build()
            .unwrap();
        agent.reload_tools().await.unwrap();
        agent
    }

    #[tokio::test]
    async fn test_tool_round_then_final_answer() {
        let provider = ScriptedProvider::new(vec![
            Ok(Decision::tools(vec![call("call_1", "add", json!({"a": 2, "b": 2}))])),
            Ok(Decision::final_text("The answer is 4.")),
        ]);
        let agent = agent(provider.clone(), FakeServer::new(vec![add_tool()]), 10).await;
        let mut conv = Conversation::new();

        let outcome = agent.run(&mut conv, "what is 2+2").await.unwrap();

        assert_eq!(outcome.text, "The answer is 4.");
        assert_eq!(outcome.tools_used, vec!["add"]);
        assert_eq!(outcome.rounds, 2);
        assert!(!outcome.bound_exceeded);
        assert_eq!(
            conv.turns(),
            &[
                Turn::user("what is 2+2"),
                Turn::tool_request("", vec![call("call_1", "add", json!({"a": 2, "b": 2}))]),
                Turn::tool_result("call_1", "Result: 4", false),
                Turn::assistant("The answer is 4."),
            ]
        );
        assert!(conv.validate().is_ok());

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].1[0]["function"]["name"], "add");
        assert_eq!(requests[1].0.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_the_model() {
        let provider = ScriptedProvider::new(vec![
            Ok(Decision::tools(vec![call("call_x", "does_not_exist", json!({}))])),
            Ok(Decision::final_text("Sorry, that tool is unavailable.")),
        ]);
        let agent = agent(provider.clone(), FakeServer::new(vec![add_tool()]), 10).await;
        let mut conv = Conversation::new();

        let outcome = agent.run(&mut conv, "do something").await.unwrap();

        assert_eq!(outcome.text, "Sorry, that tool is unavailable.");
        match &conv.turns()[2] {
            Turn::ToolResult { call_id, text, is_error } => {
                assert_eq!(call_id, "call_x");
                assert!(*is_error);
                assert!(text.starts_with("Error:"));
            }
            other => panic!("expected tool result, got {:?}", other),
        }
        assert_eq!(provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_user_turn() {
        let provider = ScriptedProvider::new(vec![Err(AgentError::Provider {
            status: 401,
            body: "{\"error\":\"invalid x-api-key\"}".into(),
        })]);
        let agent = agent(provider, FakeServer::new(vec![add_tool()]), 10).await;
        let mut conv = Conversation::new();

        let err = agent.run(&mut conv, "hello").await.unwrap_err();

        assert_eq!(err.provider_status(), Some(401));
        assert_eq!(conv.turns(), &[Turn::user("hello")]);
    }

    #[tokio::test]
    async fn test_results_follow_request_order_not_completion_order() {
        let provider = ScriptedProvider::new(vec![
            Ok(Decision::tools(vec![
                call("c1", "echo", json!({"tag": "one"})),
                call("c2", "echo", json!({"tag": "two"})),
                call("c3", "echo", json!({"tag": "three"})),
            ])),
            Ok(Decision::final_text("done")),
        ]);
        let server = FakeServer::with_delays(
            vec![ToolDescriptor::new("echo")],
            vec![("one", 30), ("three", 15)],
        );
        let agent = agent(provider, server.clone(), 10).await;
        let mut conv = Conversation::new();

        agent.run(&mut conv, "echo three times").await.unwrap();

        let ids: Vec<&str> = conv
            .turns()
            .iter()
            .filter_map(|t| match t {
                Turn::ToolResult { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert_eq!(*server.completed.lock().unwrap(), vec!["one", "two", "three"]);
        assert!(conv.validate().is_ok());
    }

    #[tokio::test]
    async fn test_round_bound_returns_partial_text() {
        let looping = || Ok(Decision::tools_with_text(
            "Still checking...",
            vec![call(&ToolRequest::generate_call_id(), "echo", json!({"tag": "again"}))],
        ));
        let provider = ScriptedProvider::new(vec![looping(), looping(), looping(), looping()]);
        let agent = agent(provider.clone(), FakeServer::new(vec![ToolDescriptor::new("echo")]), 3).await;
        let mut conv = Conversation::new();

        let outcome = agent.run(&mut conv, "loop forever").await.unwrap();

        assert!(outcome.bound_exceeded);
        assert_eq!(outcome.rounds, 3);
        assert_eq!(outcome.text, "Still checking...");
        assert_eq!(provider.requests().len(), 3);
        assert_eq!(conv.last(), Some(&Turn::assistant("Still checking...")));
        assert!(conv.validate().is_ok());
    }

    #[tokio::test]
    async fn test_empty_reply_is_empty_final_text() {
        let provider = ScriptedProvider::new(vec![Ok(Decision::final_text(""))]);
        let agent = agent(provider, FakeServer::new(Vec::new()), 10).await;
        let mut conv = Conversation::new();

        let outcome = agent.run(&mut conv, "say nothing").await.unwrap();
        assert_eq!(outcome.text, "");
        assert_eq!(conv.last(), Some(&Turn::assistant("")));
    }

    #[tokio::test]
    async fn test_final_text_is_returned_unchanged() {
        let text = "  Line one\n\n\tline two with trailing space  ";
        let provider = ScriptedProvider::new(vec![Ok(Decision::final_text(text))]);
        let agent = agent(provider, FakeServer::new(Vec::new()), 10).await;
        let mut conv = Conversation::new();

        let outcome = agent.run(&mut conv, "format test").await.unwrap();
        assert_eq!(outcome.text, text);
        assert_eq!(conv.last(), Some(&Turn::assistant(text)));
    }

    #[tokio::test]
    async fn test_cleared_conversation_starts_fresh() {
        let provider = ScriptedProvider::new(vec![
            Ok(Decision::final_text("first")),
            Ok(Decision::final_text("second")),
        ]);
        let agent = agent(provider.clone(), FakeServer::new(Vec::new()), 10).await;
        let mut conv = Conversation::new();

        agent.run(&mut conv, "one").await.unwrap();
        conv.clear();
        assert!(conv.is_empty());
        agent.run(&mut conv, "two").await.unwrap();

        let requests = provider.requests();
        assert_eq!(requests[1].0, vec![Turn::user("two")]);
        assert!(requests[1].1.is_empty());
    }

    #[test]
    fn test_builder_requires_collaborators() {
        assert!(matches!(AgentBuilder::new().build(), Err(AgentError::Config(_))));
    }
}
