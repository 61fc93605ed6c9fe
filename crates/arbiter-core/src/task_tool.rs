use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use arbiter_config::AgentConfig;
use arbiter_events::{EventBus, EventPayload, RunId};
use arbiter_hooks::HookChain;
use arbiter_metrics::RunMetrics;
use arbiter_model::{ModelProvider, Role};
use arbiter_session::SessionStore;
use arbiter_tools::{
    ApprovalPolicy, GrepTool, ListDirTool, ReadFileTool, Tool, ToolCall, ToolOutput, ToolRegistry,
    WriteTool,
};

use crate::cancellation::new_pair;
use crate::turn::{AgenticLoop, TurnRequest};

const MAX_DEPTH: usize = 3;
const SUB_SESSION_MAX_TOKENS: usize = 128_000;

/// Delegates a self-contained sub-task to a nested Agentic Loop run with its
/// own session, registry, and hook chain, returning only the sub-agent's
/// final answer. `TaskTool` is intentionally not registered into its own
/// sub-registry, so nesting is bounded by `depth` rather than by omission
/// alone.
pub struct TaskTool {
    model: Arc<dyn ModelProvider>,
    agent_config: Arc<AgentConfig>,
    depth: Arc<AtomicUsize>,
}

impl TaskTool {
    pub fn new(model: Arc<dyn ModelProvider>, agent_config: Arc<AgentConfig>, depth: Arc<AtomicUsize>) -> Self {
        Self { model, agent_config, depth }
    }

    fn build_sub_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(GrepTool);
        registry.register(ListDirTool);
        registry.register(ReadFileTool);
        registry.register(WriteTool);
        registry
    }

    async fn run_sub_task(&self, prompt: String, max_turns: Option<u32>) -> Result<String, String> {
        let mut sub_config = (*self.agent_config).clone();
        if let Some(max_turns) = max_turns {
            sub_config.max_turns = max_turns.min(sub_config.max_turns);
        }

        let registry = Arc::new(Self::build_sub_registry());
        let hooks = Arc::new(HookChain::new());
        let store = Arc::new(SessionStore::in_memory());
        let metrics = Arc::new(RunMetrics::new());
        let sub_loop =
            AgenticLoop::new(self.model.clone(), registry, hooks, store.clone(), metrics, Arc::new(sub_config));

        let session_id = store.create(SUB_SESSION_MAX_TOKENS).await.map_err(|e| e.to_string())?;
        let bus = EventBus::new(RunId::new(), Some(session_id));
        let mut sub = bus.subscribe().await;
        let (_handle, token) = new_pair();

        sub_loop
            .run(TurnRequest { session_id, user_text: prompt, deadline: None }, bus.clone(), token)
            .await
            .map_err(|e| e.to_string())?;

        let mut failure = None;
        while let Ok(event) = sub.try_recv() {
            if let EventPayload::RunError { message, .. } = event.payload {
                failure = Some(message);
            }
        }
        if let Some(message) = failure {
            return Err(message);
        }

        let session = store.get(session_id).await.map_err(|e| e.to_string())?;
        Ok(session
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .and_then(|m| m.as_text())
            .unwrap_or_default()
            .to_string())
    }
}

#[async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &str {
        "task"
    }

    fn description(&self) -> &str {
        "Delegate a self-contained sub-task to a nested agent run with its own conversation \
         history, returning only its final answer. Use for focused sub-problems that don't \
         need to pollute the parent conversation with intermediate tool calls."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "The sub-task to perform, written as a complete, standalone instruction."
                },
                "max_turns": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Optional cap on the sub-agent's own loop iterations."
                }
            },
            "required": ["prompt"]
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let depth = self.depth.fetch_add(1, Ordering::SeqCst);
        if depth >= MAX_DEPTH {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return ToolOutput::err(&call.id, format!("task nesting depth exceeded ({MAX_DEPTH})"));
        }

        let prompt = match call.args.get("prompt").and_then(Value::as_str) {
            Some(p) if !p.is_empty() => p.to_string(),
            _ => {
                self.depth.fetch_sub(1, Ordering::SeqCst);
                return ToolOutput::err(&call.id, "missing required argument 'prompt'");
            }
        };
        let max_turns = call.args.get("max_turns").and_then(Value::as_u64).map(|n| n as u32);

        let result = self.run_sub_task(prompt, max_turns).await;
        self.depth.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(text) => ToolOutput::ok(&call.id, text),
            Err(message) => ToolOutput::err(&call.id, message),
        }
    }
}
