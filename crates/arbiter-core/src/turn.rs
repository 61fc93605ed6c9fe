// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The Agentic Loop (§4.3): drives one run from a user turn to completion,
//! streaming typed events for every text delta, tool call, and lifecycle
//! transition, and persisting the resulting history to the Session Store.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arbiter_config::AgentConfig;
use arbiter_events::{
    CustomEvent, Event, EventBus, EventPayload, MessageId, RunErrorKind, SessionId, ToolCallId,
    ToolOutcome,
};
use arbiter_hooks::{HookChain, HookOutcome, ToolCallRequest, ToolCallResult};
use arbiter_model::{CompletionRequest, FunctionCall, Message, MessageContent, ModelProvider, ResponseEvent, Role};
use arbiter_session::{Session, SessionStore, ToolCallRecord, ToolCallStatus};
use arbiter_tools::{ToolCall as RegistryToolCall, ToolRegistry};
use futures::StreamExt;
use rand::Rng;

use crate::cancellation::CancellationToken;
use crate::compact::{compact_session_with_strategy, emergency_compact};
use crate::prompts::{system_prompt, PromptContext};

const MAX_LLM_RETRIES: u32 = 3;
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// One submitted user turn. `deadline` bounds the whole run, independent of
/// any individual tool or LLM-call timeout.
pub struct TurnRequest {
    pub session_id: SessionId,
    pub user_text: String,
    pub deadline: Option<Instant>,
}

/// Wires the Tool Registry, Hook Chain, Session Store, and a model provider
/// together and drives the turn-by-turn loop described in §4.3.
pub struct AgenticLoop {
    model: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    hooks: Arc<HookChain>,
    store: Arc<SessionStore>,
    metrics: Arc<arbiter_metrics::RunMetrics>,
    config: Arc<AgentConfig>,
    tool_timeout: Duration,
}

/// Per-tool-call accumulator keyed by the provider's stream index, so a
/// response with several interleaved tool calls is tracked independently of
/// arrival order of argument deltas.
struct PendingToolCall {
    our_id: ToolCallId,
    name: String,
    args: String,
}

impl AgenticLoop {
    pub fn new(
        model: Arc<dyn ModelProvider>,
        tools: Arc<ToolRegistry>,
        hooks: Arc<HookChain>,
        store: Arc<SessionStore>,
        metrics: Arc<arbiter_metrics::RunMetrics>,
        config: Arc<AgentConfig>,
    ) -> Self {
        Self { model, tools, hooks, store, metrics, config, tool_timeout: DEFAULT_TOOL_TIMEOUT }
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Drive one run to completion. Emits every event on `bus`; the caller
    /// (Stream Transport) is responsible for forwarding them to clients.
    /// Returns `Ok(())` whether the run finished, errored, or was cancelled —
    /// the emitted `run_finished` / `run_error` event is the authoritative
    /// outcome, not this method's return value.
    pub async fn run(
        &self,
        req: TurnRequest,
        bus: Arc<EventBus>,
        mut cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let session_id = req.session_id;

        if self.hooks.on_query_start(session_id).await.is_reject() {
            self.run_error(&bus, RunErrorKind::RejectedByHook, "query rejected by hook").await;
            return Ok(());
        }

        bus.publish(EventPayload::RunStarted).await;
        self.metrics.record_run_started();
        self.store.set_active_run(session_id, true).await?;

        let mut session = self.store.get(session_id).await?;
        let user_message = Message::user(req.user_text.clone());
        session.push(user_message.clone());
        self.store.append_message(session_id, user_message).await?;

        let outcome = self.drive(&mut session, &bus, &mut cancel, req.deadline).await;

        self.store.set_active_run(session_id, false).await.ok();
        self.hooks.on_query_end(session_id).await;

        match outcome {
            Ok(()) => self.metrics.record_run_finished(),
            Err(()) => self.metrics.record_run_errored(),
        }
        Ok(())
    }

    /// The turn-by-turn loop body. Returns `Ok(())` after a terminal
    /// `run_finished`/`run_error` has already been published; `Err(())` is
    /// only used internally to short-circuit without re-publishing.
    async fn drive(
        &self,
        session: &mut Session,
        bus: &Arc<EventBus>,
        cancel: &mut CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<(), ()> {
        // `turn` indexes LLM round-trips. `self.config.max_turns` bounds how many
        // of those round-trips may be followed by a tool-call round; one further
        // round-trip (turn == max_turns) is always granted so the model gets a
        // chance to produce a final answer instead of another tool call before
        // the run is cut off. A tool call requested on that final round-trip
        // exhausts the budget and ends the run with `RunErrorKind::MaxTurns`.
        for turn in 0..=self.config.max_turns {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    self.run_error(bus, RunErrorKind::Timeout, "run deadline exceeded").await;
                    return Err(());
                }
            }
            if cancel.is_cancelled() {
                self.run_error(bus, RunErrorKind::Cancelled, "run cancelled").await;
                return Err(());
            }
            if turn == self.config.max_turns {
                tracing::debug!(session = %session.id, "agentic loop: final turn before max_turns cap");
            }

            self.maybe_compact(session, bus).await;

            let request = self.build_request(session);
            let stream = match self.complete_with_retry(request).await {
                Ok(stream) => stream,
                Err(message) => {
                    self.run_error(bus, RunErrorKind::LlmUnavailable, &message).await;
                    return Err(());
                }
            };

            let round = self.consume_stream(stream, bus).await;

            if round.tool_calls.is_empty() {
                session.push(Message::assistant(round.text.clone()));
                self.store.append_message(session.id, Message::assistant(round.text)).await.ok();
                bus.publish(EventPayload::RunFinished).await;
                return Ok(());
            }

            if turn == self.config.max_turns {
                // Tool budget exhausted: this round-trip was the one extra call
                // granted past max_turns, and it still asked for a tool.
                break;
            }

            if !round.text.is_empty() {
                session.push(Message::assistant(round.text.clone()));
                self.store.append_message(session.id, Message::assistant(round.text)).await.ok();
            }

            match self.run_tool_calls(session, bus, cancel, round.tool_calls).await {
                ToolRoundOutcome::Continue => {}
                ToolRoundOutcome::Cancelled => {
                    self.run_error(bus, RunErrorKind::Cancelled, "run cancelled during tool execution").await;
                    return Err(());
                }
            }

            let tokens_used = session.token_count as u64;
            let max_tokens = session.max_tokens as u64;
            bus.publish(EventPayload::Custom(CustomEvent::TokenUpdate {
                tokens_used,
                max_tokens,
                tokens_before: None,
                tokens_after: None,
            }))
            .await;
            if max_tokens > 0 && tokens_used >= max_tokens {
                self.run_error(bus, RunErrorKind::TokenLimit, "session token budget exhausted").await;
                return Err(());
            }
        }

        self.run_error(bus, RunErrorKind::MaxTurns, "maximum loop iterations reached").await;
        Err(())
    }

    fn build_request(&self, session: &Session) -> CompletionRequest {
        let system = session
            .messages
            .first()
            .filter(|m| m.role == Role::System)
            .cloned()
            .unwrap_or_else(|| Message::system(system_prompt(self.config.system_prompt.as_deref(), PromptContext::default())));

        let mut messages = vec![system];
        messages.extend(session.messages.iter().filter(|m| m.role != Role::System).cloned());

        let tools = self
            .tools
            .schemas()
            .into_iter()
            .map(|s| arbiter_model::ToolSchema { name: s.name, description: s.description, parameters: s.parameters })
            .collect();

        CompletionRequest { messages, tools, stream: true, ..Default::default() }
    }

    async fn complete_with_retry(
        &self,
        request: CompletionRequest,
    ) -> Result<arbiter_model::ResponseStream, String> {
        let mut last_error = String::new();
        for attempt in 0..MAX_LLM_RETRIES {
            match self.model.complete(request.clone()).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt + 1 < MAX_LLM_RETRIES {
                        let jitter = rand::thread_rng().gen_range(100..=500);
                        tokio::time::sleep(Duration::from_millis(jitter)).await;
                    }
                }
            }
        }
        Err(last_error)
    }

    async fn consume_stream(&self, mut stream: arbiter_model::ResponseStream, bus: &Arc<EventBus>) -> StreamRound {
        let message_id = MessageId::new();
        let mut text_open = false;
        let mut full_text = String::new();
        let mut started: HashSet<u32> = HashSet::new();
        let mut pending: BTreeMap<u32, PendingToolCall> = BTreeMap::new();

        while let Some(event) = stream.next().await {
            let event = match event {
                Ok(ev) => ev,
                Err(e) => {
                    tracing::warn!(error = %e, "agentic loop: recoverable stream error");
                    continue;
                }
            };
            match event {
                ResponseEvent::TextDelta(delta) => {
                    if !text_open {
                        bus.publish(EventPayload::TextMessageStart { message_id }).await;
                        text_open = true;
                    }
                    bus.publish(EventPayload::TextMessageContent { message_id, delta: delta.clone() }).await;
                    full_text.push_str(&delta);
                }
                ResponseEvent::ThinkingDelta(_) => {}
                ResponseEvent::ToolCall { index, id: _, name, arguments } => {
                    if text_open {
                        bus.publish(EventPayload::TextMessageEnd { message_id }).await;
                        text_open = false;
                    }
                    if started.insert(index) {
                        let our_id = ToolCallId::new();
                        bus.publish(EventPayload::ToolCallStart { tool_call_id: our_id, tool_name: name.clone() })
                            .await;
                        pending.insert(index, PendingToolCall { our_id, name, args: String::new() });
                    }
                    if let Some(state) = pending.get_mut(&index) {
                        if arguments.len() > state.args.len() {
                            let delta = arguments[state.args.len()..].to_string();
                            bus.publish(EventPayload::ToolCallArgs { tool_call_id: state.our_id, delta }).await;
                        }
                        state.args = arguments;
                    }
                }
                ResponseEvent::Usage { .. } => {}
                ResponseEvent::Error(message) => {
                    tracing::warn!(%message, "agentic loop: recoverable model warning");
                }
                ResponseEvent::Done | ResponseEvent::MaxTokens => break,
            }
        }

        if text_open {
            bus.publish(EventPayload::TextMessageEnd { message_id }).await;
        }

        StreamRound { text: full_text, tool_calls: pending.into_values().collect() }
    }

    async fn run_tool_calls(
        &self,
        session: &mut Session,
        bus: &Arc<EventBus>,
        cancel: &mut CancellationToken,
        tool_calls: Vec<PendingToolCall>,
    ) -> ToolRoundOutcome {
        for call in tool_calls {
            let tool_call_id = call.our_id;
            let args: serde_json::Value = serde_json::from_str(&call.args).unwrap_or(serde_json::json!({}));

            session.push(Message {
                role: Role::Assistant,
                content: MessageContent::ToolCall {
                    tool_call_id: tool_call_id.to_string(),
                    function: FunctionCall { name: call.name.clone(), arguments: call.args.clone() },
                },
            });
            self.store
                .append_message(
                    session.id,
                    Message {
                        role: Role::Assistant,
                        content: MessageContent::ToolCall {
                            tool_call_id: tool_call_id.to_string(),
                            function: FunctionCall { name: call.name.clone(), arguments: call.args.clone() },
                        },
                    },
                )
                .await
                .ok();
            session.push_tool_call(ToolCallRecord::new(tool_call_id, call.name.clone(), args.clone()));
            self.store
                .append_tool_call(session.id, ToolCallRecord::new(tool_call_id, call.name.clone(), args.clone()))
                .await
                .ok();

            if cancel.is_cancelled() {
                self.store
                    .update_tool_call_status(session.id, tool_call_id, ToolCallStatus::Cancelled, None)
                    .await
                    .ok();
                bus.publish(EventPayload::ToolCallEnd { tool_call_id, outcome: ToolOutcome::Cancelled }).await;
                return ToolRoundOutcome::Cancelled;
            }

            let hook_request = ToolCallRequest { id: tool_call_id.to_string(), name: call.name.clone(), args };
            let mut effective_args = hook_request.args.clone();
            match self.hooks.on_tool_call(session.id, &hook_request).await {
                HookOutcome::Reject(reason) => {
                    self.finish_rejected_tool_call(session, bus, tool_call_id, &reason).await;
                    continue;
                }
                HookOutcome::Modify(new_args) => effective_args = new_args,
                HookOutcome::Allow => {}
            }

            let registry_call = RegistryToolCall { id: tool_call_id.to_string(), name: call.name.clone(), args: effective_args };
            let output_category = self.tools.get(&call.name).map(|t| t.output_category()).unwrap_or_default();

            let started_at = Instant::now();
            let mut cancel_watch = cancel.clone();
            let exec_result = tokio::select! {
                biased;
                _ = cancel_watch.cancelled() => None,
                result = tokio::time::timeout(self.tool_timeout, self.tools.execute(&registry_call)) => Some(result),
            };

            let (content, is_error, outcome) = match exec_result {
                None => {
                    self.store
                        .update_tool_call_status(session.id, tool_call_id, ToolCallStatus::Cancelled, None)
                        .await
                        .ok();
                    bus.publish(EventPayload::ToolCallEnd { tool_call_id, outcome: ToolOutcome::Cancelled }).await;
                    return ToolRoundOutcome::Cancelled;
                }
                Some(Err(_elapsed)) => {
                    let message = format!("tool '{}' timed out after {:?}", call.name, self.tool_timeout);
                    (message.clone(), true, ToolOutcome::Error { kind: RunErrorKind::ToolTimeout, message })
                }
                Some(Ok(output)) => {
                    let category = output_category;
                    let capped = crate::compact::smart_truncate(&output.content, category, self.config.tool_result_token_cap);
                    if output.is_error {
                        (capped.clone(), true, ToolOutcome::Error { kind: RunErrorKind::ToolExecutionFailed, message: capped })
                    } else {
                        (capped.clone(), false, ToolOutcome::Success { result: serde_json::json!(capped) })
                    }
                }
            };

            self.metrics.record_tool_call(&call.name, !is_error, started_at.elapsed().as_millis() as u64);

            self.hooks
                .on_tool_result(session.id, &hook_request, &ToolCallResult { is_error, summary: content.clone() })
                .await;

            let status = if is_error { ToolCallStatus::Errored } else { ToolCallStatus::Completed };
            self.store
                .update_tool_call_status(session.id, tool_call_id, status, Some(serde_json::json!(content)))
                .await
                .ok();
            if let Some(record) = session.tool_call_mut(tool_call_id) {
                record.status = status;
                record.result = Some(serde_json::json!(content));
            }

            let result_message = Message::tool_result(tool_call_id.to_string(), content);
            session.push(result_message.clone());
            self.store.append_message(session.id, result_message).await.ok();

            bus.publish(EventPayload::ToolCallEnd { tool_call_id, outcome }).await;
        }
        ToolRoundOutcome::Continue
    }

    async fn finish_rejected_tool_call(
        &self,
        session: &mut Session,
        bus: &Arc<EventBus>,
        tool_call_id: ToolCallId,
        reason: &str,
    ) {
        self.store
            .update_tool_call_status(session.id, tool_call_id, ToolCallStatus::Rejected, Some(serde_json::json!(reason)))
            .await
            .ok();
        if let Some(record) = session.tool_call_mut(tool_call_id) {
            record.status = ToolCallStatus::Rejected;
        }
        let result_message = Message::tool_result(tool_call_id.to_string(), format!("[rejected: {reason}]"));
        session.push(result_message.clone());
        self.store.append_message(session.id, result_message).await.ok();
        bus.publish(EventPayload::ToolCallEnd { tool_call_id, outcome: ToolOutcome::Rejected { reason: reason.to_string() } })
            .await;
    }

    /// Proactive compaction: summarise everything but the most recent
    /// `compaction_keep_recent` messages once the session crosses the
    /// configured threshold (minus the reserved overhead fraction).
    async fn maybe_compact(&self, session: &mut Session, bus: &Arc<EventBus>) {
        let effective_threshold = (self.config.compaction_threshold - self.config.compaction_overhead_reserve).max(0.0);
        if !session.is_near_limit(effective_threshold) {
            return;
        }

        let before = session.token_count as u64;
        let system_msg = session.messages.first().cloned().filter(|m| m.role == Role::System);
        let keep_n = self.config.compaction_keep_recent;
        let non_system: Vec<Message> = session.messages.iter().filter(|m| m.role != Role::System).cloned().collect();
        if non_system.len() <= keep_n {
            return;
        }
        let split = non_system.len() - keep_n;
        let recent = non_system[split..].to_vec();
        let mut to_summarize = non_system[..split].to_vec();

        compact_session_with_strategy(&mut to_summarize, None, &self.config.compaction_strategy);
        let request = CompletionRequest { messages: to_summarize, tools: vec![], stream: true, ..Default::default() };

        let summary_text = match self.model.complete(request).await {
            Ok(mut stream) => {
                let mut text = String::new();
                while let Some(event) = stream.next().await {
                    if let Ok(ResponseEvent::TextDelta(delta)) = event {
                        text.push_str(&delta);
                    }
                }
                text
            }
            Err(_) => String::new(),
        };

        if summary_text.trim().is_empty() {
            let mut messages = session.messages.clone();
            emergency_compact(&mut messages, system_msg, keep_n);
            session.replace_messages(messages);
        } else {
            let mut rebuilt = Vec::new();
            if let Some(sys) = system_msg {
                rebuilt.push(sys);
            }
            rebuilt.push(Message::assistant(summary_text));
            rebuilt.extend(recent);
            session.replace_messages(rebuilt);
        }

        self.metrics.record_compaction();
        bus.publish(EventPayload::Custom(CustomEvent::TokenUpdate {
            tokens_used: session.token_count as u64,
            max_tokens: session.max_tokens as u64,
            tokens_before: Some(before),
            tokens_after: Some(session.token_count as u64),
        }))
        .await;
    }

    async fn run_error(&self, bus: &Arc<EventBus>, kind: RunErrorKind, message: &str) {
        bus.publish(EventPayload::RunError { kind, message: message.to_string(), details: None }).await;
    }
}

struct StreamRound {
    text: String,
    tool_calls: Vec<PendingToolCall>,
}

enum ToolRoundOutcome {
    Continue,
    Cancelled,
}

/// Drain every event currently queued on `bus` into a `Vec`, for assertions
/// in tests that don't want to hand-roll a `recv` loop.
#[cfg(test)]
async fn drain(sub: &mut arbiter_events::Subscriber) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = sub.try_recv() {
        events.push(event);
    }
    events
}
