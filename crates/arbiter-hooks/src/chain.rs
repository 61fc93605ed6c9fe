// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use arbiter_events::{RunErrorKind, SessionId};

use crate::hook::{Hook, HookOutcome, ToolCallRequest, ToolCallResult};

/// Ordered, priority-driven interceptor chain over tool calls, queries, and
/// session lifecycle (§4.2).
///
/// On `on_tool_call`, the first `Reject` short-circuits the remaining hooks;
/// `Modify` outcomes accumulate so each subsequent hook sees the
/// already-modified arguments. Every other extension point only cares about
/// the first `Reject`.
pub struct HookChain {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Register a hook and re-sort the chain by descending priority.
    pub fn register(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.push(hook);
        self.hooks.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    pub fn hooks(&self) -> &[Arc<dyn Hook>] {
        &self.hooks
    }

    pub async fn on_session_start(&self, session_id: SessionId) -> HookOutcome {
        for hook in &self.hooks {
            let outcome = hook.on_session_start(session_id).await;
            if outcome.is_reject() {
                return outcome;
            }
        }
        HookOutcome::Allow
    }

    pub async fn on_session_end(&self, session_id: SessionId) -> HookOutcome {
        for hook in &self.hooks {
            let outcome = hook.on_session_end(session_id).await;
            if outcome.is_reject() {
                return outcome;
            }
        }
        HookOutcome::Allow
    }

    pub async fn on_query_start(&self, session_id: SessionId) -> HookOutcome {
        for hook in &self.hooks {
            let outcome = hook.on_query_start(session_id).await;
            if outcome.is_reject() {
                return outcome;
            }
        }
        HookOutcome::Allow
    }

    pub async fn on_query_end(&self, session_id: SessionId) -> HookOutcome {
        for hook in &self.hooks {
            let outcome = hook.on_query_end(session_id).await;
            if outcome.is_reject() {
                return outcome;
            }
        }
        HookOutcome::Allow
    }

    /// Run every hook's `on_tool_call`, short-circuiting on the first reject
    /// and threading modified arguments through to later hooks.
    pub async fn on_tool_call(&self, session_id: SessionId, call: &ToolCallRequest) -> HookOutcome {
        let mut current = call.clone();
        let mut modified = false;
        for hook in &self.hooks {
            match hook.on_tool_call(session_id, &current).await {
                HookOutcome::Allow => {}
                HookOutcome::Reject(reason) => return HookOutcome::Reject(reason),
                HookOutcome::Modify(new_args) => {
                    current.args = new_args;
                    modified = true;
                }
            }
        }
        if modified {
            HookOutcome::Modify(current.args)
        } else {
            HookOutcome::Allow
        }
    }

    pub async fn on_tool_result(
        &self,
        session_id: SessionId,
        call: &ToolCallRequest,
        result: &ToolCallResult,
    ) -> HookOutcome {
        for hook in &self.hooks {
            let outcome = hook.on_tool_result(session_id, call, result).await;
            if outcome.is_reject() {
                return outcome;
            }
        }
        HookOutcome::Allow
    }

    pub async fn on_error(&self, session_id: SessionId, kind: RunErrorKind, message: &str) -> HookOutcome {
        for hook in &self.hooks {
            let outcome = hook.on_error(session_id, kind, message).await;
            if outcome.is_reject() {
                return outcome;
            }
        }
        HookOutcome::Allow
    }
}

impl Default for HookChain {
    fn default() -> Self {
        Self::new()
    }
}
