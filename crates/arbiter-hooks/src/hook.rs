// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use arbiter_events::{RunErrorKind, SessionId};
use async_trait::async_trait;
use serde_json::Value;

/// A tool invocation as seen by the hook chain, independent of the Tool
/// Registry's own `ToolCall` type so this crate does not need to depend on
/// it — the Agentic Loop converts between the two at the call site.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// The result of a tool call, as reported to `on_tool_result`.
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub is_error: bool,
    pub summary: String,
}

/// The outcome a hook returns at each extension point.
#[derive(Debug, Clone, PartialEq)]
pub enum HookOutcome {
    Allow,
    Reject(String),
    /// Only meaningful for `on_tool_call`; other extension points treat it
    /// the same as `Allow`.
    Modify(Value),
}

impl HookOutcome {
    pub fn is_reject(&self) -> bool {
        matches!(self, HookOutcome::Reject(_))
    }
}

/// A single interceptor in the Hook Chain. Every method defaults to
/// `Allow` so a hook need only override the extension points it cares
/// about.
#[async_trait]
pub trait Hook: Send + Sync {
    fn name(&self) -> &str;
    /// Hooks run in descending priority order within the chain.
    fn priority(&self) -> i32;

    async fn on_session_start(&self, _session_id: SessionId) -> HookOutcome {
        HookOutcome::Allow
    }
    async fn on_session_end(&self, _session_id: SessionId) -> HookOutcome {
        HookOutcome::Allow
    }
    async fn on_query_start(&self, _session_id: SessionId) -> HookOutcome {
        HookOutcome::Allow
    }
    async fn on_query_end(&self, _session_id: SessionId) -> HookOutcome {
        HookOutcome::Allow
    }
    async fn on_tool_call(&self, _session_id: SessionId, _call: &ToolCallRequest) -> HookOutcome {
        HookOutcome::Allow
    }
    async fn on_tool_result(
        &self,
        _session_id: SessionId,
        _call: &ToolCallRequest,
        _result: &ToolCallResult,
    ) -> HookOutcome {
        HookOutcome::Allow
    }
    async fn on_error(&self, _session_id: SessionId, _kind: RunErrorKind, _message: &str) -> HookOutcome {
        HookOutcome::Allow
    }
}
