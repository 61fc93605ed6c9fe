// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use arbiter_approval::{ApprovalManager, ApprovalOutcome};
use arbiter_events::{CustomEvent, EventBus, EventPayload, SessionId, ToolCallId};
use async_trait::async_trait;

use crate::hook::{Hook, HookOutcome, ToolCallRequest};

const DEFAULT_GATED_TOOLS: &[&str] = &["write", "edit", "multi_edit", "shell"];
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// For a configured set of tools, routes the call through the Approval
/// Manager and blocks until a human resolves it (or it expires).
pub struct ApprovalHook {
    manager: Arc<ApprovalManager>,
    gated_tools: HashSet<String>,
    timeout: Duration,
    bus: Option<Arc<EventBus>>,
}

impl ApprovalHook {
    pub fn new(manager: Arc<ApprovalManager>) -> Self {
        Self {
            manager,
            gated_tools: DEFAULT_GATED_TOOLS.iter().map(|s| s.to_string()).collect(),
            timeout: DEFAULT_TIMEOUT,
            bus: None,
        }
    }

    pub fn with_gated_tools(mut self, tools: impl IntoIterator<Item = String>) -> Self {
        self.gated_tools = tools.into_iter().collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Publish `custom:approval_required` on `bus` the moment a gated call
    /// registers a pending approval, so a subscribed UI can render it before
    /// resolution arrives.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }
}

#[async_trait]
impl Hook for ApprovalHook {
    fn name(&self) -> &str {
        "approval"
    }

    fn priority(&self) -> i32 {
        90
    }

    async fn on_tool_call(&self, _session_id: SessionId, call: &ToolCallRequest) -> HookOutcome {
        if !self.gated_tools.contains(&call.name) {
            return HookOutcome::Allow;
        }

        let tool_call_id = call.id.parse::<uuid::Uuid>().map(ToolCallId).unwrap_or_default();
        let rationale = format!("tool '{}' requires approval", call.name);
        let approval = self.manager.request(tool_call_id, "elevated", rationale, self.timeout).await;

        if let Some(bus) = &self.bus {
            bus.publish(EventPayload::Custom(CustomEvent::ApprovalRequired {
                approval_id: approval.id,
                tool_call_id: approval.tool_call_id,
                risk: approval.risk.clone(),
                rationale: approval.rationale.clone(),
                expires_at: approval.expires_at,
            }))
            .await;
        }

        match self.manager.await_resolution(approval.id).await {
            ApprovalOutcome::Approved { .. } => HookOutcome::Allow,
            ApprovalOutcome::Rejected { reason } => HookOutcome::Reject(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str) -> ToolCallRequest {
        ToolCallRequest { id: ToolCallId::new().to_string(), name: name.into(), args: json!({}) }
    }

    #[tokio::test]
    async fn ungated_tool_is_allowed_without_approval() {
        let hook = ApprovalHook::new(Arc::new(ApprovalManager::new()));
        let outcome = hook.on_tool_call(SessionId::new(), &call("read_file")).await;
        assert_eq!(outcome, HookOutcome::Allow);
    }

    #[tokio::test]
    async fn gated_tool_approved_before_expiry_allows() {
        let manager = Arc::new(ApprovalManager::new());
        let hook = Arc::new(ApprovalHook::new(manager.clone()).with_timeout(Duration::from_secs(5)));
        let tool_call_id = ToolCallId::new();
        let call = ToolCallRequest { id: tool_call_id.to_string(), name: "write".into(), args: json!({}) };

        let waiter = {
            let hook = hook.clone();
            tokio::spawn(async move { hook.on_tool_call(SessionId::new(), &call).await })
        };

        // `request` is idempotent per tool-call id, so calling it again here
        // (regardless of whether the hook's own call already ran) yields the
        // same pending approval the hook is awaiting.
        let approval = manager.request(tool_call_id, "elevated", "probe", Duration::from_secs(5)).await;
        manager.approve(approval.id, None).await.unwrap();

        assert_eq!(waiter.await.unwrap(), HookOutcome::Allow);
    }

    #[tokio::test]
    async fn gated_tool_with_no_resolution_times_out_and_rejects() {
        let manager = Arc::new(ApprovalManager::new());
        let hook = ApprovalHook::new(manager).with_timeout(Duration::from_millis(20));
        let outcome = hook.on_tool_call(SessionId::new(), &call("shell")).await;
        assert!(matches!(outcome, HookOutcome::Reject(_)));
    }

    #[tokio::test]
    async fn with_gated_tools_overrides_default_set() {
        let manager = Arc::new(ApprovalManager::new());
        let hook = ApprovalHook::new(manager).with_gated_tools(["grep".to_string()]);
        // "write" is gated by default but not in the overridden set.
        let outcome = hook.on_tool_call(SessionId::new(), &call("write")).await;
        assert_eq!(outcome, HookOutcome::Allow);
    }

    #[tokio::test]
    async fn with_event_bus_publishes_approval_required_at_request_time() {
        let manager = Arc::new(ApprovalManager::new());
        let bus = EventBus::new(arbiter_events::RunId::new(), None);
        let hook = Arc::new(
            ApprovalHook::new(manager.clone())
                .with_timeout(Duration::from_secs(5))
                .with_event_bus(bus.clone()),
        );
        let mut sub = bus.subscribe().await;
        let tool_call_id = ToolCallId::new();
        let call = ToolCallRequest { id: tool_call_id.to_string(), name: "write".into(), args: json!({}) };

        let waiter = {
            let hook = hook.clone();
            tokio::spawn(async move { hook.on_tool_call(SessionId::new(), &call).await })
        };

        let event = sub.recv().await.unwrap();
        match event.payload {
            EventPayload::Custom(CustomEvent::ApprovalRequired { tool_call_id: id, .. }) => {
                assert_eq!(id, tool_call_id);
            }
            other => panic!("expected approval_required, got {other:?}"),
        }

        let approval = manager.request(tool_call_id, "elevated", "probe", Duration::from_secs(5)).await;
        manager.approve(approval.id, None).await.unwrap();
        assert_eq!(waiter.await.unwrap(), HookOutcome::Allow);
    }
}
