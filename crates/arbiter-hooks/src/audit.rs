// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use arbiter_events::SessionId;
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::hook::{Hook, HookOutcome, ToolCallRequest, ToolCallResult};

/// Argument keys whose values are redacted before logging.
const SENSITIVE_KEYS: &[&str] = &["password", "token", "key", "secret", "credential"];

const REDACTED: &str = "[redacted]";

/// Never rejects. Emits a structured record of every tool call and result
/// with sensitive-looking argument values redacted.
pub struct AuditHook;

#[async_trait]
impl Hook for AuditHook {
    fn name(&self) -> &str {
        "audit"
    }

    fn priority(&self) -> i32 {
        100
    }

    async fn on_tool_call(&self, session_id: SessionId, call: &ToolCallRequest) -> HookOutcome {
        let redacted = redact(&call.args);
        info!(session_id = %session_id, tool_call_id = %call.id, tool = %call.name, args = %redacted, "tool call");
        HookOutcome::Allow
    }

    async fn on_tool_result(
        &self,
        session_id: SessionId,
        call: &ToolCallRequest,
        result: &ToolCallResult,
    ) -> HookOutcome {
        info!(
            session_id = %session_id,
            tool_call_id = %call.id,
            tool = %call.name,
            is_error = result.is_error,
            "tool result"
        );
        HookOutcome::Allow
    }
}

/// Redact values at keys whose name contains any [`SENSITIVE_KEYS`] substring
/// (case-insensitive), recursively over nested objects and arrays.
fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                let lower = k.to_lowercase();
                if SENSITIVE_KEYS.iter().any(|s| lower.contains(s)) {
                    out.insert(k.clone(), Value::String(REDACTED.into()));
                } else {
                    out.insert(k.clone(), redact(v));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}
