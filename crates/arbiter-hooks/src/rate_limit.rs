// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use arbiter_events::SessionId;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::hook::{Hook, HookOutcome, ToolCallRequest, ToolCallResult};

const WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window calls/minute counter plus a concurrent-call gauge.
/// Rejects a call when either bound is exceeded.
pub struct RateLimitHook {
    max_per_minute: usize,
    max_concurrent: i64,
    timestamps: Mutex<VecDeque<Instant>>,
    in_flight: AtomicI64,
}

impl RateLimitHook {
    pub fn new(max_per_minute: usize, max_concurrent: i64) -> Self {
        Self {
            max_per_minute,
            max_concurrent,
            timestamps: Mutex::new(VecDeque::new()),
            in_flight: AtomicI64::new(0),
        }
    }

    async fn prune_and_count(&self) -> usize {
        let now = Instant::now();
        let mut ts = self.timestamps.lock().await;
        while let Some(front) = ts.front() {
            if now.duration_since(*front) > WINDOW {
                ts.pop_front();
            } else {
                break;
            }
        }
        ts.len()
    }
}

#[async_trait]
impl Hook for RateLimitHook {
    fn name(&self) -> &str {
        "rate_limit"
    }

    fn priority(&self) -> i32 {
        80
    }

    async fn on_tool_call(&self, _session_id: SessionId, _call: &ToolCallRequest) -> HookOutcome {
        if self.in_flight.load(Ordering::SeqCst) >= self.max_concurrent {
            return HookOutcome::Reject("concurrent tool-call limit exceeded".into());
        }
        let count = self.prune_and_count().await;
        if count >= self.max_per_minute {
            return HookOutcome::Reject("tool-call rate limit exceeded".into());
        }

        self.timestamps.lock().await.push_back(Instant::now());
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        HookOutcome::Allow
    }

    async fn on_tool_result(
        &self,
        _session_id: SessionId,
        _call: &ToolCallRequest,
        _result: &ToolCallResult,
    ) -> HookOutcome {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        HookOutcome::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call() -> ToolCallRequest {
        ToolCallRequest { id: "1".into(), name: "shell".into(), args: json!({}) }
    }

    fn result() -> ToolCallResult {
        ToolCallResult { is_error: false, summary: "ok".into() }
    }

    #[tokio::test]
    async fn allows_calls_under_the_limit() {
        let hook = RateLimitHook::new(5, 5);
        for _ in 0..3 {
            assert_eq!(hook.on_tool_call(SessionId::new(), &call()).await, HookOutcome::Allow);
            hook.on_tool_result(SessionId::new(), &call(), &result()).await;
        }
    }

    #[tokio::test]
    async fn rejects_once_per_minute_limit_exceeded() {
        let hook = RateLimitHook::new(2, 10);
        assert_eq!(hook.on_tool_call(SessionId::new(), &call()).await, HookOutcome::Allow);
        assert_eq!(hook.on_tool_call(SessionId::new(), &call()).await, HookOutcome::Allow);
        let outcome = hook.on_tool_call(SessionId::new(), &call()).await;
        assert!(matches!(outcome, HookOutcome::Reject(_)));
    }

    #[tokio::test]
    async fn rejects_when_concurrent_gauge_exceeded() {
        let hook = RateLimitHook::new(100, 1);
        assert_eq!(hook.on_tool_call(SessionId::new(), &call()).await, HookOutcome::Allow);
        let outcome = hook.on_tool_call(SessionId::new(), &call()).await;
        assert!(matches!(outcome, HookOutcome::Reject(_)));
    }

    #[tokio::test]
    async fn on_tool_result_frees_a_concurrency_slot() {
        let hook = RateLimitHook::new(100, 1);
        assert_eq!(hook.on_tool_call(SessionId::new(), &call()).await, HookOutcome::Allow);
        hook.on_tool_result(SessionId::new(), &call(), &result()).await;
        assert_eq!(hook.on_tool_call(SessionId::new(), &call()).await, HookOutcome::Allow);
    }
}
