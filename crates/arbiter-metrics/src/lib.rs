// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The Metrics Collector (§2): atomics-and-`DashMap` counters, histograms,
//! and gauges around runs, tool calls, approvals, and MCP connections. No
//! sink is wired up here — that belongs to whatever scrapes [`RunMetrics::
//! snapshot`].

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

/// Process-wide counters, gauges, and per-tool latency histograms for one
/// orchestrator instance.
pub struct RunMetrics {
    runs_started: AtomicU64,
    runs_finished: AtomicU64,
    runs_errored: AtomicU64,
    active_runs: AtomicI64,

    tool_calls_total: AtomicU64,
    tool_calls_succeeded: AtomicU64,
    tool_calls_failed: AtomicU64,

    approvals_requested: AtomicU64,
    approvals_granted: AtomicU64,
    approvals_denied: AtomicU64,
    approvals_timed_out: AtomicU64,

    mcp_connection_errors: AtomicU64,
    active_mcp_connections: AtomicI64,

    compactions_performed: AtomicU64,

    active_sessions: AtomicI64,

    tool_latencies: DashMap<String, LatencyStats>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            runs_finished: AtomicU64::new(0),
            runs_errored: AtomicU64::new(0),
            active_runs: AtomicI64::new(0),
            tool_calls_total: AtomicU64::new(0),
            tool_calls_succeeded: AtomicU64::new(0),
            tool_calls_failed: AtomicU64::new(0),
            approvals_requested: AtomicU64::new(0),
            approvals_granted: AtomicU64::new(0),
            approvals_denied: AtomicU64::new(0),
            approvals_timed_out: AtomicU64::new(0),
            mcp_connection_errors: AtomicU64::new(0),
            active_mcp_connections: AtomicI64::new(0),
            compactions_performed: AtomicU64::new(0),
            active_sessions: AtomicI64::new(0),
            tool_latencies: DashMap::new(),
        }
    }

    pub fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
        self.active_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_finished(&self) {
        self.runs_finished.fetch_add(1, Ordering::Relaxed);
        self.active_runs.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_run_errored(&self) {
        self.runs_errored.fetch_add(1, Ordering::Relaxed);
        self.active_runs.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_tool_call(&self, tool: &str, success: bool, duration_ms: u64) {
        self.tool_calls_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.tool_calls_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.tool_calls_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.tool_latencies.entry(tool.to_string()).or_insert_with(LatencyStats::new).record(duration_ms);
    }

    pub fn record_approval_requested(&self) {
        self.approvals_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_approval_granted(&self) {
        self.approvals_granted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_approval_denied(&self) {
        self.approvals_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_approval_timed_out(&self) {
        self.approvals_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mcp_connection_opened(&self) {
        self.active_mcp_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mcp_connection_closed(&self) {
        self.active_mcp_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_mcp_connection_error(&self) {
        self.mcp_connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compaction(&self) {
        self.compactions_performed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_started(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_ended(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn tool_latency(&self, tool: &str) -> Option<LatencySnapshot> {
        self.tool_latencies.get(tool).map(|s| s.snapshot())
    }

    pub fn all_tool_latencies(&self) -> Vec<(String, LatencySnapshot)> {
        self.tool_latencies.iter().map(|e| (e.key().clone(), e.value().snapshot())).collect()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_finished: self.runs_finished.load(Ordering::Relaxed),
            runs_errored: self.runs_errored.load(Ordering::Relaxed),
            active_runs: self.active_runs.load(Ordering::Relaxed),
            tool_calls_total: self.tool_calls_total.load(Ordering::Relaxed),
            tool_calls_succeeded: self.tool_calls_succeeded.load(Ordering::Relaxed),
            tool_calls_failed: self.tool_calls_failed.load(Ordering::Relaxed),
            approvals_requested: self.approvals_requested.load(Ordering::Relaxed),
            approvals_granted: self.approvals_granted.load(Ordering::Relaxed),
            approvals_denied: self.approvals_denied.load(Ordering::Relaxed),
            approvals_timed_out: self.approvals_timed_out.load(Ordering::Relaxed),
            mcp_connection_errors: self.mcp_connection_errors.load(Ordering::Relaxed),
            active_mcp_connections: self.active_mcp_connections.load(Ordering::Relaxed),
            compactions_performed: self.compactions_performed.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
        }
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Running count/min/max/total for one tool's call latency, in
/// milliseconds.
struct LatencyStats {
    count: AtomicU64,
    total_ms: AtomicU64,
    min_ms: AtomicU64,
    max_ms: AtomicU64,
}

impl LatencyStats {
    fn new() -> Self {
        Self { count: AtomicU64::new(0), total_ms: AtomicU64::new(0), min_ms: AtomicU64::new(u64::MAX), max_ms: AtomicU64::new(0) }
    }

    fn record(&self, ms: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ms.fetch_add(ms, Ordering::Relaxed);

        let mut current_min = self.min_ms.load(Ordering::Relaxed);
        while ms < current_min {
            match self.min_ms.compare_exchange_weak(current_min, ms, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(actual) => current_min = actual,
            }
        }

        let mut current_max = self.max_ms.load(Ordering::Relaxed);
        while ms > current_max {
            match self.max_ms.compare_exchange_weak(current_max, ms, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(actual) => current_max = actual,
            }
        }
    }

    fn snapshot(&self) -> LatencySnapshot {
        let count = self.count.load(Ordering::Relaxed);
        let total = self.total_ms.load(Ordering::Relaxed);
        let min = self.min_ms.load(Ordering::Relaxed);
        let max = self.max_ms.load(Ordering::Relaxed);
        LatencySnapshot {
            count,
            avg_ms: if count > 0 { total / count } else { 0 },
            min_ms: if min == u64::MAX { 0 } else { min },
            max_ms: max,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencySnapshot {
    pub count: u64,
    pub avg_ms: u64,
    pub min_ms: u64,
    pub max_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub runs_started: u64,
    pub runs_finished: u64,
    pub runs_errored: u64,
    pub active_runs: i64,
    pub tool_calls_total: u64,
    pub tool_calls_succeeded: u64,
    pub tool_calls_failed: u64,
    pub approvals_requested: u64,
    pub approvals_granted: u64,
    pub approvals_denied: u64,
    pub approvals_timed_out: u64,
    pub mcp_connection_errors: u64,
    pub active_mcp_connections: i64,
    pub compactions_performed: u64,
    pub active_sessions: i64,
}

impl MetricsSnapshot {
    pub fn tool_success_rate(&self) -> f64 {
        let completed = self.tool_calls_succeeded + self.tool_calls_failed;
        if completed == 0 {
            100.0
        } else {
            (self.tool_calls_succeeded as f64 / completed as f64) * 100.0
        }
    }

    pub fn approval_grant_rate(&self) -> f64 {
        let total = self.approvals_granted + self.approvals_denied;
        if total == 0 {
            100.0
        } else {
            (self.approvals_granted as f64 / total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_lifecycle_updates_counters_and_gauge() {
        let m = RunMetrics::new();
        m.record_run_started();
        m.record_run_started();
        m.record_run_finished();
        let snap = m.snapshot();
        assert_eq!(snap.runs_started, 2);
        assert_eq!(snap.runs_finished, 1);
        assert_eq!(snap.active_runs, 1);
    }

    #[test]
    fn record_run_errored_decrements_active_and_counts_error() {
        let m = RunMetrics::new();
        m.record_run_started();
        m.record_run_errored();
        let snap = m.snapshot();
        assert_eq!(snap.runs_errored, 1);
        assert_eq!(snap.active_runs, 0);
    }

    #[test]
    fn tool_call_latency_tracks_min_max_avg() {
        let m = RunMetrics::new();
        m.record_tool_call("grep", true, 10);
        m.record_tool_call("grep", true, 30);
        m.record_tool_call("grep", false, 20);
        let lat = m.tool_latency("grep").unwrap();
        assert_eq!(lat.count, 3);
        assert_eq!(lat.min_ms, 10);
        assert_eq!(lat.max_ms, 30);
        assert_eq!(lat.avg_ms, 20);

        let snap = m.snapshot();
        assert_eq!(snap.tool_calls_total, 3);
        assert_eq!(snap.tool_calls_succeeded, 2);
        assert_eq!(snap.tool_calls_failed, 1);
    }

    #[test]
    fn unknown_tool_latency_is_none() {
        let m = RunMetrics::new();
        assert!(m.tool_latency("nope").is_none());
    }

    #[test]
    fn approval_rate_is_100_when_no_approvals_seen() {
        let m = RunMetrics::new();
        assert_eq!(m.snapshot().approval_grant_rate(), 100.0);
    }

    #[test]
    fn approval_rate_reflects_grants_and_denials() {
        let m = RunMetrics::new();
        m.record_approval_requested();
        m.record_approval_granted();
        m.record_approval_requested();
        m.record_approval_denied();
        assert_eq!(m.snapshot().approval_grant_rate(), 50.0);
    }

    #[test]
    fn mcp_connection_gauge_tracks_open_and_close() {
        let m = RunMetrics::new();
        m.record_mcp_connection_opened();
        m.record_mcp_connection_opened();
        m.record_mcp_connection_closed();
        assert_eq!(m.snapshot().active_mcp_connections, 1);
    }

    #[test]
    fn all_tool_latencies_includes_every_recorded_tool() {
        let m = RunMetrics::new();
        m.record_tool_call("a", true, 5);
        m.record_tool_call("b", true, 5);
        let mut names: Vec<String> = m.all_tool_latencies().into_iter().map(|(k, _)| k).collect();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
