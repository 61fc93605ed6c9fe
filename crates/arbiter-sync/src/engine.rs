// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use arbiter_events::{JsonPatchOp, PatchOp};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

use crate::conflict::{ConflictStrategy, LastWriteWins, Resolution};
use crate::document::StateDocument;
use crate::error::SyncError;
use crate::pointer;

/// A client's optimistic update to a single path, carrying the value it
/// last observed there so the server can detect a stale write.
#[derive(Debug, Clone)]
pub struct ClientDiff {
    pub path: String,
    pub old_value: Option<Value>,
    pub new_value: Value,
}

/// The `state_delta`-shaped result of a mutation: the ops applied, the
/// version they produced, and the version they were applied on top of.
#[derive(Debug, Clone)]
pub struct ServerDelta {
    pub ops: Vec<JsonPatchOp>,
    pub version: u64,
    pub base_version: u64,
}

/// A client diff that lost to the conflict strategy. The caller emits
/// `custom:prediction_conflicted` for each of these.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictReport {
    pub path: String,
}

#[derive(Debug, Default)]
pub struct ClientApplyOutcome {
    /// `None` if every diff in the batch conflicted.
    pub delta: Option<ServerDelta>,
    pub conflicts: Vec<ConflictReport>,
}

/// Owns the shared-state document and the strategy used to resolve
/// stale client writes.
pub struct SyncEngine {
    document: Mutex<StateDocument>,
    strategy: Box<dyn ConflictStrategy>,
}

impl SyncEngine {
    pub fn new(initial: Value, strategy: Box<dyn ConflictStrategy>) -> Self {
        Self { document: Mutex::new(StateDocument::new(initial)), strategy }
    }

    pub fn with_last_write_wins(initial: Value) -> Self {
        Self::new(initial, Box::new(LastWriteWins))
    }

    /// A `state_snapshot`-shaped pair, for a newly subscribing client.
    pub async fn snapshot(&self) -> (Value, u64) {
        self.document.lock().await.snapshot()
    }

    pub async fn version(&self) -> u64 {
        self.document.lock().await.version()
    }

    /// Replace the document with a previously captured snapshot. Used by
    /// checkpoint restoration; the caller is responsible for emitting a
    /// fresh `state_snapshot` afterward.
    pub async fn restore(&self, value: Value, version: u64) {
        self.document.lock().await.restore(value, version);
    }

    /// Apply a server-originated mutation (no conflict check: the server
    /// is always authoritative over its own writes).
    pub async fn apply_server_ops(&self, ops: Vec<JsonPatchOp>) -> Result<ServerDelta, SyncError> {
        let mut doc = self.document.lock().await;
        let (ops, version, base_version) = doc.apply_ops(ops)?;
        Ok(ServerDelta { ops, version, base_version })
    }

    /// Apply a batch of client-originated diffs. If `base_version` still
    /// matches the server's current version, every diff is applied
    /// unconditionally. Otherwise each diff is checked individually against
    /// the conflict strategy and only the survivors are applied, as one
    /// combined mutation.
    pub async fn apply_client_diffs(&self, base_version: u64, diffs: Vec<ClientDiff>) -> ClientApplyOutcome {
        let mut doc = self.document.lock().await;
        let server_version = doc.version();

        let (to_apply, conflicts) = if base_version == server_version {
            (diffs, Vec::new())
        } else {
            let mut to_apply = Vec::new();
            let mut conflicts = Vec::new();
            for diff in diffs {
                let current = pointer::get(doc.value(), &diff.path).cloned();
                let resolution =
                    self.strategy.resolve(&diff.path, current.as_ref(), diff.old_value.as_ref(), &diff.new_value);
                match resolution {
                    Resolution::Apply => to_apply.push(diff),
                    Resolution::Conflict => {
                        warn!(path = %diff.path, server_version, base_version, "client diff conflicted");
                        conflicts.push(ConflictReport { path: diff.path });
                    }
                }
            }
            (to_apply, conflicts)
        };

        if to_apply.is_empty() {
            return ClientApplyOutcome { delta: None, conflicts };
        }

        let ops: Vec<JsonPatchOp> = to_apply
            .iter()
            .map(|d| JsonPatchOp {
                path: d.path.clone(),
                op: if d.old_value.is_none() { PatchOp::Add } else { PatchOp::Replace },
                value: Some(d.new_value.clone()),
                from: None,
            })
            .collect();

        match doc.apply_ops(ops) {
            Ok((ops, version, base_version)) => {
                ClientApplyOutcome { delta: Some(ServerDelta { ops, version, base_version }), conflicts }
            }
            Err(_) => ClientApplyOutcome { delta: None, conflicts },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn diff(path: &str, old: Option<Value>, new: Value) -> ClientDiff {
        ClientDiff { path: path.into(), old_value: old, new_value: new }
    }

    #[tokio::test]
    async fn snapshot_reflects_initial_value_and_version_zero() {
        let engine = SyncEngine::with_last_write_wins(json!({"count": 0}));
        let (value, version) = engine.snapshot().await;
        assert_eq!(value, json!({"count": 0}));
        assert_eq!(version, 0);
    }

    #[tokio::test]
    async fn apply_server_ops_bumps_version_and_returns_delta() {
        let engine = SyncEngine::with_last_write_wins(json!({"count": 0}));
        let delta = engine
            .apply_server_ops(vec![JsonPatchOp {
                path: "/count".into(),
                op: PatchOp::Replace,
                value: Some(json!(1)),
                from: None,
            }])
            .await
            .unwrap();
        assert_eq!(delta.version, 1);
        assert_eq!(delta.base_version, 0);
        assert_eq!(engine.snapshot().await.0, json!({"count": 1}));
    }

    #[tokio::test]
    async fn client_diffs_at_current_version_apply_unconditionally() {
        let engine = SyncEngine::with_last_write_wins(json!({"count": 0}));
        let outcome = engine.apply_client_diffs(0, vec![diff("/count", Some(json!(0)), json!(5))]).await;
        assert!(outcome.conflicts.is_empty());
        assert_eq!(outcome.delta.unwrap().version, 1);
        assert_eq!(engine.snapshot().await.0, json!({"count": 5}));
    }

    #[tokio::test]
    async fn stale_diff_whose_path_still_matches_old_value_still_applies() {
        let engine = SyncEngine::with_last_write_wins(json!({"a": 1, "b": 1}));
        // Server moved on by mutating "b"; "a" is untouched so a stale diff
        // against "a" should still apply.
        engine
            .apply_server_ops(vec![JsonPatchOp {
                path: "/b".into(),
                op: PatchOp::Replace,
                value: Some(json!(2)),
                from: None,
            }])
            .await
            .unwrap();

        let outcome = engine.apply_client_diffs(0, vec![diff("/a", Some(json!(1)), json!(9))]).await;
        assert!(outcome.conflicts.is_empty());
        assert!(outcome.delta.is_some());
        assert_eq!(engine.snapshot().await.0, json!({"a": 9, "b": 2}));
    }

    #[tokio::test]
    async fn stale_diff_whose_path_moved_on_conflicts() {
        let engine = SyncEngine::with_last_write_wins(json!({"a": 1}));
        engine
            .apply_server_ops(vec![JsonPatchOp {
                path: "/a".into(),
                op: PatchOp::Replace,
                value: Some(json!(2)),
                from: None,
            }])
            .await
            .unwrap();

        let outcome = engine.apply_client_diffs(0, vec![diff("/a", Some(json!(1)), json!(9))]).await;
        assert_eq!(outcome.conflicts, vec![ConflictReport { path: "/a".into() }]);
        assert!(outcome.delta.is_none());
        assert_eq!(engine.snapshot().await.0, json!({"a": 2}));
    }

    #[tokio::test]
    async fn mixed_batch_applies_survivors_and_reports_conflicts() {
        let engine = SyncEngine::with_last_write_wins(json!({"a": 1, "b": 1}));
        engine
            .apply_server_ops(vec![JsonPatchOp {
                path: "/a".into(),
                op: PatchOp::Replace,
                value: Some(json!(2)),
                from: None,
            }])
            .await
            .unwrap();

        let outcome = engine
            .apply_client_diffs(
                0,
                vec![diff("/a", Some(json!(1)), json!(9)), diff("/b", Some(json!(1)), json!(8))],
            )
            .await;
        assert_eq!(outcome.conflicts, vec![ConflictReport { path: "/a".into() }]);
        let delta = outcome.delta.unwrap();
        assert_eq!(delta.ops.len(), 1);
        assert_eq!(engine.snapshot().await.0, json!({"a": 2, "b": 8}));
    }

    #[tokio::test]
    async fn restore_replaces_snapshot_and_version() {
        let engine = SyncEngine::with_last_write_wins(json!({"a": 1}));
        engine.apply_server_ops(vec![JsonPatchOp { path: "/a".into(), op: PatchOp::Replace, value: Some(json!(2)), from: None }])
            .await
            .unwrap();
        engine.restore(json!({"a": 0}), 9).await;
        let (value, version) = engine.snapshot().await;
        assert_eq!(value, json!({"a": 0}));
        assert_eq!(version, 9);
    }

    #[tokio::test]
    async fn add_diff_for_previously_absent_path_uses_add_op() {
        let engine = SyncEngine::with_last_write_wins(json!({}));
        let outcome = engine.apply_client_diffs(0, vec![diff("/new", None, json!("hi"))]).await;
        assert_eq!(outcome.delta.unwrap().ops[0].op, PatchOp::Add);
        assert_eq!(engine.snapshot().await.0, json!({"new": "hi"}));
    }
}
