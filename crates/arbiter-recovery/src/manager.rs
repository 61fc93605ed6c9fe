// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;

use arbiter_events::{CheckpointId, SessionId};
use arbiter_session::SessionStore;
use arbiter_sync::SyncEngine;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;

use crate::checkpoint::Checkpoint;
use crate::error::RecoveryError;

/// The Recovery Manager (§4.8): captures and restores checkpoints of a
/// session's history length, tool-call graph, and shared state.
#[derive(Default)]
pub struct RecoveryManager {
    checkpoints: RwLock<HashMap<CheckpointId, Checkpoint>>,
}

impl RecoveryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the session's current message-prefix length, tool-call
    /// graph, and shared-state snapshot+version.
    pub async fn create_checkpoint(
        &self,
        store: &SessionStore,
        sync: &SyncEngine,
        session_id: SessionId,
    ) -> Result<Checkpoint, RecoveryError> {
        let session = store.get(session_id).await?;
        let (state_snapshot, state_version) = sync.snapshot().await;
        let checkpoint = Checkpoint {
            id: CheckpointId::new(),
            session_id,
            created_at: Utc::now(),
            message_prefix_len: session.messages.len(),
            tool_calls: session.tool_calls.clone(),
            state_snapshot,
            state_version,
        };
        self.checkpoints.write().await.insert(checkpoint.id, checkpoint.clone());
        info!(session_id = %session_id, checkpoint_id = %checkpoint.id, "checkpoint created");
        Ok(checkpoint)
    }

    /// Truncate the session to the checkpoint's message prefix, replace its
    /// tool-call graph, and replace the shared-state document. Refuses if
    /// the session has an in-flight run.
    pub async fn restore(
        &self,
        store: &SessionStore,
        sync: &SyncEngine,
        session_id: SessionId,
        checkpoint_id: CheckpointId,
    ) -> Result<Checkpoint, RecoveryError> {
        let session = store.get(session_id).await?;
        if session.has_active_run {
            return Err(RecoveryError::InvalidState(session_id));
        }

        let checkpoint = self
            .checkpoints
            .read()
            .await
            .get(&checkpoint_id)
            .filter(|c| c.session_id == session_id)
            .cloned()
            .ok_or(RecoveryError::NotFound(checkpoint_id))?;

        store.restore(session_id, checkpoint.message_prefix_len, checkpoint.tool_calls.clone()).await?;
        sync.restore(checkpoint.state_snapshot.clone(), checkpoint.state_version).await;

        info!(session_id = %session_id, checkpoint_id = %checkpoint.id, "session restored from checkpoint");
        Ok(checkpoint)
    }

    pub async fn get(&self, id: CheckpointId) -> Option<Checkpoint> {
        self.checkpoints.read().await.get(&id).cloned()
    }

    pub async fn list_for_session(&self, session_id: SessionId) -> Vec<Checkpoint> {
        self.checkpoints.read().await.values().filter(|c| c.session_id == session_id).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_model::Message;
    use serde_json::json;

    async fn fixture() -> (RecoveryManager, SessionStore, SyncEngine, SessionId) {
        let store = SessionStore::in_memory();
        let sync = SyncEngine::with_last_write_wins(json!({"counter": 0}));
        let id = store.create(10_000).await.unwrap();
        (RecoveryManager::new(), store, sync, id)
    }

    #[tokio::test]
    async fn checkpoint_captures_current_history_and_state() {
        let (mgr, store, sync, id) = fixture().await;
        store.append_message(id, Message::user("hi")).await.unwrap();
        sync.apply_server_ops(vec![arbiter_events::JsonPatchOp {
            path: "/counter".into(),
            op: arbiter_events::PatchOp::Replace,
            value: Some(json!(1)),
            from: None,
        }])
        .await
        .unwrap();

        let checkpoint = mgr.create_checkpoint(&store, &sync, id).await.unwrap();
        assert_eq!(checkpoint.message_prefix_len, 1);
        assert_eq!(checkpoint.state_snapshot, json!({"counter": 1}));
        assert_eq!(checkpoint.state_version, 1);
    }

    #[tokio::test]
    async fn restore_truncates_history_and_resets_shared_state() {
        let (mgr, store, sync, id) = fixture().await;
        store.append_message(id, Message::user("hi")).await.unwrap();
        let checkpoint = mgr.create_checkpoint(&store, &sync, id).await.unwrap();

        store.append_message(id, Message::user("more")).await.unwrap();
        sync.apply_server_ops(vec![arbiter_events::JsonPatchOp {
            path: "/counter".into(),
            op: arbiter_events::PatchOp::Replace,
            value: Some(json!(99)),
            from: None,
        }])
        .await
        .unwrap();

        mgr.restore(&store, &sync, id, checkpoint.id).await.unwrap();

        let session = store.get(id).await.unwrap();
        assert_eq!(session.messages.len(), 1);
        let (state, version) = sync.snapshot().await;
        assert_eq!(state, json!({"counter": 0}));
        assert_eq!(version, 0);
    }

    #[tokio::test]
    async fn restore_refuses_while_run_is_in_flight() {
        let (mgr, store, sync, id) = fixture().await;
        let checkpoint = mgr.create_checkpoint(&store, &sync, id).await.unwrap();
        store.set_active_run(id, true).await.unwrap();

        let err = mgr.restore(&store, &sync, id, checkpoint.id).await.unwrap_err();
        assert!(matches!(err, RecoveryError::InvalidState(_)));
    }

    #[tokio::test]
    async fn restore_unknown_checkpoint_errors() {
        let (mgr, store, _sync, id) = fixture().await;
        let sync2 = SyncEngine::with_last_write_wins(json!({}));
        let err = mgr.restore(&store, &sync2, id, CheckpointId::new()).await.unwrap_err();
        assert!(matches!(err, RecoveryError::NotFound(_)));
    }

    #[tokio::test]
    async fn restore_refuses_checkpoint_belonging_to_another_session() {
        let (mgr, store, sync, id) = fixture().await;
        let other_id = store.create(10_000).await.unwrap();
        let checkpoint = mgr.create_checkpoint(&store, &sync, id).await.unwrap();

        let err = mgr.restore(&store, &sync, other_id, checkpoint.id).await.unwrap_err();
        assert!(matches!(err, RecoveryError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_for_session_only_returns_that_sessions_checkpoints() {
        let (mgr, store, sync, id) = fixture().await;
        let other_id = store.create(10_000).await.unwrap();
        mgr.create_checkpoint(&store, &sync, id).await.unwrap();
        mgr.create_checkpoint(&store, &sync, other_id).await.unwrap();

        let list = mgr.list_for_session(id).await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].session_id, id);
    }
}
