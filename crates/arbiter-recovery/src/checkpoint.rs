// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use arbiter_events::{CheckpointId, SessionId};
use arbiter_session::ToolCallRecord;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// A point-in-time capture of one session's history length, tool-call
/// graph, and shared-state document, sufficient to roll the session back.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub message_prefix_len: usize,
    pub tool_calls: Vec<ToolCallRecord>,
    pub state_snapshot: Value,
    pub state_version: u64,
}
