use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RunErrorKind;
use crate::ids::{ApprovalId, CheckpointId, MessageId, RunId, SessionId, ToolCallId};

/// One JSON-Patch-style shared-state operation (§4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatchOp {
    #[serde(rename = "add")]
    Add,
    #[serde(rename = "replace")]
    Replace,
    #[serde(rename = "remove")]
    Remove,
    #[serde(rename = "move")]
    Move,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonPatchOp {
    pub path: String,
    pub op: PatchOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Only meaningful for `op == Move`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

/// The outcome of a tool call, carried on `tool_call_end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { result: Value },
    Error { kind: RunErrorKind, message: String },
    Rejected { reason: String },
    Cancelled,
}

/// Inner payload of a `custom` event — the extensible half of the vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum CustomEvent {
    ApprovalRequired {
        approval_id: ApprovalId,
        tool_call_id: ToolCallId,
        risk: String,
        rationale: String,
        expires_at: DateTime<Utc>,
    },
    ModeDetected {
        mode: String,
        confidence: f32,
    },
    TokenUpdate {
        tokens_used: u64,
        max_tokens: u64,
        tokens_before: Option<u64>,
        tokens_after: Option<u64>,
    },
    CheckpointCreated {
        checkpoint_id: CheckpointId,
        restored: bool,
    },
    WorkflowState {
        step: u32,
        total_steps: u32,
        label: String,
    },
    Heartbeat {
        count: u64,
        elapsed_seconds: u64,
        status: String,
    },
    StepProgress {
        step: u32,
        total_steps: u32,
    },
    UiComponent {
        component: String,
        props: Value,
    },
    PredictionConfirmed {
        path: String,
    },
    PredictionRolledBack {
        path: String,
    },
    PredictionConflicted {
        path: String,
    },
}

/// The full tagged event vocabulary (§4.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    RunStarted,
    RunFinished,
    RunError {
        kind: RunErrorKind,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    TextMessageStart {
        message_id: MessageId,
    },
    TextMessageContent {
        message_id: MessageId,
        delta: String,
    },
    TextMessageEnd {
        message_id: MessageId,
    },
    ToolCallStart {
        tool_call_id: ToolCallId,
        tool_name: String,
    },
    ToolCallArgs {
        tool_call_id: ToolCallId,
        delta: String,
    },
    ToolCallEnd {
        tool_call_id: ToolCallId,
        outcome: ToolOutcome,
    },
    StateSnapshot {
        snapshot: Value,
        version: u64,
    },
    StateDelta {
        ops: Vec<JsonPatchOp>,
        version: u64,
        base_version: u64,
    },
    Custom(CustomEvent),
}

/// An event plus its envelope: run id, optional session id, per-run
/// sequence number, and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub run_id: RunId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn is_terminal(&self) -> bool {
        matches!(self.payload, EventPayload::RunFinished | EventPayload::RunError { .. })
    }
}
