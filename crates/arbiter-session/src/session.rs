// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use arbiter_events::{SessionId, ToolCallId};
use arbiter_model::Message;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Disposition of a single tool call within a session's tool-call graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallStatus {
    Pending,
    Running,
    Completed,
    Rejected,
    Cancelled,
    Errored,
}

/// One recorded tool invocation, tracked independently of the message list
/// so the Approval Manager and Agentic Loop can update its status without
/// rewriting conversation history.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub id: ToolCallId,
    pub name: String,
    pub args: Value,
    pub status: ToolCallStatus,
    pub result: Option<Value>,
}

impl ToolCallRecord {
    pub fn new(id: ToolCallId, name: impl Into<String>, args: Value) -> Self {
        Self { id, name: name.into(), args, status: ToolCallStatus::Pending, result: None }
    }
}

/// A single conversation, its message history, and its tool-call graph.
///
/// Message order is append-only; `fork` is the only operation that produces
/// a second `Session` sharing history with this one, and it copies rather
/// than shares.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    /// Human-readable label, set when this session was forked for what-if
    /// exploration. `None` for sessions created directly.
    pub label: Option<String>,
    pub forked_from: Option<SessionId>,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub tool_calls: Vec<ToolCallRecord>,
    /// Approximate total token count for the current message list.
    pub token_count: usize,
    /// Maximum context tokens, set from model config / provider limits.
    pub max_tokens: usize,
    pub ended: bool,
    /// Set while a run task holds this session; `restore` and session `end`
    /// both refuse to act while this is true.
    pub has_active_run: bool,
}

impl Session {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            id: SessionId::new(),
            label: None,
            forked_from: None,
            created_at: Utc::now(),
            messages: Vec::new(),
            tool_calls: Vec::new(),
            token_count: 0,
            max_tokens,
            ended: false,
            has_active_run: false,
        }
    }

    pub fn push(&mut self, msg: Message) {
        self.token_count += msg.approx_tokens();
        self.messages.push(msg);
    }

    pub fn push_many(&mut self, msgs: impl IntoIterator<Item = Message>) {
        for m in msgs {
            self.push(m);
        }
    }

    /// Fraction of context window consumed (0.0-1.0).
    pub fn context_fraction(&self) -> f32 {
        if self.max_tokens == 0 {
            return 0.0;
        }
        (self.token_count as f32) / (self.max_tokens as f32)
    }

    pub fn is_near_limit(&self, threshold: f32) -> bool {
        self.context_fraction() >= threshold
    }

    /// Recalculate token count from scratch (call after compaction).
    pub fn recalculate_tokens(&mut self) {
        self.token_count = self.messages.iter().map(|m| m.approx_tokens()).sum();
    }

    /// Replace the message list and recalculate token count. Used by
    /// compaction and by checkpoint restore.
    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.recalculate_tokens();
    }

    pub fn push_tool_call(&mut self, call: ToolCallRecord) {
        self.tool_calls.push(call);
    }

    pub fn tool_call_mut(&mut self, id: ToolCallId) -> Option<&mut ToolCallRecord> {
        self.tool_calls.iter_mut().find(|c| c.id == id)
    }
}
