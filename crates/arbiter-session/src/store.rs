// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use arbiter_events::{SessionId, ToolCallId};
use arbiter_model::Message;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::SessionError;
use crate::session::{Session, ToolCallRecord, ToolCallStatus};

/// Storage interface behind the Session Store. Every method is a single
/// atomic operation against the backing store; `SessionStore` composes them
/// but never assumes two calls observe a consistent snapshot in between.
#[async_trait]
pub trait SessionPersistence: Send + Sync {
    async fn insert(&self, session: Session) -> Result<(), SessionError>;
    async fn fetch(&self, id: SessionId) -> Result<Session, SessionError>;
    /// Atomically append a message and/or tool calls, returning the index of
    /// the last message in the session after the append (used as a history
    /// cursor). `message` is `None` when only tool calls are being recorded.
    async fn append(
        &self,
        id: SessionId,
        message: Option<Message>,
        tool_calls: Vec<ToolCallRecord>,
    ) -> Result<u64, SessionError>;
    async fn update_tool_call_status(
        &self,
        id: SessionId,
        tool_call_id: ToolCallId,
        status: ToolCallStatus,
        result: Option<Value>,
    ) -> Result<(), SessionError>;
    async fn set_active_run(&self, id: SessionId, active: bool) -> Result<(), SessionError>;
    async fn mark_ended(&self, id: SessionId) -> Result<(), SessionError>;
    async fn remove(&self, id: SessionId) -> Result<(), SessionError>;
    /// Truncate the message history to a prefix length and replace the
    /// tool-call graph wholesale. Used by checkpoint restoration.
    async fn restore(
        &self,
        id: SessionId,
        message_prefix_len: usize,
        tool_calls: Vec<ToolCallRecord>,
    ) -> Result<(), SessionError>;
}

/// In-process, in-memory implementation sufficient to drive the Session
/// Store and its tests. A durable backend is an external collaborator, not
/// provided here.
#[derive(Default)]
pub struct InMemoryPersistence {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self { sessions: RwLock::new(HashMap::new()) }
    }
}

#[async_trait]
impl SessionPersistence for InMemoryPersistence {
    async fn insert(&self, session: Session) -> Result<(), SessionError> {
        let mut guard = self.sessions.write().await;
        guard.insert(session.id, session);
        Ok(())
    }

    async fn fetch(&self, id: SessionId) -> Result<Session, SessionError> {
        let guard = self.sessions.read().await;
        guard.get(&id).cloned().ok_or(SessionError::NotFound(id))
    }

    async fn append(
        &self,
        id: SessionId,
        message: Option<Message>,
        tool_calls: Vec<ToolCallRecord>,
    ) -> Result<u64, SessionError> {
        let mut guard = self.sessions.write().await;
        let session = guard.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        if let Some(msg) = message {
            session.push(msg);
        }
        for call in tool_calls {
            session.push_tool_call(call);
        }
        Ok(session.messages.len().saturating_sub(1) as u64)
    }

    async fn update_tool_call_status(
        &self,
        id: SessionId,
        tool_call_id: ToolCallId,
        status: ToolCallStatus,
        result: Option<Value>,
    ) -> Result<(), SessionError> {
        let mut guard = self.sessions.write().await;
        let session = guard.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        let call = session
            .tool_call_mut(tool_call_id)
            .ok_or(SessionError::ToolCallNotFound(id, tool_call_id))?;
        call.status = status;
        if result.is_some() {
            call.result = result;
        }
        Ok(())
    }

    async fn set_active_run(&self, id: SessionId, active: bool) -> Result<(), SessionError> {
        let mut guard = self.sessions.write().await;
        let session = guard.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        session.has_active_run = active;
        Ok(())
    }

    async fn mark_ended(&self, id: SessionId) -> Result<(), SessionError> {
        let mut guard = self.sessions.write().await;
        let session = guard.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        session.ended = true;
        Ok(())
    }

    async fn remove(&self, id: SessionId) -> Result<(), SessionError> {
        let mut guard = self.sessions.write().await;
        guard.remove(&id).map(|_| ()).ok_or(SessionError::NotFound(id))
    }

    async fn restore(
        &self,
        id: SessionId,
        message_prefix_len: usize,
        tool_calls: Vec<ToolCallRecord>,
    ) -> Result<(), SessionError> {
        let mut guard = self.sessions.write().await;
        let session = guard.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        session.messages.truncate(message_prefix_len);
        session.tool_calls = tool_calls;
        session.recalculate_tokens();
        Ok(())
    }
}

/// The Session Store component (§4.4): session lifecycle, message/tool-call
/// append, history pagination, and forking, on top of a [`SessionPersistence`]
/// backend.
pub struct SessionStore {
    persistence: Arc<dyn SessionPersistence>,
}

impl SessionStore {
    pub fn new(persistence: Arc<dyn SessionPersistence>) -> Self {
        Self { persistence }
    }

    /// Construct a store backed by the in-memory persistence implementation.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryPersistence::new()))
    }

    pub async fn create(&self, max_tokens: usize) -> Result<SessionId, SessionError> {
        let session = Session::new(max_tokens);
        let id = session.id;
        self.persistence.insert(session).await?;
        Ok(id)
    }

    pub async fn get(&self, id: SessionId) -> Result<Session, SessionError> {
        self.persistence.fetch(id).await
    }

    pub async fn append_message(&self, id: SessionId, message: Message) -> Result<u64, SessionError> {
        self.persistence.append(id, Some(message), Vec::new()).await
    }

    pub async fn append_tool_call(&self, id: SessionId, call: ToolCallRecord) -> Result<(), SessionError> {
        self.persistence.append(id, None, vec![call]).await.map(|_| ())
    }

    pub async fn update_tool_call_status(
        &self,
        id: SessionId,
        tool_call_id: ToolCallId,
        status: ToolCallStatus,
        result: Option<Value>,
    ) -> Result<(), SessionError> {
        self.persistence.update_tool_call_status(id, tool_call_id, status, result).await
    }

    /// Ascending-order message page. `cursor` is the index of the last
    /// message already seen by the caller (`None` means start from the
    /// beginning); the returned cursor is `None` once the caller has caught
    /// up to the tail, even if more messages are appended afterward.
    pub async fn get_history(
        &self,
        id: SessionId,
        limit: usize,
        cursor: Option<u64>,
    ) -> Result<(Vec<Message>, Option<u64>), SessionError> {
        let session = self.persistence.fetch(id).await?;
        let start = cursor.map(|c| c as usize + 1).unwrap_or(0);
        if start >= session.messages.len() {
            return Ok((Vec::new(), None));
        }
        let end = (start + limit).min(session.messages.len());
        let page = session.messages[start..end].to_vec();
        let next_cursor = if end < session.messages.len() { Some((end - 1) as u64) } else { None };
        Ok((page, next_cursor))
    }

    /// Deep-copy the message list and tool-call graph into a new session.
    /// Event subscribers and any in-flight run are intentionally not copied.
    pub async fn fork(&self, id: SessionId, label: Option<String>) -> Result<SessionId, SessionError> {
        let source = self.persistence.fetch(id).await?;
        let mut forked = Session::new(source.max_tokens);
        forked.label = label;
        forked.forked_from = Some(source.id);
        forked.replace_messages(source.messages.clone());
        forked.tool_calls = source.tool_calls.clone();
        let new_id = forked.id;
        self.persistence.insert(forked).await?;
        Ok(new_id)
    }

    pub async fn end(&self, id: SessionId) -> Result<(), SessionError> {
        self.persistence.mark_ended(id).await
    }

    pub async fn set_active_run(&self, id: SessionId, active: bool) -> Result<(), SessionError> {
        self.persistence.set_active_run(id, active).await
    }

    /// Truncate the message history and replace the tool-call graph. Callers
    /// (the Recovery Manager) are responsible for refusing this while a run
    /// is in flight.
    pub async fn restore(
        &self,
        id: SessionId,
        message_prefix_len: usize,
        tool_calls: Vec<ToolCallRecord>,
    ) -> Result<(), SessionError> {
        self.persistence.restore(id, message_prefix_len, tool_calls).await
    }
}
