// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::time::Duration;

use arbiter_events::{ApprovalId, ToolCallId};
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tracing::warn;

use crate::error::ApprovalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    TimedOut,
}

/// Outcome delivered to every awaiter of a resolved (or expired) approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved { comment: Option<String> },
    Rejected { reason: String },
}

/// A pending or resolved human-in-the-loop approval request.
#[derive(Debug, Clone)]
pub struct Approval {
    pub id: ApprovalId,
    pub tool_call_id: ToolCallId,
    pub risk: String,
    pub rationale: String,
    pub requested_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ApprovalStatus,
}

struct PendingEntry {
    approval: Approval,
    tx: watch::Sender<Option<ApprovalOutcome>>,
}

#[derive(Default)]
struct Inner {
    by_id: HashMap<ApprovalId, PendingEntry>,
    by_tool_call: HashMap<ToolCallId, ApprovalId>,
}

/// The Approval Manager (§4.2): a per-process table of pending human
/// approvals, keyed so at most one is ever outstanding per tool-call id.
///
/// Resolution uses a `watch` channel rather than a `oneshot` so that a
/// duplicate `request` for the same tool-call id can return the same
/// [`Approval`] and have its own awaiter still observe the eventual
/// resolution — a `oneshot::Receiver` only ever has one consumer.
pub struct ApprovalManager {
    inner: Mutex<Inner>,
}

impl ApprovalManager {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }

    /// Register (or return the existing) pending approval for `tool_call_id`.
    pub async fn request(
        &self,
        tool_call_id: ToolCallId,
        risk: impl Into<String>,
        rationale: impl Into<String>,
        timeout: Duration,
    ) -> Approval {
        let mut inner = self.inner.lock().await;
        if let Some(id) = inner.by_tool_call.get(&tool_call_id) {
            return inner.by_id[id].approval.clone();
        }

        let now = Utc::now();
        let expires_at = now
            + chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::seconds(60));
        let approval = Approval {
            id: ApprovalId::new(),
            tool_call_id,
            risk: risk.into(),
            rationale: rationale.into(),
            requested_at: now,
            expires_at,
            status: ApprovalStatus::Pending,
        };
        let (tx, _rx) = watch::channel(None);
        inner.by_tool_call.insert(tool_call_id, approval.id);
        inner.by_id.insert(approval.id, PendingEntry { approval: approval.clone(), tx });
        approval
    }

    /// Await resolution of `approval_id`, racing the eventual `approve`/
    /// `reject` call against the approval's expiry. Never returns before one
    /// of the two fires.
    pub async fn await_resolution(&self, approval_id: ApprovalId) -> ApprovalOutcome {
        let (mut rx, expires_at) = {
            let inner = self.inner.lock().await;
            match inner.by_id.get(&approval_id) {
                Some(entry) => (entry.tx.subscribe(), entry.approval.expires_at),
                None => return ApprovalOutcome::Rejected { reason: "approval not found".into() },
            }
        };

        if let Some(outcome) = rx.borrow().clone() {
            return outcome;
        }

        let remaining = (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return ApprovalOutcome::Rejected { reason: "approval manager dropped".into() };
                }
                match rx.borrow().clone() {
                    Some(outcome) => outcome,
                    None => ApprovalOutcome::Rejected { reason: "resolved with no outcome".into() },
                }
            }
            _ = tokio::time::sleep(remaining) => {
                self.expire(approval_id).await;
                ApprovalOutcome::Rejected { reason: "approval timed out".into() }
            }
        }
    }

    pub async fn approve(&self, id: ApprovalId, comment: Option<String>) -> Result<(), ApprovalError> {
        self.resolve(id, ApprovalOutcome::Approved { comment }).await
    }

    pub async fn reject(&self, id: ApprovalId, reason: impl Into<String>) -> Result<(), ApprovalError> {
        self.resolve(id, ApprovalOutcome::Rejected { reason: reason.into() }).await
    }

    pub async fn status(&self, id: ApprovalId) -> Option<ApprovalStatus> {
        self.inner.lock().await.by_id.get(&id).map(|e| e.approval.status)
    }

    async fn resolve(&self, id: ApprovalId, outcome: ApprovalOutcome) -> Result<(), ApprovalError> {
        let mut inner = self.inner.lock().await;
        let entry = inner.by_id.get_mut(&id).ok_or(ApprovalError::NotFound(id))?;
        if entry.approval.status != ApprovalStatus::Pending {
            return Err(ApprovalError::AlreadyResolved(id));
        }
        entry.approval.status = match &outcome {
            ApprovalOutcome::Approved { .. } => ApprovalStatus::Approved,
            ApprovalOutcome::Rejected { .. } => ApprovalStatus::Rejected,
        };
        if entry.tx.send(Some(outcome)).is_err() {
            warn!(approval_id = %id, "approval resolved after all awaiters dropped");
        }
        Ok(())
    }

    async fn expire(&self, id: ApprovalId) {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.by_id.get_mut(&id) {
            if entry.approval.status == ApprovalStatus::Pending {
                entry.approval.status = ApprovalStatus::TimedOut;
            }
        }
    }
}

impl Default for ApprovalManager {
    fn default() -> Self {
        Self::new()
    }
}
