// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use arbiter_events::{RunErrorKind, SessionId, ToolCallId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(SessionId),
    #[error("session {0} already has an in-flight run")]
    InvalidState(SessionId),
    #[error("tool call {1} not found in session {0}")]
    ToolCallNotFound(SessionId, ToolCallId),
}

impl From<&SessionError> for RunErrorKind {
    fn from(e: &SessionError) -> Self {
        match e {
            SessionError::NotFound(_) => RunErrorKind::NotFound,
            SessionError::InvalidState(_) => RunErrorKind::InvalidState,
            SessionError::ToolCallNotFound(_, _) => RunErrorKind::NotFound,
        }
    }
}
