// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use arbiter_events::{CheckpointId, RunErrorKind, SessionId};
use arbiter_session::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("checkpoint {0} not found")]
    NotFound(CheckpointId),
    #[error("session {0} has an in-flight run")]
    InvalidState(SessionId),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<&RecoveryError> for RunErrorKind {
    fn from(e: &RecoveryError) -> Self {
        match e {
            RecoveryError::NotFound(_) => RunErrorKind::NotFound,
            RecoveryError::InvalidState(_) => RunErrorKind::InvalidState,
            RecoveryError::Session(e) => e.into(),
        }
    }
}
