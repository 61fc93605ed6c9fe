// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use arbiter_events::{ApprovalId, RunErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("approval {0} not found")]
    NotFound(ApprovalId),
    #[error("approval {0} was already resolved")]
    AlreadyResolved(ApprovalId),
}

impl From<&ApprovalError> for RunErrorKind {
    fn from(e: &ApprovalError) -> Self {
        match e {
            ApprovalError::NotFound(_) => RunErrorKind::NotFound,
            ApprovalError::AlreadyResolved(_) => RunErrorKind::InvalidState,
        }
    }
}
