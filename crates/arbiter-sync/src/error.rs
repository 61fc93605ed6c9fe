// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use arbiter_events::RunErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("path '{0}' does not exist")]
    PathNotFound(String),
    #[error("op at '{0}' is missing a required value")]
    MissingValue(String),
    #[error("move op at '{0}' is missing a 'from' path")]
    MissingFrom(String),
    #[error("path '{0}' is malformed")]
    MalformedPath(String),
}

impl From<&SyncError> for RunErrorKind {
    fn from(_: &SyncError) -> Self {
        RunErrorKind::Internal
    }
}
