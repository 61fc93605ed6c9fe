// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! State Sync (§4.6): a shared JSON-tree document with versioned
//! snapshots/deltas and pluggable conflict resolution for client-originated
//! writes that race a server mutation.

mod conflict;
mod document;
mod engine;
mod error;
mod pointer;

pub use conflict::{ConflictStrategy, LastWriteWins, Resolution};
pub use document::StateDocument;
pub use engine::{ClientApplyOutcome, ClientDiff, ConflictReport, ServerDelta, SyncEngine};
pub use error::SyncError;
