// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use arbiter_events::{JsonPatchOp, PatchOp};
use serde_json::Value;

use crate::error::SyncError;
use crate::pointer;

/// The server's authoritative copy of the shared JSON-tree state, plus a
/// monotonic version counter bumped on every mutation.
pub struct StateDocument {
    value: Value,
    version: u64,
}

impl StateDocument {
    pub fn new(initial: Value) -> Self {
        Self { value: initial, version: 0 }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// A `state_snapshot`-shaped pair: the full tree and its version.
    pub fn snapshot(&self) -> (Value, u64) {
        (self.value.clone(), self.version)
    }

    /// Replace the document wholesale with a previously captured
    /// snapshot, restoring its version rather than resetting to zero.
    /// Used by checkpoint restoration.
    pub fn restore(&mut self, value: Value, version: u64) {
        self.value = value;
        self.version = version;
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        pointer::get(&self.value, path)
    }

    /// Apply a batch of ops as one atomic mutation, bumping the version
    /// exactly once. Returns the `(ops, new_version, base_version)` tuple a
    /// `state_delta` event is built from.
    pub fn apply_ops(&mut self, ops: Vec<JsonPatchOp>) -> Result<(Vec<JsonPatchOp>, u64, u64), SyncError> {
        let base_version = self.version;
        for op in &ops {
            apply_single(&mut self.value, op)?;
        }
        self.version += 1;
        Ok((ops, self.version, base_version))
    }
}

fn apply_single(root: &mut Value, op: &JsonPatchOp) -> Result<(), SyncError> {
    match op.op {
        PatchOp::Remove => {
            pointer::remove(root, &op.path)?;
        }
        PatchOp::Add | PatchOp::Replace => {
            let value = op.value.clone().ok_or_else(|| SyncError::MissingValue(op.path.clone()))?;
            pointer::set(root, &op.path, value)?;
        }
        PatchOp::Move => {
            let from = op.from.clone().ok_or_else(|| SyncError::MissingFrom(op.path.clone()))?;
            let value = pointer::remove(root, &from)?;
            pointer::set(root, &op.path, value)?;
        }
    }
    Ok(())
}
