// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::Serialize;

/// Which path a turn should take through the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Chat,
    Workflow,
    Hybrid,
}

/// The Intent Router's classification of one user turn.
#[derive(Debug, Clone, Serialize)]
pub struct Intent {
    pub mode: Mode,
    pub confidence: f32,
    pub reason: String,
    pub capabilities_matched: u32,
    pub complexity: f32,
}
