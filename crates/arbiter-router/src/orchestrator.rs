// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;

use arbiter_events::SessionId;
use tokio::sync::RwLock;
use tracing::debug;

use crate::classifier::IntentClassifier;
use crate::intent::{Intent, Mode};

/// Which Agentic Loop path a turn actually takes. `Hybrid` intents start on
/// `Chat` and may be promoted to `Workflow` mid-turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Path {
    Chat,
    Workflow,
}

/// The routing decision for one turn.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub path: Path,
    pub intent: Intent,
    /// Whether the caller should emit `custom:mode_detected` for this
    /// decision (manual overrides don't; everything else does).
    pub emit_mode_detected: bool,
}

/// The Hybrid Orchestrator (§4.5): picks a path per turn (manual override >
/// confident classification > low-confidence session-default fallback) and
/// tracks the mid-turn promotion of a `hybrid` classification to the
/// workflow path.
#[derive(Default)]
pub struct HybridOrchestrator {
    classifier: IntentClassifier,
    manual_overrides: RwLock<HashMap<SessionId, Mode>>,
    dominant: RwLock<HashMap<SessionId, Mode>>,
}

impl HybridOrchestrator {
    pub fn new(classifier: IntentClassifier) -> Self {
        Self { classifier, manual_overrides: RwLock::new(HashMap::new()), dominant: RwLock::new(HashMap::new()) }
    }

    pub async fn set_manual_override(&self, session_id: SessionId, mode: Mode) {
        self.manual_overrides.write().await.insert(session_id, mode);
    }

    pub async fn clear_manual_override(&self, session_id: SessionId) {
        self.manual_overrides.write().await.remove(&session_id);
    }

    /// Decide the path for one turn and record its mode as the session's new
    /// dominant class (used as the next low-confidence turn's fallback).
    pub async fn route(&self, session_id: SessionId, turn_text: &str) -> RoutingDecision {
        if let Some(mode) = self.manual_overrides.read().await.get(&session_id).copied() {
            let intent = Intent {
                mode,
                confidence: 1.0,
                reason: "user-locked manual override".into(),
                capabilities_matched: 0,
                complexity: 0.0,
            };
            self.dominant.write().await.insert(session_id, mode);
            return RoutingDecision { path: path_for(mode), intent, emit_mode_detected: false };
        }

        let prior = self.dominant.read().await.get(&session_id).copied();
        let intent = self.classifier.classify(turn_text, prior).await;
        self.dominant.write().await.insert(session_id, intent.mode);

        let emit_mode_detected = intent.confidence < 0.7;
        debug!(session_id = %session_id, mode = ?intent.mode, confidence = intent.confidence, "routed turn");
        RoutingDecision { path: path_for(intent.mode), intent, emit_mode_detected }
    }

    /// Whether a chat-path iteration running under a `hybrid` classification
    /// should promote to the workflow path, given the assistant's first
    /// response text. Returns `None` once promotion no longer applies (the
    /// caller should not call this after `run_finished`).
    pub fn check_promotion(&self, first_response_text: &str) -> Option<Intent> {
        if self.classifier.has_workflow_exclusive_signal(first_response_text) {
            Some(Intent {
                mode: Mode::Workflow,
                confidence: 0.9,
                reason: "workflow-exclusive capability observed in first chat-path response".into(),
                capabilities_matched: 1,
                complexity: 0.0,
            })
        } else {
            None
        }
    }
}

fn path_for(mode: Mode) -> Path {
    match mode {
        Mode::Workflow => Path::Workflow,
        // A hybrid classification always starts on the chat path; promotion
        // is decided separately, after the first iteration's response.
        Mode::Chat | Mode::Hybrid => Path::Chat,
    }
}
