// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;

use crate::intent::{Intent, Mode};

const WORKFLOW_KEYWORDS: &[&str] =
    &["run the workflow", "execute workflow", "/workflow", "use a workflow", "start a pipeline", "run the pipeline"];

const HYBRID_KEYWORDS: &[&str] = &["not sure if this needs", "maybe a workflow", "could be multiple steps"];

const CHAT_KEYWORDS: &[&str] = &["just tell me", "quick question", "what is", "can you explain", "briefly"];

/// Keyword signals that a multi-agent/planning/persistence capability is
/// required — these pin the turn to `workflow` regardless of the rule-based
/// pass, per the capability detector step.
const CAPABILITY_KEYWORDS: &[&str] = &[
    "spawn a subagent",
    "spawn subagents",
    "delegate to another agent",
    "delegate this to an agent",
    "create a multi-step plan",
    "persist state across steps",
    "checkpoint between steps",
    "run these in parallel agents",
];

const CONFIDENCE_FLOOR: f32 = 0.7;

/// Invoked only when neither the rule-based pass nor the capability
/// detector produced a class — an LLM-backed fallback classifier. Kept as a
/// trait so the Agentic Loop's model provider can supply the real
/// implementation; this crate ships no concrete implementation of its own.
#[async_trait]
pub trait NeuralClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Intent;
}

/// The Intent Router (§4.5): rule-based keyword pass, capability detector,
/// neural fallback, confidence floor.
pub struct IntentClassifier {
    workflow_keywords: Vec<String>,
    hybrid_keywords: Vec<String>,
    chat_keywords: Vec<String>,
    capability_keywords: Vec<String>,
    neural: Option<Arc<dyn NeuralClassifier>>,
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self {
            workflow_keywords: WORKFLOW_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            hybrid_keywords: HYBRID_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            chat_keywords: CHAT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            capability_keywords: CAPABILITY_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            neural: None,
        }
    }

    pub fn with_neural_classifier(mut self, classifier: Arc<dyn NeuralClassifier>) -> Self {
        self.neural = Some(classifier);
        self
    }

    /// Classify one turn. `prior_dominant` is the session's most recently
    /// settled mode (`None` on the session's first turn).
    pub async fn classify(&self, text: &str, prior_dominant: Option<Mode>) -> Intent {
        let lower = text.to_lowercase();
        let mut intent = self.classify_uncapped(&lower, text).await;

        if intent.confidence < CONFIDENCE_FLOOR {
            let fallback = prior_dominant.unwrap_or(Mode::Chat);
            intent.reason = format!(
                "{} (confidence {:.2} below floor, defaulted to {:?})",
                intent.reason, intent.confidence, fallback
            );
            intent.mode = fallback;
        }
        intent
    }

    async fn classify_uncapped(&self, lower: &str, original: &str) -> Intent {
        let complexity = estimate_complexity(lower);

        if let Some(mode) = self.rule_based_pass(lower) {
            return Intent { mode, confidence: 0.95, reason: "keyword match".into(), capabilities_matched: 0, complexity };
        }

        let matched = self.capability_keywords.iter().filter(|k| lower.contains(k.as_str())).count() as u32;
        if matched > 0 {
            let confidence = (0.6 + 0.1 * matched as f32).min(0.95);
            return Intent {
                mode: Mode::Workflow,
                confidence,
                reason: format!("{matched} workflow-exclusive capability keyword(s) matched"),
                capabilities_matched: matched,
                complexity,
            };
        }

        match &self.neural {
            Some(neural) => neural.classify(original).await,
            None => Intent {
                mode: Mode::Chat,
                confidence: 0.5,
                reason: "no neural classifier configured".into(),
                capabilities_matched: 0,
                complexity,
            },
        }
    }

    fn rule_based_pass(&self, lower: &str) -> Option<Mode> {
        if self.workflow_keywords.iter().any(|k| lower.contains(k.as_str())) {
            return Some(Mode::Workflow);
        }
        if self.hybrid_keywords.iter().any(|k| lower.contains(k.as_str())) {
            return Some(Mode::Hybrid);
        }
        if self.chat_keywords.iter().any(|k| lower.contains(k.as_str())) {
            return Some(Mode::Chat);
        }
        None
    }

    /// Whether `text` (typically an assistant's first response under the
    /// chat path of a hybrid-routed turn) names a workflow-exclusive
    /// capability, used to decide hybrid promotion.
    pub fn has_workflow_exclusive_signal(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.capability_keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// A deterministic, content-free complexity estimate in `[0, 1]`, derived
/// from turn length. Not a proxy for task difficulty — only a coarse signal
/// carried on `Intent` for downstream consumers (e.g. step-budget sizing).
fn estimate_complexity(lower: &str) -> f32 {
    let words = lower.split_whitespace().count() as f32;
    (words / 200.0).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rule_based_pass_detects_workflow_keyword() {
        let c = IntentClassifier::new();
        let intent = c.classify("please use a workflow to do this", None).await;
        assert_eq!(intent.mode, Mode::Workflow);
        assert_eq!(intent.confidence, 0.95);
    }

    #[tokio::test]
    async fn rule_based_pass_detects_chat_keyword() {
        let c = IntentClassifier::new();
        let intent = c.classify("just tell me the capital of France", None).await;
        assert_eq!(intent.mode, Mode::Chat);
        assert_eq!(intent.confidence, 0.95);
    }

    #[tokio::test]
    async fn rule_based_pass_detects_hybrid_keyword() {
        let c = IntentClassifier::new();
        let intent = c.classify("not sure if this needs several steps", None).await;
        assert_eq!(intent.mode, Mode::Hybrid);
    }

    #[tokio::test]
    async fn capability_detector_pins_workflow_with_scaled_confidence() {
        let c = IntentClassifier::new();
        let intent = c.classify("please spawn a subagent and delegate to another agent", None).await;
        assert_eq!(intent.mode, Mode::Workflow);
        assert_eq!(intent.capabilities_matched, 2);
        assert!((intent.confidence - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn capability_confidence_caps_at_0_95() {
        let c = IntentClassifier::new();
        let text = CAPABILITY_KEYWORDS.join(" and ");
        let intent = c.classify(&text, None).await;
        assert_eq!(intent.confidence, 0.95);
    }

    #[tokio::test]
    async fn no_match_and_no_neural_classifier_defaults_to_chat_below_floor() {
        let c = IntentClassifier::new();
        let intent = c.classify("asdkjalksjd unrelated text", None).await;
        assert_eq!(intent.mode, Mode::Chat);
    }

    #[tokio::test]
    async fn low_confidence_falls_back_to_prior_dominant_mode() {
        let c = IntentClassifier::new();
        let intent = c.classify("asdkjalksjd unrelated text", Some(Mode::Workflow)).await;
        assert_eq!(intent.mode, Mode::Workflow);
        assert!(intent.reason.contains("below floor"));
    }

    struct FixedNeural(Intent);

    #[async_trait]
    impl NeuralClassifier for FixedNeural {
        async fn classify(&self, _text: &str) -> Intent {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn neural_fallback_is_used_when_configured_and_no_rule_matches() {
        let neural = Arc::new(FixedNeural(Intent {
            mode: Mode::Workflow,
            confidence: 0.8,
            reason: "model says workflow".into(),
            capabilities_matched: 0,
            complexity: 0.1,
        }));
        let c = IntentClassifier::new().with_neural_classifier(neural);
        let intent = c.classify("completely unrelated free text", None).await;
        assert_eq!(intent.mode, Mode::Workflow);
        assert_eq!(intent.confidence, 0.8);
    }

    #[tokio::test]
    async fn neural_classification_below_floor_still_defaults() {
        let neural = Arc::new(FixedNeural(Intent {
            mode: Mode::Workflow,
            confidence: 0.4,
            reason: "uncertain".into(),
            capabilities_matched: 0,
            complexity: 0.1,
        }));
        let c = IntentClassifier::new().with_neural_classifier(neural);
        let intent = c.classify("completely unrelated free text", None).await;
        assert_eq!(intent.mode, Mode::Chat);
    }

    #[test]
    fn has_workflow_exclusive_signal_detects_capability_phrase() {
        let c = IntentClassifier::new();
        assert!(c.has_workflow_exclusive_signal("I'll spawn a subagent for this"));
        assert!(!c.has_workflow_exclusive_signal("here's a simple answer"));
    }
}
