// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT

/// One step of a workflow-path turn: its own system prompt and a restricted
/// tool subset, run as a step-scoped Agentic Loop call.
#[derive(Debug, Clone)]
pub struct WorkflowStep {
    pub label: String,
    pub system_prompt: String,
    pub tool_subset: Vec<String>,
}

impl WorkflowStep {
    pub fn new(label: impl Into<String>, system_prompt: impl Into<String>, tool_subset: Vec<String>) -> Self {
        Self { label: label.into(), system_prompt: system_prompt.into(), tool_subset }
    }
}

/// A small step machine over an ordered list of [`WorkflowStep`]s. Owns only
/// the step descriptors and a cursor; running each step through the
/// Agentic Loop, emitting `step_progress`, and checkpointing between steps
/// is the orchestrator's job.
pub struct WorkflowRunner {
    steps: Vec<WorkflowStep>,
    current: usize,
}

impl WorkflowRunner {
    pub fn new(steps: Vec<WorkflowStep>) -> Self {
        Self { steps, current: 0 }
    }

    pub fn current(&self) -> Option<&WorkflowStep> {
        self.steps.get(self.current)
    }

    pub fn current_step_number(&self) -> u32 {
        self.current as u32 + 1
    }

    pub fn total_steps(&self) -> u32 {
        self.steps.len() as u32
    }

    pub fn is_finished(&self) -> bool {
        self.current >= self.steps.len()
    }

    /// Advance to the next step; returns it, or `None` once the runner is
    /// exhausted.
    pub fn advance(&mut self) -> Option<&WorkflowStep> {
        self.current += 1;
        self.steps.get(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps() -> Vec<WorkflowStep> {
        vec![
            WorkflowStep::new("plan", "plan the approach", vec!["read_file".into()]),
            WorkflowStep::new("execute", "carry out the plan", vec!["write".into(), "shell".into()]),
        ]
    }

    #[test]
    fn new_runner_starts_at_the_first_step() {
        let runner = WorkflowRunner::new(steps());
        assert_eq!(runner.current().unwrap().label, "plan");
        assert_eq!(runner.current_step_number(), 1);
        assert_eq!(runner.total_steps(), 2);
        assert!(!runner.is_finished());
    }

    #[test]
    fn advance_moves_to_the_next_step() {
        let mut runner = WorkflowRunner::new(steps());
        let next = runner.advance().unwrap();
        assert_eq!(next.label, "execute");
        assert_eq!(runner.current_step_number(), 2);
    }

    #[test]
    fn advance_past_the_last_step_finishes_the_runner() {
        let mut runner = WorkflowRunner::new(steps());
        runner.advance();
        assert!(runner.advance().is_none());
        assert!(runner.is_finished());
    }

    #[test]
    fn empty_step_list_is_finished_immediately() {
        let runner = WorkflowRunner::new(Vec::new());
        assert!(runner.is_finished());
        assert!(runner.current().is_none());
    }
}
