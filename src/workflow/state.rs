//! Workflow State
//!
//! The single record threaded through every step of one request. Steps never
//! mutate it directly: they return a `StatePatch` that the executor merges.

use crate::execution::QueryResult;
use crate::workflow::graph::GraphState;
use serde::Serialize;
use tracing::warn;

/// Which validation produced the verdict the retry controller should act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    Intent,
    Syntax,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowState {
    /// Current question; replaced by the improved prompt after an intent correction.
    pub prompt: String,
    original_prompt: String,
    pub sql_query: String,
    pub matches_intent: bool,
    pub explanation: String,
    pub improved_prompt: String,
    pub syntax_validation_passed: bool,
    pub explain_output: Option<String>,
    /// Diagnostic from the latest failed validation, consumed by the matching correction.
    pub error_message: Option<String>,
    /// Formatted execution failure, turned into `results` by the format step.
    pub error: Option<String>,
    attempt: u32,
    results: Option<String>,
    pub rows: Option<QueryResult>,
    pub progress: u8,
    pub last_check: Option<Checkpoint>,
}

impl WorkflowState {
    pub fn new(prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        Self {
            original_prompt: prompt.clone(),
            prompt,
            ..Default::default()
        }
    }

    pub fn original_prompt(&self) -> &str {
        &self.original_prompt
    }

    /// Total correction cycles run so far (intent and syntax combined).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn results(&self) -> Option<&str> {
        self.results.as_deref()
    }
}

/// Partial update returned by a step. Unset fields leave the state untouched.
#[derive(Debug, Default)]
pub struct StatePatch {
    pub prompt: Option<String>,
    pub sql_query: Option<String>,
    pub matches_intent: Option<bool>,
    pub explanation: Option<String>,
    pub improved_prompt: Option<String>,
    pub syntax_validation_passed: Option<bool>,
    pub explain_output: Option<String>,
    pub error_message: Option<String>,
    pub clear_error_message: bool,
    pub error: Option<String>,
    pub results: Option<String>,
    pub rows: Option<QueryResult>,
    pub progress: Option<u8>,
    pub last_check: Option<Checkpoint>,
    /// Counts one correction cycle.
    pub bump_attempt: bool,
}

impl GraphState for WorkflowState {
    type Patch = StatePatch;

    fn apply(&mut self, patch: StatePatch) {
        if let Some(prompt) = patch.prompt {
            self.prompt = prompt;
        }
        if let Some(sql) = patch.sql_query {
            self.sql_query = sql;
        }
        if let Some(matches) = patch.matches_intent {
            self.matches_intent = matches;
        }
        if let Some(explanation) = patch.explanation {
            self.explanation = explanation;
        }
        if let Some(improved) = patch.improved_prompt {
            self.improved_prompt = improved;
        }
        if let Some(passed) = patch.syntax_validation_passed {
            self.syntax_validation_passed = passed;
        }
        if let Some(plan) = patch.explain_output {
            self.explain_output = Some(plan);
        }
        if patch.clear_error_message {
            self.error_message = None;
        }
        if let Some(message) = patch.error_message {
            self.error_message = Some(message);
        }
        if let Some(error) = patch.error {
            self.error = Some(error);
        }
        if let Some(results) = patch.results {
            debug_assert!(self.results.is_none(), "results written twice");
            if self.results.is_some() {
                warn!("Overwriting previously set results");
            }
            self.results = Some(results);
        }
        if let Some(rows) = patch.rows {
            self.rows = Some(rows);
        }
        if let Some(progress) = patch.progress {
            self.progress = progress;
        }
        if let Some(check) = patch.last_check {
            self.last_check = Some(check);
        }
        if patch.bump_attempt {
            self.attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_copies_prompt() {
        let state = WorkflowState::new("count partners by country");
        assert_eq!(state.prompt, "count partners by country");
        assert_eq!(state.original_prompt(), "count partners by country");
        assert_eq!(state.attempt(), 0);
        assert!(state.results().is_none());
    }

    #[test]
    fn test_patch_replaces_prompt_but_not_original() {
        let mut state = WorkflowState::new("first");
        state.apply(StatePatch {
            prompt: Some("second".to_string()),
            bump_attempt: true,
            ..Default::default()
        });

        assert_eq!(state.prompt, "second");
        assert_eq!(state.original_prompt(), "first");
        assert_eq!(state.attempt(), 1);
    }

    #[test]
    fn test_empty_patch_is_noop() {
        let mut state = WorkflowState::new("q");
        state.sql_query = "SELECT 1".to_string();
        state.apply(StatePatch::default());
        assert_eq!(state.sql_query, "SELECT 1");
        assert_eq!(state.attempt(), 0);
    }

    #[test]
    fn test_error_message_cleared_then_set() {
        let mut state = WorkflowState::new("q");
        state.apply(StatePatch {
            error_message: Some("syntax error at or near FROM".to_string()),
            ..Default::default()
        });
        assert!(state.error_message.is_some());

        state.apply(StatePatch {
            clear_error_message: true,
            ..Default::default()
        });
        assert!(state.error_message.is_none());
    }
}
