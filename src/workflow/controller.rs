//! Attempt/retry controller shared by both correction families.

use crate::workflow::state::{Checkpoint, WorkflowState};

/// Total correction cycles (intent and syntax combined) allowed per run.
pub const MAX_ATTEMPTS: u32 = 3;

/// Decide whether the latest validation verdict should send the run into a
/// correction step.
///
/// Evaluated after Verify-Intent and after Validate-Syntax. Only the verdict of
/// the checkpoint that just ran counts, so a stale `matches_intent == true`
/// cannot mask a syntax failure. Once `attempt` reaches `MAX_ATTEMPTS` the run
/// always moves forward.
pub fn should_retry(state: &WorkflowState) -> bool {
    if budget_exhausted(state) {
        return false;
    }
    match state.last_check {
        Some(Checkpoint::Intent) => !state.matches_intent,
        Some(Checkpoint::Syntax) => !state.syntax_validation_passed,
        None => false,
    }
}

pub fn budget_exhausted(state: &WorkflowState) -> bool {
    state.attempt() >= MAX_ATTEMPTS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::graph::GraphState;
    use crate::workflow::state::StatePatch;

    fn state_with_attempts(n: u32) -> WorkflowState {
        let mut state = WorkflowState::new("q");
        for _ in 0..n {
            state.apply(StatePatch {
                bump_attempt: true,
                ..Default::default()
            });
        }
        state
    }

    #[test]
    fn test_intent_mismatch_retries_within_budget() {
        let mut state = state_with_attempts(2);
        state.last_check = Some(Checkpoint::Intent);
        state.matches_intent = false;
        assert!(should_retry(&state));
    }

    #[test]
    fn test_intent_match_moves_on() {
        let mut state = state_with_attempts(0);
        state.last_check = Some(Checkpoint::Intent);
        state.matches_intent = true;
        assert!(!should_retry(&state));
    }

    #[test]
    fn test_syntax_failure_retries_even_after_intent_matched() {
        let mut state = state_with_attempts(0);
        state.matches_intent = true;
        state.last_check = Some(Checkpoint::Syntax);
        state.syntax_validation_passed = false;
        assert!(should_retry(&state));
    }

    #[test]
    fn test_exhausted_budget_forces_progress() {
        let mut state = state_with_attempts(MAX_ATTEMPTS);
        state.last_check = Some(Checkpoint::Syntax);
        state.syntax_validation_passed = false;
        state.matches_intent = false;
        assert!(budget_exhausted(&state));
        assert!(!should_retry(&state));
    }

    #[test]
    fn test_no_checkpoint_never_retries() {
        assert!(!should_retry(&WorkflowState::new("q")));
    }
}
