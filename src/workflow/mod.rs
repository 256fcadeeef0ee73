//! Self-correcting SQL workflow: a bounded-retry state machine that turns a
//! prompt into a verified, executed SQL statement.

pub mod agent;
pub mod controller;
pub mod graph;
pub mod judgment;
pub mod progress;
pub mod prompts;
pub mod sql_text;
pub mod state;
pub mod steps;


pub use agent::{AgentOptions, AgentOutcome, SqlAgent};
pub use controller::{should_retry, MAX_ATTEMPTS};
pub use graph::{FnStep, GraphState, Predicate, Step, WorkflowGraph};
pub use judgment::{parse_judgment, IntentJudgment};
pub use progress::{ProgressCallback, ProgressMode, ProgressReporter, ProgressStage};
pub use sql_text::{normalize_for_execution, strip_markdown};
pub use state::{Checkpoint, StatePatch, WorkflowState};
pub use steps::SyntaxCheck;
