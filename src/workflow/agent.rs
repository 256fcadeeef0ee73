//! SQL Agent - entry point of the self-correcting SQL workflow
//!
//! Wires the pipeline steps into a `WorkflowGraph`:
//!
//! ```text
//! generate_sql -> verify_intent --retry--> correct_sql -> generate_sql
//!                      |
//!                      +--------> validate_sql --retry--> correct_syntax -> validate_sql
//!                                      |
//!                                      +--------> execute_query -> format_response
//! ```

use crate::config::WorkflowConfig;
use crate::error::{AgentError, Result};
use crate::execution::{QueryResult, SqlExecutor};
use crate::llm::CompletionService;
use crate::schema_rag::ContextRetriever;
use crate::workflow::controller::should_retry;
use crate::workflow::graph::WorkflowGraph;
use crate::workflow::progress::{ProgressCallback, ProgressMode, ProgressReporter};
use crate::workflow::state::WorkflowState;
use crate::workflow::steps::{
    CorrectIntentStep, CorrectSyntaxStep, ExecuteQueryStep, FormatResponseStep, GenerateSqlStep,
    ValidateSqlStep, VerifyIntentStep,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

pub const GENERATE_SQL: &str = "generate_sql";
pub const VERIFY_INTENT: &str = "verify_intent";
pub const CORRECT_SQL: &str = "correct_sql";
pub const VALIDATE_SQL: &str = "validate_sql";
pub const CORRECT_SYNTAX: &str = "correct_syntax";
pub const EXECUTE_QUERY: &str = "execute_query";
pub const FORMAT_RESPONSE: &str = "format_response";

#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Executor safety bound on step executions per run.
    pub max_steps: usize,
    /// Schema chunks retrieved for generation and correction.
    pub context_k: usize,
}

impl Default for AgentOptions {
    fn default() -> Self {
        let defaults = WorkflowConfig::default();
        Self {
            max_steps: defaults.max_steps,
            context_k: defaults.context_k,
        }
    }
}

impl From<&WorkflowConfig> for AgentOptions {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            context_k: config.context_k,
        }
    }
}

/// What a caller gets back from one run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentOutcome {
    pub run_id: String,
    pub results: String,
    pub sql_query: String,
    pub attempts: u32,
    pub matched_intent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub rows: Option<QueryResult>,
    pub original_prompt: String,
    pub final_prompt: String,
    /// Step names in execution order.
    pub steps: Vec<String>,
}

impl AgentOutcome {
    fn from_state(run_id: String, state: WorkflowState, steps: Vec<String>) -> Self {
        Self {
            run_id,
            results: state.results().unwrap_or_default().to_string(),
            sql_query: state.sql_query.clone(),
            attempts: state.attempt(),
            matched_intent: state.matches_intent,
            error: state.error.clone(),
            original_prompt: state.original_prompt().to_string(),
            final_prompt: state.prompt.clone(),
            rows: state.rows,
            steps,
        }
    }

    /// True when the final execution produced rows.
    pub fn has_rows(&self) -> bool {
        self.rows.as_ref().map(|r| !r.is_empty()).unwrap_or(false)
    }
}

/// Collaborators are shared; each run gets its own state and graph.
#[derive(Clone)]
pub struct SqlAgent {
    llm: Arc<dyn CompletionService>,
    retriever: Arc<dyn ContextRetriever>,
    executor: Arc<dyn SqlExecutor>,
    options: AgentOptions,
}

impl SqlAgent {
    pub fn new(
        llm: Arc<dyn CompletionService>,
        retriever: Arc<dyn ContextRetriever>,
        executor: Arc<dyn SqlExecutor>,
    ) -> Self {
        Self {
            llm,
            retriever,
            executor,
            options: AgentOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AgentOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn build_graph(&self, progress: ProgressReporter) -> WorkflowGraph<WorkflowState> {
        let mut graph = WorkflowGraph::new();
        graph
            .register(
                GENERATE_SQL,
                GenerateSqlStep {
                    llm: self.llm.clone(),
                    retriever: self.retriever.clone(),
                    progress: progress.clone(),
                    context_k: self.options.context_k,
                },
            )
            .register(
                VERIFY_INTENT,
                VerifyIntentStep {
                    llm: self.llm.clone(),
                    progress: progress.clone(),
                },
            )
            .register(CORRECT_SQL, CorrectIntentStep)
            .register(
                VALIDATE_SQL,
                ValidateSqlStep {
                    executor: self.executor.clone(),
                    progress: progress.clone(),
                },
            )
            .register(
                CORRECT_SYNTAX,
                CorrectSyntaxStep {
                    llm: self.llm.clone(),
                    retriever: self.retriever.clone(),
                    context_k: self.options.context_k,
                },
            )
            .register(
                EXECUTE_QUERY,
                ExecuteQueryStep {
                    executor: self.executor.clone(),
                    progress: progress.clone(),
                },
            )
            .register(FORMAT_RESPONSE, FormatResponseStep { progress })
            .set_entry(GENERATE_SQL)
            .edge(GENERATE_SQL, VERIFY_INTENT)
            .conditional_edge(VERIFY_INTENT, should_retry, CORRECT_SQL, VALIDATE_SQL)
            .edge(CORRECT_SQL, GENERATE_SQL)
            .conditional_edge(VALIDATE_SQL, should_retry, CORRECT_SYNTAX, EXECUTE_QUERY)
            .edge(CORRECT_SYNTAX, VALIDATE_SQL)
            .edge(EXECUTE_QUERY, FORMAT_RESPONSE)
            .set_terminal(FORMAT_RESPONSE);
        graph
    }

    /// Run standalone without progress reporting.
    pub async fn run(&self, prompt: &str) -> Result<AgentOutcome> {
        self.run_with_progress(prompt, None, ProgressMode::Standalone).await
    }

    /// Run as the first half of a larger pipeline (progress 10..=50).
    pub async fn run_as_sub_workflow(
        &self,
        prompt: &str,
        callback: Option<ProgressCallback>,
    ) -> Result<AgentOutcome> {
        self.run_with_progress(prompt, callback, ProgressMode::SubWorkflow).await
    }

    pub async fn run_with_progress(
        &self,
        prompt: &str,
        callback: Option<ProgressCallback>,
        mode: ProgressMode,
    ) -> Result<AgentOutcome> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(AgentError::InvalidRequest("prompt must not be empty".to_string()));
        }

        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("sql_agent", run_id = %run_id, executor = self.executor.name());
        let graph = self.build_graph(ProgressReporter::new(callback, mode));
        let max_steps = self.options.max_steps;

        async move {
            info!(prompt = %prompt, ?mode, "Starting SQL workflow");
            let (state, steps) = graph.run_traced(WorkflowState::new(prompt), max_steps).await?;
            info!(
                attempts = state.attempt(),
                matched_intent = state.matches_intent,
                steps = steps.len(),
                "SQL workflow finished"
            );
            Ok(AgentOutcome::from_state(run_id, state, steps))
        }
        .instrument(span)
        .await
    }
}
