//! Pipeline steps of the SQL workflow.
//!
//! Each step reads the current `WorkflowState` and returns a `StatePatch`.
//! Expected failures (intent mismatch, explain errors, execution errors) are
//! recorded in the patch; only collaborator failures and malformed judgments
//! come back as `Err`.

use crate::error::{AgentError, Result};
use crate::execution::{QueryResult, SqlExecutor};
use crate::llm::CompletionService;
use crate::schema_rag::ContextRetriever;
use crate::workflow::graph::Step;
use crate::workflow::judgment::parse_judgment;
use crate::workflow::progress::{ProgressReporter, ProgressStage};
use crate::workflow::prompts;
use crate::workflow::sql_text::{normalize_for_execution, strip_markdown};
use crate::workflow::state::{Checkpoint, StatePatch, WorkflowState};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const NO_OUTPUT_MESSAGE: &str = "No output returned";
pub const NO_ROWS_MESSAGE: &str = "✅ Query ran successfully, but no results were found.";

/// Verdict of an explain-only dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxCheck {
    Passed { plan: String },
    Failed { diagnostic: String },
}

/// Classify what the executor returned for `explain`.
///
/// Plan text carries cost markers; anything else is treated as the database's
/// diagnostic. Transport errors fail the check instead of aborting the run.
pub fn classify_explain(outcome: Result<String>) -> SyntaxCheck {
    match outcome {
        Ok(text) if text.trim().is_empty() => SyntaxCheck::Failed {
            diagnostic: NO_OUTPUT_MESSAGE.to_string(),
        },
        Ok(text) if text.contains("cost") => SyntaxCheck::Passed { plan: text },
        Ok(text) => SyntaxCheck::Failed { diagnostic: text },
        Err(e) => SyntaxCheck::Failed {
            diagnostic: e.to_string(),
        },
    }
}

/// Success message for a non-empty result set.
pub fn format_rows(rows: &QueryResult) -> String {
    format!(
        "✅ Query successful. Retrieved {} row(s).\n\n{}",
        rows.row_count(),
        rows.render_table()
    )
}

fn require_sql(raw: &str, what: &str) -> Result<String> {
    let sql = strip_markdown(raw);
    if sql.is_empty() {
        return Err(AgentError::Llm(format!("{} returned no SQL", what)));
    }
    Ok(sql)
}

pub struct GenerateSqlStep {
    pub llm: Arc<dyn CompletionService>,
    pub retriever: Arc<dyn ContextRetriever>,
    pub progress: ProgressReporter,
    pub context_k: usize,
}

#[async_trait]
impl Step<WorkflowState> for GenerateSqlStep {
    async fn run(&self, state: &WorkflowState) -> Result<StatePatch> {
        let percent = self.progress.report_stage(ProgressStage::Generate);
        info!(prompt = %state.prompt, "Generating SQL query");

        let context = self.retriever.retrieve(&state.prompt, self.context_k).await?;
        let raw = self
            .llm
            .complete(&prompts::generate_sql_system(&context), &state.prompt)
            .await?;
        let sql = require_sql(&raw, "SQL generation")?;
        info!(sql = %sql, "Generated SQL");

        Ok(StatePatch {
            sql_query: Some(sql),
            progress: Some(percent),
            ..Default::default()
        })
    }
}

pub struct VerifyIntentStep {
    pub llm: Arc<dyn CompletionService>,
    pub progress: ProgressReporter,
}

#[async_trait]
impl Step<WorkflowState> for VerifyIntentStep {
    async fn run(&self, state: &WorkflowState) -> Result<StatePatch> {
        let percent = self.progress.report_stage(ProgressStage::Verify);

        let response = self
            .llm
            .complete(
                &prompts::verify_intent_system(&state.prompt),
                &prompts::verify_intent_user(&state.sql_query),
            )
            .await?;
        let judgment = parse_judgment(&response)?;
        info!(
            matches_intent = judgment.is_valid,
            explanation = %judgment.explanation,
            "Intent verified"
        );

        Ok(StatePatch {
            matches_intent: Some(judgment.is_valid),
            explanation: Some(judgment.explanation),
            improved_prompt: Some(judgment.improved_prompt),
            last_check: Some(Checkpoint::Intent),
            progress: Some(percent),
            ..Default::default()
        })
    }
}

/// Swap in the improved prompt; the next generation works from it.
pub struct CorrectIntentStep;

#[async_trait]
impl Step<WorkflowState> for CorrectIntentStep {
    async fn run(&self, state: &WorkflowState) -> Result<StatePatch> {
        let attempt = state.attempt() + 1;
        let prompt = if state.improved_prompt.trim().is_empty() {
            warn!(attempt, "No improved prompt supplied; regenerating from the current prompt");
            state.prompt.clone()
        } else {
            state.improved_prompt.clone()
        };
        info!(attempt, prompt = %prompt, "Correcting intent");

        Ok(StatePatch {
            prompt: Some(prompt),
            clear_error_message: true,
            bump_attempt: true,
            ..Default::default()
        })
    }
}

pub struct ValidateSqlStep {
    pub executor: Arc<dyn SqlExecutor>,
    pub progress: ProgressReporter,
}

#[async_trait]
impl Step<WorkflowState> for ValidateSqlStep {
    async fn run(&self, state: &WorkflowState) -> Result<StatePatch> {
        let percent = self.progress.report_stage(ProgressStage::Validate);

        let check = classify_explain(self.executor.explain(&state.sql_query).await);
        let mut patch = StatePatch {
            last_check: Some(Checkpoint::Syntax),
            progress: Some(percent),
            ..Default::default()
        };
        match check {
            SyntaxCheck::Passed { plan } => {
                info!("SQL validation passed");
                patch.syntax_validation_passed = Some(true);
                patch.explain_output = Some(plan);
                patch.clear_error_message = true;
            }
            SyntaxCheck::Failed { diagnostic } => {
                warn!(diagnostic = %diagnostic, "SQL validation failed");
                patch.syntax_validation_passed = Some(false);
                patch.error_message = Some(diagnostic);
            }
        }
        Ok(patch)
    }
}

pub struct CorrectSyntaxStep {
    pub llm: Arc<dyn CompletionService>,
    pub retriever: Arc<dyn ContextRetriever>,
    pub context_k: usize,
}

#[async_trait]
impl Step<WorkflowState> for CorrectSyntaxStep {
    async fn run(&self, state: &WorkflowState) -> Result<StatePatch> {
        let attempt = state.attempt() + 1;
        let diagnostic = state
            .error_message
            .as_deref()
            .unwrap_or("Query failed validation without a diagnostic");
        info!(attempt, diagnostic = %diagnostic, "Correcting SQL syntax");

        let context = self.retriever.retrieve(&state.prompt, self.context_k).await?;
        let raw = self
            .llm
            .complete(
                &prompts::correct_syntax_system(&state.sql_query, diagnostic, &context),
                &prompts::correct_syntax_user(diagnostic),
            )
            .await?;
        let sql = require_sql(&raw, "Syntax correction")?;
        info!(sql = %sql, "Corrected SQL");

        Ok(StatePatch {
            sql_query: Some(sql),
            clear_error_message: true,
            bump_attempt: true,
            ..Default::default()
        })
    }
}

pub struct ExecuteQueryStep {
    pub executor: Arc<dyn SqlExecutor>,
    pub progress: ProgressReporter,
}

#[async_trait]
impl Step<WorkflowState> for ExecuteQueryStep {
    async fn run(&self, state: &WorkflowState) -> Result<StatePatch> {
        let percent = self.progress.report_stage(ProgressStage::Execute);
        let sql = normalize_for_execution(&state.sql_query);
        info!(sql = %sql, "Executing query");

        let mut patch = StatePatch {
            progress: Some(percent),
            ..Default::default()
        };
        match self.executor.execute(sql).await {
            Ok(rows) if rows.is_empty() => {
                info!("Query returned no rows");
                patch.results = Some(NO_ROWS_MESSAGE.to_string());
                patch.rows = Some(rows);
            }
            Ok(rows) => {
                info!(rows = rows.row_count(), "Query returned rows");
                patch.results = Some(format_rows(&rows));
                patch.rows = Some(rows);
            }
            Err(e) => {
                error!(error = %e, "Query execution failed");
                patch.error = Some(format!("❌ Query failed:\n{}", e));
            }
        }
        Ok(patch)
    }
}

/// Terminal step: makes sure `results` carries either the rows or the failure.
pub struct FormatResponseStep {
    pub progress: ProgressReporter,
}

#[async_trait]
impl Step<WorkflowState> for FormatResponseStep {
    async fn run(&self, state: &WorkflowState) -> Result<StatePatch> {
        let percent = self.progress.report_stage(ProgressStage::Format);

        let results = match (state.results(), &state.error) {
            (Some(_), _) => None,
            (None, Some(error)) => Some(error.clone()),
            (None, None) => Some(NO_ROWS_MESSAGE.to_string()),
        };

        Ok(StatePatch {
            results,
            progress: Some(percent),
            ..Default::default()
        })
    }
}
