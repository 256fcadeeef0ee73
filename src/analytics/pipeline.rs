//! Insight Pipeline
//!
//! Runs the SQL workflow in sub-workflow mode (progress 10..=50), then an
//! analytics graph over its rows: summarize data (60), statistics (70),
//! trends (80), insights (90), report (100). Without rows the pipeline goes straight to the
//! report, which explains why nothing was analyzed.

use crate::analytics::insights::generate_insights;
use crate::analytics::report::AnalyticsReport;
use crate::analytics::stats::{profile, DataProfile};
use crate::analytics::trends::{analyze_trends, TrendAnalysis};
use crate::error::Result;
use crate::execution::QueryResult;
use crate::llm::CompletionService;
use crate::workflow::graph::{GraphState, Step, WorkflowGraph};
use crate::workflow::progress::{ProgressCallback, ProgressMode, ProgressReporter};
use crate::workflow::{AgentOutcome, SqlAgent};
use async_trait::async_trait;
use chrono::Local;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

pub const SUMMARIZE_DATA: &str = "summarize_data";
pub const STATISTICS: &str = "statistical_analysis";
pub const TRENDS: &str = "trends_analysis";
pub const GENERATE_INSIGHTS: &str = "generate_insights";
pub const FORMAT_REPORT: &str = "format_report";

const MAX_ANALYTICS_STEPS: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct AnalyticsState {
    pub question: String,
    pub sql_query: String,
    pub rows: Option<QueryResult>,
    pub sql_error: Option<String>,
    pub skip_reason: Option<String>,
    pub profile: Option<DataProfile>,
    pub trends: Option<TrendAnalysis>,
    pub insights: Vec<String>,
    pub insight_error: Option<String>,
    pub report: Option<String>,
}

#[derive(Debug, Default)]
pub struct AnalyticsPatch {
    pub skip_reason: Option<String>,
    pub profile: Option<DataProfile>,
    pub trends: Option<TrendAnalysis>,
    pub insights: Option<Vec<String>>,
    pub insight_error: Option<String>,
    pub report: Option<String>,
}

impl GraphState for AnalyticsState {
    type Patch = AnalyticsPatch;

    fn apply(&mut self, patch: AnalyticsPatch) {
        if let Some(reason) = patch.skip_reason {
            self.skip_reason = Some(reason);
        }
        if let Some(profile) = patch.profile {
            self.profile = Some(profile);
        }
        if let Some(trends) = patch.trends {
            self.trends = Some(trends);
        }
        if let Some(insights) = patch.insights {
            self.insights = insights;
        }
        if let Some(error) = patch.insight_error {
            self.insight_error = Some(error);
        }
        if let Some(report) = patch.report {
            self.report = Some(report);
        }
    }
}

fn has_data(state: &AnalyticsState) -> bool {
    state.skip_reason.is_none()
}

struct SummarizeDataStep {
    progress: ProgressReporter,
}

#[async_trait]
impl Step<AnalyticsState> for SummarizeDataStep {
    async fn run(&self, state: &AnalyticsState) -> Result<AnalyticsPatch> {
        self.progress.report("Parsing SQL results...", 60);

        let skip_reason = match (&state.sql_error, &state.rows) {
            (Some(error), _) => Some(format!("the query failed ({})", error.trim())),
            (None, Some(rows)) if !rows.is_empty() => None,
            _ => Some("the query returned no rows".to_string()),
        };
        match &skip_reason {
            Some(reason) => warn!(reason = %reason, "Skipping analytics"),
            None => info!(
                rows = state.rows.as_ref().map(|r| r.row_count()).unwrap_or(0),
                "Analyzing query results"
            ),
        }
        Ok(AnalyticsPatch {
            skip_reason,
            ..Default::default()
        })
    }
}

struct StatisticsStep {
    progress: ProgressReporter,
}

#[async_trait]
impl Step<AnalyticsState> for StatisticsStep {
    async fn run(&self, state: &AnalyticsState) -> Result<AnalyticsPatch> {
        self.progress.report("Performing statistical analysis...", 70);
        let profile = state.rows.as_ref().map(profile).unwrap_or_default();
        info!(
            numeric = ?profile.numeric_columns,
            date = ?profile.date_columns,
            categorical = ?profile.categorical_columns,
            "Column classification"
        );
        Ok(AnalyticsPatch {
            profile: Some(profile),
            ..Default::default()
        })
    }
}

struct TrendsStep {
    progress: ProgressReporter,
}

#[async_trait]
impl Step<AnalyticsState> for TrendsStep {
    async fn run(&self, state: &AnalyticsState) -> Result<AnalyticsPatch> {
        self.progress.report("Analyzing trends...", 80);
        let trends = match (&state.rows, &state.profile) {
            (Some(rows), Some(profile)) => analyze_trends(rows, profile),
            _ => TrendAnalysis::default(),
        };
        info!(
            temporal = trends.temporal_trends.len(),
            volume = trends.volume_trends.len(),
            comparative = trends.comparative_trends.len(),
            "Trends analyzed"
        );
        Ok(AnalyticsPatch {
            trends: Some(trends),
            ..Default::default()
        })
    }
}

struct InsightsStep {
    llm: Arc<dyn CompletionService>,
    progress: ProgressReporter,
}

#[async_trait]
impl Step<AnalyticsState> for InsightsStep {
    async fn run(&self, state: &AnalyticsState) -> Result<AnalyticsPatch> {
        self.progress.report("Generating business insights...", 90);
        let profile = state.profile.clone().unwrap_or_default();

        // The statistics are still worth reporting when the insight call fails.
        match generate_insights(self.llm.as_ref(), &state.question, &profile, state.trends.as_ref()).await {
            Ok(insights) => Ok(AnalyticsPatch {
                insights: Some(insights),
                ..Default::default()
            }),
            Err(e) => {
                warn!(error = %e, "Insight generation failed");
                Ok(AnalyticsPatch {
                    insight_error: Some(e.to_string()),
                    ..Default::default()
                })
            }
        }
    }
}

struct FormatReportStep {
    progress: ProgressReporter,
}

#[async_trait]
impl Step<AnalyticsState> for FormatReportStep {
    async fn run(&self, state: &AnalyticsState) -> Result<AnalyticsPatch> {
        self.progress.report("Formatting analytics report...", 100);
        let report = AnalyticsReport {
            question: state.question.clone(),
            sql_query: state.sql_query.clone(),
            profile: state.profile.clone(),
            trends: state.trends.clone(),
            insights: state.insights.clone(),
            skipped: state.skip_reason.clone(),
            insight_error: state.insight_error.clone(),
            generated_at: Local::now(),
        };
        Ok(AnalyticsPatch {
            report: Some(report.render()),
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone)]
pub struct AnalyticsOutcome {
    pub sql: AgentOutcome,
    pub report: String,
    pub profile: Option<DataProfile>,
    pub trends: Option<TrendAnalysis>,
    pub insights: Vec<String>,
}

pub struct InsightPipeline {
    agent: SqlAgent,
    llm: Arc<dyn CompletionService>,
}

impl InsightPipeline {
    pub fn new(agent: SqlAgent, llm: Arc<dyn CompletionService>) -> Self {
        Self { agent, llm }
    }

    fn build_graph(&self, progress: ProgressReporter) -> WorkflowGraph<AnalyticsState> {
        let mut graph = WorkflowGraph::new();
        graph
            .register(
                SUMMARIZE_DATA,
                SummarizeDataStep {
                    progress: progress.clone(),
                },
            )
            .register(
                STATISTICS,
                StatisticsStep {
                    progress: progress.clone(),
                },
            )
            .register(
                TRENDS,
                TrendsStep {
                    progress: progress.clone(),
                },
            )
            .register(
                GENERATE_INSIGHTS,
                InsightsStep {
                    llm: self.llm.clone(),
                    progress: progress.clone(),
                },
            )
            .register(FORMAT_REPORT, FormatReportStep { progress })
            .set_entry(SUMMARIZE_DATA)
            .conditional_edge(SUMMARIZE_DATA, has_data, STATISTICS, FORMAT_REPORT)
            .edge(STATISTICS, TRENDS)
            .edge(TRENDS, GENERATE_INSIGHTS)
            .edge(GENERATE_INSIGHTS, FORMAT_REPORT)
            .set_terminal(FORMAT_REPORT);
        graph
    }

    pub async fn run(&self, question: &str, callback: Option<ProgressCallback>) -> Result<AnalyticsOutcome> {
        let sql = self.agent.run_as_sub_workflow(question, callback.clone()).await?;

        let state = AnalyticsState {
            question: question.trim().to_string(),
            sql_query: sql.sql_query.clone(),
            rows: sql.rows.clone(),
            sql_error: sql.error.clone(),
            ..Default::default()
        };
        let graph = self.build_graph(ProgressReporter::new(callback, ProgressMode::Standalone));
        let span = info_span!("analytics", run_id = %sql.run_id);
        let state = graph.run(state, MAX_ANALYTICS_STEPS).instrument(span).await?;

        Ok(AnalyticsOutcome {
            report: state.report.unwrap_or_default(),
            profile: state.profile,
            trends: state.trends,
            insights: state.insights,
            sql,
        })
    }
}
