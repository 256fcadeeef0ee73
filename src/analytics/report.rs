//! Plain-text analytics report.

use crate::analytics::stats::{ColumnStats, DataProfile};
use crate::analytics::trends::TrendAnalysis;
use chrono::{DateTime, Local};

const RULE_WIDTH: usize = 50;

#[derive(Debug, Clone)]
pub struct AnalyticsReport {
    pub question: String,
    pub sql_query: String,
    pub profile: Option<DataProfile>,
    pub trends: Option<TrendAnalysis>,
    pub insights: Vec<String>,
    /// Why the analysis did not run, when it did not.
    pub skipped: Option<String>,
    /// Insight generation failure, reported instead of insights.
    pub insight_error: Option<String>,
    pub generated_at: DateTime<Local>,
}

impl AnalyticsReport {
    pub fn render(&self) -> String {
        let mut out = vec![
            "📊 ANALYTICS REPORT".to_string(),
            "=".repeat(RULE_WIDTH),
            format!("Query: {}", self.question),
        ];
        if !self.sql_query.is_empty() {
            out.push(format!("SQL: {}", self.sql_query));
        }
        out.push(String::new());

        if let Some(reason) = &self.skipped {
            out.push(format!("⚠️ Analysis skipped: {}", reason));
            out.push(String::new());
        }

        if let Some(profile) = &self.profile {
            out.push("📈 STATISTICS".to_string());
            out.push("-".repeat(20));
            out.push(format!("Records: {}", profile.total_records));
            for column in &profile.columns {
                out.push(match &column.stats {
                    ColumnStats::Numeric(s) => format!(
                        "  • {}: sum {:.2}, mean {:.2}, median {:.2}, min {:.2}, max {:.2}, std {:.2} ({} values, {} null)",
                        column.name, s.sum, s.mean, s.median, s.min, s.max, s.std_dev, s.count, s.null_count
                    ),
                    ColumnStats::Date(s) => format!(
                        "  • {}: {} to {} ({} values, {} null)",
                        column.name,
                        s.earliest.format("%Y-%m-%d"),
                        s.latest.format("%Y-%m-%d"),
                        s.count,
                        s.null_count
                    ),
                    ColumnStats::Categorical(s) => format!(
                        "  • {}: {} unique, most frequent {} ({})",
                        column.name,
                        s.unique_values,
                        s.most_frequent.as_deref().unwrap_or("-"),
                        s.most_frequent_count
                    ),
                });
            }
            out.push(String::new());
        }

        if let Some(trends) = self.trends.as_ref().filter(|t| !t.is_empty()) {
            out.push("🔍 TRENDS".to_string());
            out.push("-".repeat(20));
            for t in &trends.temporal_trends {
                out.push(format!(
                    "  • {} over {}: {:+.1}% recent vs historical ({} trend), avg change {:+.1}% per period",
                    t.metric,
                    t.time_column,
                    t.recent_vs_historical_change,
                    t.strength.label(),
                    t.average_period_change * 100.0
                ));
            }
            for v in &trends.volume_trends {
                out.push(format!(
                    "  • {}: top 20% average {:.2}, bottom 20% average {:.2}, top 20% hold {:.1}% of total",
                    v.metric, v.top_20_percent_avg, v.bottom_20_percent_avg, v.concentration_ratio
                ));
            }
            for c in &trends.comparative_trends {
                let ratio = c
                    .performance_ratio
                    .map(|r| format!("{:.2}x", r))
                    .unwrap_or_else(|| "n/a".to_string());
                out.push(format!(
                    "  • {} by {}: best {} (avg {:.2}), worst {} (avg {:.2}), ratio {}",
                    c.metric_column,
                    c.category_column,
                    c.best_performer.category,
                    c.best_performer.average,
                    c.worst_performer.category,
                    c.worst_performer.average,
                    ratio
                ));
            }
            out.push(String::new());
        }

        if let Some(error) = &self.insight_error {
            out.push(format!("⚠️ Insights unavailable: {}", error));
            out.push(String::new());
        } else if !self.insights.is_empty() {
            out.push("💡 BUSINESS INSIGHTS".to_string());
            out.push("-".repeat(22));
            for (i, insight) in self.insights.iter().enumerate() {
                out.push(format!("{}. {}", i + 1, insight));
            }
            out.push(String::new());
        }

        out.push("=".repeat(RULE_WIDTH));
        out.push(format!(
            "Report generated at: {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        ));
        out.join("\n")
    }
}
