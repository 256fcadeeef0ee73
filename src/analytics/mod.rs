//! Secondary analytics pass over the rows returned by the SQL workflow.

pub mod insights;
pub mod pipeline;
pub mod report;
pub mod stats;
pub mod trends;

pub use insights::{generate_insights, parse_insights, MAX_INSIGHTS};
pub use pipeline::{AnalyticsOutcome, AnalyticsState, InsightPipeline};
pub use report::AnalyticsReport;
pub use stats::{profile, ColumnStats, DataProfile};
pub use trends::{analyze_trends, TrendAnalysis};
