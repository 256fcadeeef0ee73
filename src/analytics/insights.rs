//! Business insights from a data profile, via one completion call.

use crate::analytics::stats::DataProfile;
use crate::analytics::trends::TrendAnalysis;
use crate::error::Result;
use crate::llm::CompletionService;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::info;

/// Upper bound on insights carried into the report.
pub const MAX_INSIGHTS: usize = 8;
const MIN_INSIGHT_CHARS: usize = 20;

pub const INSIGHTS_SYSTEM_PROMPT: &str = r#"You are a senior business analyst for a partner affiliate and trading business.

Turn the statistics you are given into actionable insights for stakeholders:
- what the numbers mean for business performance
- risks or opportunities they reveal
- metrics that stand out
- concrete next steps where relevant

Write one insight per line. Each insight states the finding, cites the supporting numbers and, when useful, suggests an action. Do not add headings."#;

lazy_static! {
    static ref LIST_MARKER: Regex = Regex::new(r"^(?:[-•*]+\s*|\d+[.)]\s+)").unwrap();
    static ref HEADING: Regex = Regex::new(r"^(?:#+\s.*|\*\*[^*]+\*\*:?|.*:)$").unwrap();
}

/// Pick insight lines out of a free-form completion.
///
/// Markdown headings, bold-only lines and lines ending in a colon are dropped;
/// list markers and emphasis are stripped; short fragments are skipped.
pub fn parse_insights(response: &str) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !HEADING.is_match(line))
        .map(|line| {
            let line = LIST_MARKER.replace(line, "");
            line.replace("**", "").replace('*', "").trim().to_string()
        })
        .filter(|line| line.chars().count() >= MIN_INSIGHT_CHARS)
        .take(MAX_INSIGHTS)
        .collect()
}

pub fn insights_user_prompt(
    question: &str,
    profile: &DataProfile,
    trends: Option<&TrendAnalysis>,
) -> Result<String> {
    let trends = match trends.filter(|t| !t.is_empty()) {
        Some(trends) => serde_json::to_string_pretty(trends)?,
        None => "No trends detected.".to_string(),
    };
    Ok(format!(
        "Analyze the following data and provide business insights.\n\nOriginal question: {}\n\nStatistics:\n{}\n\nTrends:\n{}\n\nProvide 5-8 actionable insights.",
        question,
        serde_json::to_string_pretty(profile)?,
        trends
    ))
}

pub async fn generate_insights(
    llm: &dyn CompletionService,
    question: &str,
    profile: &DataProfile,
    trends: Option<&TrendAnalysis>,
) -> Result<Vec<String>> {
    let response = llm
        .complete(INSIGHTS_SYSTEM_PROMPT, &insights_user_prompt(question, profile, trends)?)
        .await?;
    let insights = parse_insights(&response);
    info!(count = insights.len(), "Generated business insights");
    Ok(insights)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_and_headings_removed() {
        let response = "## Key Findings\n\
            **Geography:**\n\
            1. Germany leads signups with 12 partners, 55% of the total.\n\
            - **France** trails at 7 partners; a targeted campaign could close the gap.\n\
            • Too short.\n\
            \n\
            * Poland has only 3 partners and may be under-served by local marketing.";
        let insights = parse_insights(response);
        assert_eq!(
            insights,
            vec![
                "Germany leads signups with 12 partners, 55% of the total.",
                "France trails at 7 partners; a targeted campaign could close the gap.",
                "Poland has only 3 partners and may be under-served by local marketing.",
            ]
        );
    }

    #[test]
    fn test_prompt_carries_trends() {
        let mut trends = TrendAnalysis::default();
        assert!(insights_user_prompt("q", &DataProfile::default(), Some(&trends))
            .unwrap()
            .contains("No trends detected."));

        trends.volume_trends.push(crate::analytics::trends::VolumeTrend {
            metric: "volume".to_string(),
            top_20_percent_avg: 30.0,
            bottom_20_percent_avg: 0.0,
            performance_gap: 30.0,
            concentration_ratio: 60.0,
        });
        let prompt = insights_user_prompt("q", &DataProfile::default(), Some(&trends)).unwrap();
        assert!(prompt.contains("\"concentration_ratio\": 60.0"));
    }

    #[test]
    fn test_capped_at_eight() {
        let response = (1..=12)
            .map(|i| format!("{}. Insight number {} about partner activation rates.", i, i))
            .collect::<Vec<_>>()
            .join("\n");
        let insights = parse_insights(&response);
        assert_eq!(insights.len(), MAX_INSIGHTS);
        assert!(insights[0].starts_with("Insight number 1 "));
    }
}
