//! Trend analysis over a profiled query result.
//!
//! Three views, all derived from the column classification in `DataProfile`:
//! temporal (metric over a date column), volume (top vs bottom 20% of a
//! metric) and comparative (best and worst category per metric).

use crate::analytics::stats::{parse_number, parse_timestamp, DataProfile};
use crate::execution::QueryResult;
use chrono::NaiveDateTime;
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;

/// Minimum dated points before a recent-vs-historical comparison is made.
const MIN_TEMPORAL_POINTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendStrength {
    High,
    Medium,
    Low,
}

impl TrendStrength {
    fn from_change(change_pct: f64) -> Self {
        match change_pct.abs() {
            c if c > 20.0 => TrendStrength::High,
            c if c > 10.0 => TrendStrength::Medium,
            _ => TrendStrength::Low,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrendStrength::High => "high",
            TrendStrength::Medium => "medium",
            TrendStrength::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalTrend {
    pub metric: String,
    pub time_column: String,
    /// Mean period-over-period change, as a fraction.
    pub average_period_change: f64,
    /// Standard deviation of the period-over-period changes.
    pub volatility: f64,
    /// Second half vs first half of the series, in percent.
    pub recent_vs_historical_change: f64,
    pub strength: TrendStrength,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeTrend {
    pub metric: String,
    pub top_20_percent_avg: f64,
    pub bottom_20_percent_avg: f64,
    pub performance_gap: f64,
    /// Share of the total held by the top 20%, in percent.
    pub concentration_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryPerformance {
    pub category: String,
    pub average: f64,
    pub total: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparativeTrend {
    pub category_column: String,
    pub metric_column: String,
    pub best_performer: CategoryPerformance,
    pub worst_performer: CategoryPerformance,
    /// Best average over worst average; `None` when the worst average is zero.
    pub performance_ratio: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendAnalysis {
    pub temporal_trends: Vec<TemporalTrend>,
    pub volume_trends: Vec<VolumeTrend>,
    pub comparative_trends: Vec<ComparativeTrend>,
}

impl TrendAnalysis {
    pub fn is_empty(&self) -> bool {
        self.temporal_trends.is_empty() && self.volume_trends.is_empty() && self.comparative_trends.is_empty()
    }
}

fn column_index(result: &QueryResult, name: &str) -> Option<usize> {
    result.columns.iter().position(|c| c == name)
}

fn numbers(result: &QueryResult, index: usize) -> Vec<Option<f64>> {
    result
        .column_values(index)
        .into_iter()
        .map(|v| v.as_deref().and_then(parse_number))
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

pub fn analyze_trends(result: &QueryResult, profile: &DataProfile) -> TrendAnalysis {
    let metrics: Vec<(&String, Vec<Option<f64>>)> = profile
        .numeric_columns
        .iter()
        .filter_map(|name| column_index(result, name).map(|i| (name, numbers(result, i))))
        .collect();

    let mut analysis = TrendAnalysis::default();

    for date_column in &profile.date_columns {
        let Some(index) = column_index(result, date_column) else {
            continue;
        };
        let dates: Vec<Option<NaiveDateTime>> = result
            .column_values(index)
            .into_iter()
            .map(|v| v.as_deref().and_then(parse_timestamp))
            .collect();
        for (metric, values) in &metrics {
            if let Some(trend) = temporal_trend(date_column, metric, &dates, values) {
                analysis.temporal_trends.push(trend);
            }
        }
    }

    for (metric, values) in &metrics {
        if let Some(trend) = volume_trend(metric, values) {
            analysis.volume_trends.push(trend);
        }
    }

    for category_column in &profile.categorical_columns {
        let Some(index) = column_index(result, category_column) else {
            continue;
        };
        let categories = result.column_values(index);
        for (metric, values) in &metrics {
            if let Some(trend) = comparative_trend(category_column, metric, &categories, values) {
                analysis.comparative_trends.push(trend);
            }
        }
    }

    analysis
}

fn temporal_trend(
    time_column: &str,
    metric: &str,
    dates: &[Option<NaiveDateTime>],
    values: &[Option<f64>],
) -> Option<TemporalTrend> {
    let series: Vec<f64> = dates
        .iter()
        .zip(values)
        .filter_map(|(d, v)| Some(((*d)?, (*v)?)))
        .sorted_by_key(|(d, _)| *d)
        .map(|(_, v)| v)
        .collect();
    if series.len() < MIN_TEMPORAL_POINTS {
        return None;
    }

    // Steps from zero have no defined relative change.
    let changes: Vec<f64> = series
        .iter()
        .tuple_windows()
        .filter(|(prev, _)| **prev != 0.0)
        .map(|(prev, next)| (next - prev) / prev)
        .collect();

    let mid = series.len() / 2;
    let historical = mean(&series[..mid])?;
    let recent = mean(&series[mid..])?;
    let change_pct = if historical != 0.0 {
        (recent - historical) / historical * 100.0
    } else {
        0.0
    };

    Some(TemporalTrend {
        metric: metric.to_string(),
        time_column: time_column.to_string(),
        average_period_change: mean(&changes).unwrap_or(0.0),
        volatility: sample_std(&changes).unwrap_or(0.0),
        recent_vs_historical_change: change_pct,
        strength: TrendStrength::from_change(change_pct),
    })
}

fn volume_trend(metric: &str, values: &[Option<f64>]) -> Option<VolumeTrend> {
    let sorted: Vec<f64> = values
        .iter()
        .flatten()
        .copied()
        .sorted_by(|a, b| b.total_cmp(a))
        .collect();
    let band = (sorted.len() / 5).max(1);
    let top = sorted.get(..band)?;
    let bottom = sorted.get(sorted.len().checked_sub(band)?..)?;

    let total: f64 = sorted.iter().sum();
    let top_avg = mean(top)?;
    let bottom_avg = mean(bottom)?;

    Some(VolumeTrend {
        metric: metric.to_string(),
        top_20_percent_avg: top_avg,
        bottom_20_percent_avg: bottom_avg,
        performance_gap: top_avg - bottom_avg,
        concentration_ratio: if total != 0.0 {
            top.iter().sum::<f64>() / total * 100.0
        } else {
            0.0
        },
    })
}

fn comparative_trend(
    category_column: &str,
    metric: &str,
    categories: &[Option<String>],
    values: &[Option<f64>],
) -> Option<ComparativeTrend> {
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for (category, value) in categories.iter().zip(values) {
        if let (Some(category), Some(value)) = (category, value) {
            groups.entry(category.as_str()).or_default().push(*value);
        }
    }
    if groups.len() < 2 {
        return None;
    }

    let performances: Vec<CategoryPerformance> = groups
        .into_iter()
        .filter_map(|(category, values)| {
            Some(CategoryPerformance {
                category: category.to_string(),
                average: mean(&values)?,
                total: values.iter().sum(),
                count: values.len(),
            })
        })
        .collect();

    // First occurrence wins on ties, in category order.
    let best = performances
        .iter()
        .rev()
        .max_by(|a, b| a.average.total_cmp(&b.average))?
        .clone();
    let worst = performances
        .iter()
        .min_by(|a, b| a.average.total_cmp(&b.average))?
        .clone();

    Some(ComparativeTrend {
        category_column: category_column.to_string(),
        metric_column: metric.to_string(),
        performance_ratio: (worst.average != 0.0).then(|| best.average / worst.average),
        best_performer: best,
        worst_performer: worst,
    })
}
