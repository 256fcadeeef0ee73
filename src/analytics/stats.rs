//! Column statistics over a query result.

use crate::execution::QueryResult;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::HashMap;

/// Number of distinct values kept in a categorical distribution.
const TOP_VALUES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericStats {
    pub count: usize,
    pub null_count: usize,
    pub sum: f64,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; 0 for a single value.
    pub std_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalStats {
    pub unique_values: usize,
    pub most_frequent: Option<String>,
    pub most_frequent_count: usize,
    /// Most common values first.
    pub distribution: Vec<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateStats {
    pub count: usize,
    pub null_count: usize,
    pub earliest: NaiveDateTime,
    pub latest: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnStats {
    Numeric(NumericStats),
    Date(DateStats),
    Categorical(CategoricalStats),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub stats: ColumnStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataProfile {
    pub total_records: usize,
    pub numeric_columns: Vec<String>,
    pub date_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub columns: Vec<ColumnProfile>,
}

impl DataProfile {
    pub fn column(&self, name: &str) -> Option<&ColumnStats> {
        self.columns.iter().find(|c| c.name == name).map(|c| &c.stats)
    }
}

/// Identifier-like names are always treated as categories.
pub fn is_identifier(column: &str) -> bool {
    let lower = column.to_lowercase();
    lower.contains("_id") || lower.contains("id_") || lower.starts_with("id") || lower.ends_with("id")
}

pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
];
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%b-%Y"];

/// Parse the timestamp and date shapes Postgres and spreadsheets commonly
/// emit. Month buckets like `2024-03` count as the first of the month.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.naive_utc());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
    {
        return Some(dt);
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
        .or_else(|| NaiveDate::parse_from_str(&format!("{}-01", text), "%Y-%m-%d").ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn profile(result: &QueryResult) -> DataProfile {
    let mut profile = DataProfile {
        total_records: result.row_count(),
        ..Default::default()
    };

    for (index, name) in result.columns.iter().enumerate() {
        let values = result.column_values(index);

        let numbers: Vec<f64> = values.iter().flatten().filter_map(|v| parse_number(v)).collect();
        let numeric = !is_identifier(name) && numbers.len() * 2 > values.len();

        let dates: Vec<NaiveDateTime> = if numeric || is_identifier(name) {
            Vec::new()
        } else {
            values.iter().flatten().filter_map(|v| parse_timestamp(v)).collect()
        };
        let temporal = !dates.is_empty() && dates.len() * 2 > values.len();

        let stats = if numeric {
            profile.numeric_columns.push(name.clone());
            let null_count = values.len() - numbers.len();
            match numeric_stats(numbers, null_count) {
                Some(stats) => ColumnStats::Numeric(stats),
                None => continue,
            }
        } else if temporal {
            profile.date_columns.push(name.clone());
            let null_count = values.len() - dates.len();
            match date_stats(dates, null_count) {
                Some(stats) => ColumnStats::Date(stats),
                None => continue,
            }
        } else {
            profile.categorical_columns.push(name.clone());
            match categorical_stats(values.into_iter().flatten()) {
                Some(stats) => ColumnStats::Categorical(stats),
                None => continue,
            }
        };
        profile.columns.push(ColumnProfile {
            name: name.clone(),
            stats,
        });
    }
    profile
}

fn numeric_stats(mut values: Vec<f64>, null_count: usize) -> Option<NumericStats> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let count = values.len();
    let sum: f64 = values.iter().sum();
    let mean = sum / count as f64;
    let median = if count % 2 == 0 {
        (values[count / 2 - 1] + values[count / 2]) / 2.0
    } else {
        values[count / 2]
    };
    let std_dev = if count > 1 {
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        variance.sqrt()
    } else {
        0.0
    };

    Some(NumericStats {
        count,
        null_count,
        sum,
        mean,
        median,
        min: values[0],
        max: values[count - 1],
        std_dev,
    })
}

fn date_stats(dates: Vec<NaiveDateTime>, null_count: usize) -> Option<DateStats> {
    Some(DateStats {
        count: dates.len(),
        null_count,
        earliest: *dates.iter().min()?,
        latest: *dates.iter().max()?,
    })
}

fn categorical_stats(values: impl Iterator<Item = String>) -> Option<CategoricalStats> {
    // value -> (count, first position)
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (position, value) in values.enumerate() {
        counts.entry(value).or_insert((0, position)).0 += 1;
    }
    if counts.is_empty() {
        return None;
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(value, (count, first))| (value, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    let unique_values = ranked.len();
    let (most_frequent, most_frequent_count) = (Some(ranked[0].0.clone()), ranked[0].1);
    let distribution = ranked
        .into_iter()
        .take(TOP_VALUES)
        .map(|(value, count, _)| (value, count))
        .collect();

    Some(CategoricalStats {
        unique_values,
        most_frequent,
        most_frequent_count,
        distribution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn result(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryResult {
        QueryResult::new(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    #[test]
    fn test_identifier_detection() {
        assert!(is_identifier("partner_id"));
        assert!(is_identifier("id"));
        assert!(is_identifier("ID_NUMBER"));
        assert!(!is_identifier("country"));
        assert!(!is_identifier("signups"));
    }

    #[test]
    fn test_numeric_column_stats() {
        let data = result(
            &["country", "signups"],
            vec![
                vec![json!("DE"), json!(10)],
                vec![json!("FR"), json!(4)],
                vec![json!("DE"), json!("6")],
                vec![json!("PL"), Value::Null],
            ],
        );
        let profile = profile(&data);

        assert_eq!(profile.total_records, 4);
        assert_eq!(profile.numeric_columns, vec!["signups"]);
        assert_eq!(profile.categorical_columns, vec!["country"]);

        let Some(ColumnStats::Numeric(stats)) = profile.column("signups") else {
            panic!("signups should be numeric");
        };
        assert_eq!(stats.count, 3);
        assert_eq!(stats.null_count, 1);
        assert_eq!(stats.sum, 20.0);
        assert_eq!(stats.median, 6.0);
        assert_eq!(stats.min, 4.0);
        assert_eq!(stats.max, 10.0);
        assert!((stats.std_dev - 3.0551).abs() < 1e-3);
    }

    #[test]
    fn test_identifier_numbers_stay_categorical() {
        let data = result(
            &["partner_id"],
            vec![vec![json!(101)], vec![json!(102)], vec![json!(101)]],
        );
        let profile = profile(&data);

        assert!(profile.numeric_columns.is_empty());
        let Some(ColumnStats::Categorical(stats)) = profile.column("partner_id") else {
            panic!("partner_id should be categorical");
        };
        assert_eq!(stats.unique_values, 2);
        assert_eq!(stats.most_frequent.as_deref(), Some("101"));
        assert_eq!(stats.most_frequent_count, 2);
    }

    #[test]
    fn test_distribution_capped_and_ordered() {
        let rows = (0..15)
            .map(|i| vec![json!(format!("c{}", i))])
            .chain(std::iter::once(vec![json!("c7")]))
            .collect();
        let profile = profile(&result(&["country"], rows));
        let Some(ColumnStats::Categorical(stats)) = profile.column("country") else {
            panic!("country should be categorical");
        };
        assert_eq!(stats.unique_values, 15);
        assert_eq!(stats.distribution.len(), 10);
        assert_eq!(stats.distribution[0], ("c7".to_string(), 2));
        assert_eq!(stats.distribution[1], ("c0".to_string(), 1));
    }

    #[test]
    fn test_timestamp_shapes() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        for text in ["2024-03-01", "2024-03", "2024-03-01 00:00:00", "2024-03-01T00:00:00Z", "2024-03-01 00:00:00+00"] {
            assert_eq!(parse_timestamp(text), Some(expected), "{}", text);
        }
        assert_eq!(parse_timestamp("DE"), None);
        assert_eq!(parse_timestamp("12"), None);
    }

    #[test]
    fn test_date_column_detected() {
        let data = result(
            &["month", "signups"],
            vec![
                vec![json!("2024-01-01"), json!(10)],
                vec![json!("2024-02-01"), json!(12)],
                vec![json!("not a date"), json!(9)],
            ],
        );
        let profile = profile(&data);

        assert_eq!(profile.date_columns, vec!["month"]);
        assert!(profile.categorical_columns.is_empty());
        let Some(ColumnStats::Date(stats)) = profile.column("month") else {
            panic!("month should be a date column");
        };
        assert_eq!(stats.count, 2);
        assert_eq!(stats.null_count, 1);
        assert_eq!(stats.latest.date(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn test_all_null_column_is_listed_without_stats() {
        let profile = profile(&result(&["note"], vec![vec![Value::Null], vec![Value::Null]]));
        assert_eq!(profile.categorical_columns, vec!["note"]);
        assert!(profile.column("note").is_none());
    }
}
