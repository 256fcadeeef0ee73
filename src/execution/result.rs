//! Query Result - rows returned by a SQL executor, plus the tabular rendering
//! used in the workflow's success message.

use comfy_table::presets::ASCII_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use serde::{Deserialize, Serialize};

/// Rows returned by `SqlExecutor::execute`, in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    /// Execution time in milliseconds
    #[serde(default)]
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self {
            columns,
            rows,
            execution_time_ms: 0,
        }
    }

    /// Build from JSON row objects; column order follows the first row.
    pub fn from_records(records: &[serde_json::Map<String, serde_json::Value>]) -> Self {
        let columns: Vec<String> = records
            .first()
            .map(|first| first.keys().cloned().collect())
            .unwrap_or_default();

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).cloned().unwrap_or(serde_json::Value::Null))
                    .collect()
            })
            .collect();

        Self::new(columns, rows)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column rendered as display strings.
    pub fn column_values(&self, index: usize) -> Vec<Option<String>> {
        self.rows
            .iter()
            .map(|row| match row.get(index) {
                None | Some(serde_json::Value::Null) => None,
                Some(value) => Some(cell_text(value)),
            })
            .collect()
    }

    /// Render as a boxed ASCII table with centered cells.
    ///
    /// ```text
    /// +---------+-------+
    /// | country | count |
    /// +=========+=======+
    /// |   IN    |  12   |
    /// +---------+-------+
    /// ```
    pub fn render_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(ASCII_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Disabled)
            .set_header(self.columns.iter().map(|c| centered(c.clone())));
        for row in &self.rows {
            table.add_row(row.iter().map(|v| centered(cell_text(v))));
        }
        table.to_string()
    }
}

fn centered(text: String) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Center)
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_records_keeps_column_order() {
        let records: Vec<serde_json::Map<String, serde_json::Value>> = vec![
            json!({"country": "IN", "partners": 12}).as_object().cloned().unwrap(),
            json!({"country": "BR", "partners": 7}).as_object().cloned().unwrap(),
        ];

        let result = QueryResult::from_records(&records);

        assert_eq!(result.columns, vec!["country", "partners"]);
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.rows[1], vec![json!("BR"), json!(7)]);
    }

    fn cells(line: &str) -> Vec<&str> {
        line.trim_matches('|').split('|').map(str::trim).collect()
    }

    #[test]
    fn test_render_table() {
        let result = QueryResult::new(
            vec!["country".to_string(), "count".to_string()],
            vec![vec![json!("IN"), json!(12)], vec![json!(null), json!(3)]],
        );

        let rendered = result.render_table();
        let lines: Vec<&str> = rendered.lines().collect();

        assert!(lines[0].starts_with('+'));
        assert_eq!(lines[1], "| country | count |");
        let rows: Vec<Vec<&str>> = lines
            .iter()
            .filter(|l| l.starts_with('|'))
            .skip(1)
            .map(|l| cells(l))
            .collect();
        assert_eq!(rows, vec![vec!["IN", "12"], vec!["", "3"]]);
    }

    #[test]
    fn test_column_values_skip_nulls() {
        let result = QueryResult::new(
            vec!["amount".to_string()],
            vec![vec![json!(1.5)], vec![json!(null)], vec![json!("2")]],
        );
        assert_eq!(
            result.column_values(0),
            vec![Some("1.5".to_string()), None, Some("2".to_string())]
        );
    }
}
