//! Text transforms applied to completion output before it is treated as SQL.

/// Remove markdown code fences around a completion.
///
/// Strips a leading "```sql" (or bare "```") and a trailing "```", trimming
/// whitespace, until nothing changes. Idempotent.
pub fn strip_markdown(text: &str) -> String {
    let mut current = text.trim();
    loop {
        let mut next = current;
        if let Some(rest) = next.strip_prefix("```sql") {
            next = rest;
        } else if let Some(rest) = next.strip_prefix("```") {
            next = rest;
        }
        if let Some(rest) = next.strip_suffix("```") {
            next = rest;
        }
        let next = next.trim();
        if next == current {
            return next.to_string();
        }
        current = next;
    }
}

/// Drop trailing semicolons before handing a statement to the executor.
pub fn normalize_for_execution(sql: &str) -> &str {
    sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}
