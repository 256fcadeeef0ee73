//! Prompts - system instructions for the SQL generation workflow
//!
//! Generation and syntax correction are grounded in retrieved schema context;
//! intent verification asks for a JSON judgment that `judgment::parse_judgment`
//! reads back.

/// Rules every generated statement must respect.
pub const BUSINESS_RULES: &str = r#"## Mandatory Exclusions

- Never include internal records. Any table with an `is_internal` column must be
  filtered with `is_internal = FALSE` (partners, clients, trades and anything else).
- Internal and test records distort business metrics.

## Date Ranges

- A question about a period ("in March 2025") covers only that period: filter with
  `BETWEEN` the first and last day of it, e.g. `date_joined BETWEEN '2025-03-01' AND '2025-03-31'`.
- A question starting from a date ("since March 2025") uses `>=` on the start date only.
- Never use `<=` alone for a period question; that returns cumulative-to-date data.
- Partner activation means a first earning date, first client joined date or an
  equivalent activation marker falls inside the period."#;

pub const GENERATE_SQL_SYSTEM_PROMPT: &str = r#"You are an expert PostgreSQL query generator. You turn business questions into accurate, executable PostgreSQL using only the schema provided below.

## Approach

1. Work out what the user is asking for.
2. Find the schemas, tables and columns in the metadata that answer it.
3. Write one PostgreSQL statement that answers the question exactly.

## Guidelines

- Use schema-qualified table names exactly as they appear in the metadata
- Join along the listed relationships when data spans tables
- Use CTEs or window functions when they make the query clearer
- Aggregate with GROUP BY when using SUM, COUNT, AVG and similar
- Order results when an ordering is implied
- Handle NULLs explicitly

"#;

pub const VERIFY_INTENT_SYSTEM_PROMPT: &str = r#"You are a PostgreSQL query validator. Check that a generated SQL query matches the business intent of the original question.

## Process

1. Translate the SQL back into plain language describing exactly what it returns.
2. Compare that description against the original question: filters, grouping, time range and selected columns must line up exactly.

## Output

Respond with a single JSON object and nothing else:

{"is_valid": true or false, "explanation": "why the query does or does not match", "improved_prompt": "a clearer version of the question that would produce the correct query (empty when valid)"}
"#;

pub const CORRECT_SYNTAX_SYSTEM_PROMPT: &str = r#"You are a PostgreSQL query corrector. The query below failed database validation.

1. Read the database error.
2. Identify what in the query causes it.
3. Produce a corrected query that fixes every issue while keeping the same intent.

"#;

const SQL_ONLY: &str = "Return ONLY the SQL query. No explanation, no markdown, no code fences. The query must be complete and executable.";

pub fn generate_sql_system(schema_context: &str) -> String {
    format!(
        "{}{}\n\n## Database Schema\n\n{}\n\n{}",
        GENERATE_SQL_SYSTEM_PROMPT, BUSINESS_RULES, schema_context, SQL_ONLY
    )
}

pub fn verify_intent_system(prompt: &str) -> String {
    format!("{}\n## Original Question\n\n{}", VERIFY_INTENT_SYSTEM_PROMPT, prompt)
}

pub fn verify_intent_user(sql: &str) -> String {
    format!("Translate the following SQL query into natural language and judge it:\n\n{}", sql)
}

pub fn correct_syntax_system(sql: &str, error_message: &str, schema_context: &str) -> String {
    format!(
        "{}## Error Message\n\n{}\n\n## Failing Query\n\n{}\n\n## Database Schema\n\n{}\n\n{}\n\n{}",
        CORRECT_SYNTAX_SYSTEM_PROMPT, error_message, sql, schema_context, BUSINESS_RULES, SQL_ONLY
    )
}

pub fn correct_syntax_user(error_message: &str) -> String {
    format!("Correct the query so that it no longer fails with: {}", error_message)
}
