//! Supabase RPC client
//!
//! Talks to PostgREST stored procedures:
//! `run_raw_sql` (explain text), `run_sql` (row objects) and
//! `get_schema_metadata` (catalog rows).

use crate::config::SupabaseConfig;
use crate::error::{AgentError, Result};
use crate::execution::{QueryResult, SqlExecutor};
use crate::schema_rag::metadata::{SchemaSource, TableRecord};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

pub struct SupabaseClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl SupabaseClient {
    pub fn new(url: String, api_key: String) -> Self {
        Self {
            base_url: url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::builder()
                .timeout(Duration::from_secs(300))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn from_config(config: &SupabaseConfig) -> Self {
        Self::new(config.url.clone(), config.service_role_key.clone())
    }

    async fn rpc(&self, function: &str, params: Value) -> Result<Value> {
        let response = self
            .client
            .post(format!("{}/rest/v1/rpc/{}", self.base_url, function))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&params)
            .send()
            .await
            .map_err(|e| AgentError::Execution(format!("Supabase RPC '{}' failed: {}", function, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::Execution(format!("Failed to read Supabase response: {}", e)))?;

        if !status.is_success() {
            return Err(AgentError::Execution(describe_error(status.as_u16(), &body)));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| AgentError::Execution(format!("Invalid JSON from Supabase RPC '{}': {}", function, e)))
    }
}

fn describe_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<PostgrestError>(body) {
        Ok(PostgrestError {
            message: Some(message),
            details,
            hint,
        }) => {
            let mut text = message;
            if let Some(details) = details.filter(|d| !d.is_empty()) {
                text.push_str(&format!("\nDetails: {}", details));
            }
            if let Some(hint) = hint.filter(|h| !h.is_empty()) {
                text.push_str(&format!("\nHint: {}", hint));
            }
            text
        }
        _ => format!("Supabase error ({}): {}", status, body),
    }
}

/// Flatten whatever `run_raw_sql` returned into plan text.
fn plan_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(mut row) => match row.remove("QUERY PLAN") {
                    Some(Value::String(line)) => line,
                    Some(other) => other.to_string(),
                    None => Value::Object(row).to_string(),
                },
                Value::String(line) => line,
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

#[async_trait]
impl SqlExecutor for SupabaseClient {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn explain(&self, sql: &str) -> Result<String> {
        let value = self.rpc("run_raw_sql", json!({ "raw_sql": sql })).await?;
        let text = plan_text(value);
        debug!(chars = text.len(), "Explain output received");
        Ok(text)
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();
        let value = self.rpc("run_sql", json!({ "query": sql })).await?;

        let records: Vec<serde_json::Map<String, Value>> = match value {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(row) => Ok(row),
                    other => Err(AgentError::Execution(format!("Unexpected row shape: {}", other))),
                })
                .collect::<Result<_>>()?,
            other => return Err(AgentError::Execution(format!("Unexpected run_sql response: {}", other))),
        };

        let mut result = QueryResult::from_records(&records);
        result.execution_time_ms = start.elapsed().as_millis() as u64;
        info!(rows = result.row_count(), ms = result.execution_time_ms, "Query executed");
        Ok(result)
    }
}

#[async_trait]
impl SchemaSource for SupabaseClient {
    async fn fetch_schema_metadata(&self, schemas: &[String]) -> Result<Vec<TableRecord>> {
        let value = self
            .rpc("get_schema_metadata", json!({ "p_schema_names_json": schemas }))
            .await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(value)
            .map_err(|e| AgentError::Metadata(format!("Unexpected schema metadata shape: {}", e)))
    }
}
