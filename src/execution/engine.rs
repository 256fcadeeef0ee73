//! SQL Executor Trait - the database seam consumed by the workflow
//!
//! Two modes: `explain` plans a statement without running it, `execute` runs
//! it and returns rows. The workflow never issues DDL or mutations.

use crate::error::Result;
use crate::execution::result::QueryResult;
use async_trait::async_trait;

#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Executor name (e.g., "supabase")
    fn name(&self) -> &'static str;

    /// Dry-run the statement. Returns the raw plan text, or the database's
    /// diagnostic text when planning fails; the caller classifies it.
    async fn explain(&self, sql: &str) -> Result<String>;

    /// Run the statement and return its rows.
    async fn execute(&self, sql: &str) -> Result<QueryResult>;
}
