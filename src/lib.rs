//! Self-correcting natural-language-to-SQL agent.
//!
//! A prompt goes through generation, intent verification, explain-only
//! validation and execution, with bounded correction loops in between. An
//! optional analytics pass turns the resulting rows into a report.

pub mod analytics;
pub mod config;
pub mod error;
pub mod execution;
pub mod llm;
pub mod logging;
pub mod schema_rag;
pub mod supabase;
pub mod workflow;

pub use config::Settings;
pub use error::{AgentError, Result};
pub use execution::{QueryResult, SqlExecutor};
pub use llm::{CompletionService, LlmClient};
pub use schema_rag::{ContextRetriever, SchemaRetriever};
pub use supabase::SupabaseClient;
pub use workflow::{AgentOptions, AgentOutcome, ProgressCallback, ProgressMode, SqlAgent};
