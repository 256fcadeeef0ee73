//! Settings
//!
//! Environment-driven configuration for the completion service, Supabase,
//! embeddings and the workflow itself. `.env` is loaded by the binary before
//! `Settings::from_env` runs.

use crate::error::{AgentError, Result};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Upper bound for the schema freshness window (one year).
pub const MAX_SCHEMA_AGE_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_role_key: String,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Executor safety bound, independent of the retry budget.
    pub max_steps: usize,
    /// Number of schema chunks handed to the generator.
    pub context_k: usize,
    /// Age after which the schema snapshot is refetched.
    pub schema_max_age_hours: i64,
    pub schema_names: Vec<String>,
    pub metadata_dir: PathBuf,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            context_k: 7,
            schema_max_age_hours: 24,
            schema_names: vec!["partner".to_string(), "client".to_string(), "gp".to_string()],
            metadata_dir: PathBuf::from("metadata"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub openai: OpenAiConfig,
    pub supabase: SupabaseConfig,
    pub embeddings: EmbeddingConfig,
    pub workflow: WorkflowConfig,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("OPENAI_API_KEY")
            .ok_or_else(|| AgentError::Config("OPENAI_API_KEY is not set".to_string()))?;
        let base_url = get("API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let openai = OpenAiConfig {
            api_key: api_key.clone(),
            base_url: base_url.clone(),
            model: get("OPENAI_MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: parse_or("OPENAI_TEMPERATURE", get("OPENAI_TEMPERATURE"), 0.0)?,
        };

        let supabase = SupabaseConfig {
            url: get("SUPABASE_URL")
                .ok_or_else(|| AgentError::Config("SUPABASE_URL is not set".to_string()))?
                .trim_end_matches('/')
                .to_string(),
            service_role_key: get("SUPABASE_SERVICE_ROLE_KEY").ok_or_else(|| {
                AgentError::Config("SUPABASE_SERVICE_ROLE_KEY is not set".to_string())
            })?,
        };

        let embeddings = EmbeddingConfig {
            api_key,
            base_url,
            model: get("EMBEDDING_MODEL_NAME").unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
        };

        let defaults = WorkflowConfig::default();
        let workflow = WorkflowConfig {
            max_steps: parse_or("SQL_AGENT_MAX_STEPS", get("SQL_AGENT_MAX_STEPS"), defaults.max_steps)?,
            context_k: parse_or("SCHEMA_CONTEXT_K", get("SCHEMA_CONTEXT_K"), defaults.context_k)?,
            schema_max_age_hours: parse_or(
                "SCHEMA_MAX_AGE_HOURS",
                get("SCHEMA_MAX_AGE_HOURS"),
                defaults.schema_max_age_hours,
            )?,
            schema_names: get("SCHEMA_NAMES")
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.schema_names),
            metadata_dir: get("METADATA_DIR").map(PathBuf::from).unwrap_or(defaults.metadata_dir),
        };

        if workflow.max_steps == 0 {
            return Err(AgentError::Config("SQL_AGENT_MAX_STEPS must be positive".to_string()));
        }
        if workflow.context_k == 0 {
            return Err(AgentError::Config("SCHEMA_CONTEXT_K must be positive".to_string()));
        }
        if !(1..=MAX_SCHEMA_AGE_HOURS).contains(&workflow.schema_max_age_hours) {
            return Err(AgentError::Config(format!(
                "SCHEMA_MAX_AGE_HOURS must be between 1 and {}",
                MAX_SCHEMA_AGE_HOURS
            )));
        }

        Ok(Self {
            openai,
            supabase,
            embeddings,
            workflow,
        })
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse::<T>()
            .map_err(|_| AgentError::Config(format!("{} has an invalid value: '{}'", key, value))),
    }
}
