use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Verify-Intent returned something that is not a `{is_valid, explanation, improved_prompt}` record.
    #[error("Malformed intent judgment: {reason}. Response: {response}")]
    MalformedJudgment { reason: String, response: String },

    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: Box<AgentError>,
    },

    #[error("Workflow did not reach a terminal step within {max_steps} steps")]
    ExecutorExhausted { max_steps: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    pub fn step_failed(step: impl Into<String>, cause: AgentError) -> Self {
        AgentError::StepFailed {
            step: step.into(),
            source: Box::new(cause),
        }
    }

    /// The innermost error, looking through any `StepFailed` wrappers.
    pub fn root_cause(&self) -> &AgentError {
        match self {
            AgentError::StepFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Name of the step that failed, if this error came out of the graph executor.
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            AgentError::StepFailed { step, .. } => Some(step.as_str()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
