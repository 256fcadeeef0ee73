//! Structured intent judgment returned by the Verify-Intent completion.

use crate::error::{AgentError, Result};
use crate::workflow::sql_text::strip_markdown;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentJudgment {
    pub is_valid: bool,
    pub explanation: String,
    pub improved_prompt: String,
}

/// Parse `{is_valid, explanation, improved_prompt}` from a completion.
///
/// A ```json fence around the object is accepted. `is_valid` may be a boolean
/// or the strings "true"/"false". Anything else is `MalformedJudgment`.
pub fn parse_judgment(response: &str) -> Result<IntentJudgment> {
    let body = strip_markdown(response);
    let body = body.strip_prefix("json").map(str::trim).unwrap_or(body.as_str());

    let malformed = |reason: String| AgentError::MalformedJudgment {
        reason,
        response: response.to_string(),
    };

    let value: Value = serde_json::from_str(body).map_err(|e| malformed(format!("not valid JSON: {}", e)))?;
    let object = value
        .as_object()
        .ok_or_else(|| malformed("expected a JSON object".to_string()))?;

    let is_valid = match object.get("is_valid") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => true,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => false,
        Some(other) => return Err(malformed(format!("`is_valid` is not a boolean: {}", other))),
        None => return Err(malformed("missing field `is_valid`".to_string())),
    };

    let text_field = |name: &str| -> Result<String> {
        match object.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(malformed(format!("`{}` is not a string: {}", name, other))),
            None => Err(malformed(format!("missing field `{}`", name))),
        }
    };

    Ok(IntentJudgment {
        is_valid,
        explanation: text_field("explanation")?,
        improved_prompt: text_field("improved_prompt")?,
    })
}
