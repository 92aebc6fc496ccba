//! Output format inference.
//!
//! JSON parsing is attempted only on the success path: a failed or timed-out
//! run is always opaque text, even when its stdout happens to be valid JSON.

use serde::Serialize;
use serde_json::Value;

use crate::executor::ExecutionResult;

/// Inferred output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Stdout parsed as a JSON document.
    Json,
    /// Anything else.
    Text,
}

impl OutputFormat {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

/// Stdout classified as structured or opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedOutput {
    /// Stdout exactly as captured.
    pub raw_text: String,
    /// Parsed document when `format` is [`OutputFormat::Json`].
    pub structured: Option<Value>,
    /// Inferred format.
    pub format: OutputFormat,
}

impl NormalizedOutput {
    fn text(raw: &str) -> Self {
        Self {
            raw_text: raw.to_string(),
            structured: None,
            format: OutputFormat::Text,
        }
    }

    /// Structured payload worth rendering instead of the raw text.
    ///
    /// Empty or falsy documents (`null`, `false`, `0`, `""`, `[]`, `{}`)
    /// render as raw stdout.
    pub fn displayable(&self) -> Option<&Value> {
        self.structured.as_ref().filter(|v| is_truthy(v))
    }
}

/// Classify a run's stdout. Stderr is left untouched on the result.
pub fn normalize(result: &ExecutionResult) -> NormalizedOutput {
    if !result.success() {
        return NormalizedOutput::text(&result.stdout);
    }
    match serde_json::from_str::<Value>(&result.stdout) {
        Ok(parsed) => NormalizedOutput {
            raw_text: result.stdout.clone(),
            structured: Some(parsed),
            format: OutputFormat::Json,
        },
        Err(_) => NormalizedOutput::text(&result.stdout),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
