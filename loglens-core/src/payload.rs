//! The structured analysis carried by a [`Report`](crate::Report).
//!
//! Known keys are always present after parsing (defaulted when the model
//! omits them); any other keys the model returns are kept as-is.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a model answer could not be turned into an [`AnalysisPayload`].
#[derive(Error, Debug)]
pub enum PayloadError {
    /// The answer was blank.
    #[error("empty response")]
    Empty,

    /// The answer was not JSON.
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The answer was JSON but not an object.
    #[error("expected a JSON object, got {0}")]
    NotObject(&'static str),
}

/// Process flow, graph and findings for one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisPayload {
    /// Ordered steps of the observed process.
    pub process_flow: Value,
    /// Diagram nodes.
    pub nodes: Value,
    /// Diagram edges.
    pub edges: Value,
    /// Bottleneck findings.
    pub bottlenecks: Value,
    /// Optimisation advice, usually with a `suggestions` list.
    pub optimization: Value,
    /// Free-form details.
    pub details: Value,
    /// Provider-defined keys beyond the known ones.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for AnalysisPayload {
    fn default() -> Self {
        Self {
            process_flow: Value::Array(Vec::new()),
            nodes: Value::Array(Vec::new()),
            edges: Value::Array(Vec::new()),
            bottlenecks: Value::Object(Map::new()),
            optimization: Value::Object(Map::new()),
            details: Value::Object(Map::new()),
            extra: Map::new(),
        }
    }
}

impl AnalysisPayload {
    /// Parse a model answer.
    ///
    /// Surrounding whitespace and a single Markdown code fence are tolerated;
    /// anything else must be exactly one JSON object.
    ///
    /// # Errors
    /// Returns [`PayloadError`] when the text is blank, not JSON, or not an
    /// object.
    pub fn parse(text: &str) -> Result<Self, PayloadError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PayloadError::Empty);
        }

        let value: Value = serde_json::from_str(strip_code_fence(text))?;
        if !value.is_object() {
            return Err(PayloadError::NotObject(json_type_name(&value)));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Recommendations carried by the payload.
    ///
    /// A top-level `suggestions` array wins; otherwise
    /// `optimization.suggestions` is used. Non-string entries are rendered as
    /// compact JSON.
    #[must_use]
    pub fn suggestions(&self) -> Vec<String> {
        let list = self
            .extra
            .get("suggestions")
            .and_then(Value::as_array)
            .or_else(|| self.optimization.get("suggestions").and_then(Value::as_array));

        list.map(|items| {
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
    }

    /// Step names of the process flow, skipping non-string entries.
    #[must_use]
    pub fn process_flow_names(&self) -> Vec<&str> {
        self.process_flow
            .as_array()
            .map(|steps| steps.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    // Drop the info string (`json`, `JSON`, ...) on the opening line.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    body.trim()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
