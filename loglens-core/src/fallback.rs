//! LLM-free analysis used whenever the model's answer is unavailable.
//!
//! The output depends only on the file names and their order, so the same
//! input always yields the same report.

use serde_json::{Value, json};

use crate::payload::AnalysisPayload;
use crate::types::{AnalysisInput, Report, ReportMode};

/// Message placed in `bottlenecks.message` of every fallback report.
pub const BASIC_MODE_MESSAGE: &str = "Basic analysis mode - LLM analysis not available";

/// The single suggestion of every fallback report.
pub const ENABLE_LLM_SUGGESTION: &str = "Enable LLM for detailed analysis";

/// Build a basic report from the file names alone.
///
/// One node per file, edges linking consecutive files, no bottlenecks.
/// No diagnostics are attached; the orchestrator adds them when it degrades.
#[must_use]
pub fn analyze_basic(input: &AnalysisInput) -> Report {
    let names: Vec<&str> = input.names().collect();

    let nodes: Vec<Value> = names
        .iter()
        .enumerate()
        .map(|(i, name)| json!({ "id": i.to_string(), "label": name, "type": "file" }))
        .collect();

    let edges: Vec<Value> = (1..names.len())
        .map(|i| {
            json!({
                "id": format!("e{}", i - 1),
                "source": (i - 1).to_string(),
                "target": i.to_string(),
            })
        })
        .collect();

    let analysis = AnalysisPayload {
        process_flow: json!(names),
        nodes: Value::Array(nodes),
        edges: Value::Array(edges),
        bottlenecks: json!({ "identified": false, "message": BASIC_MODE_MESSAGE }),
        optimization: json!({ "suggestions": [ENABLE_LLM_SUGGESTION] }),
        details: json!({ "filesAnalyzed": names, "mode": "basic" }),
        extra: serde_json::Map::new(),
    };

    Report {
        mode: ReportMode::Fallback,
        analysis,
        suggestions: vec![ENABLE_LLM_SUGGESTION.to_string()],
        diagnostics: None,
    }
}
