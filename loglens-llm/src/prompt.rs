//! Prompt templates for log analysis.
//!
//! The built-in template is compiled in; a versioned TOML file can replace it
//! at startup (see `prompts/analysis.toml`).

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// System prompt for process-flow and bottleneck analysis.
pub const ANALYSIS_SYSTEM: &str = r"Analyze the following files and create a process flow diagram.
Identify integration patterns, data flows, and potential bottlenecks.

RULES:
- Base every finding on the file contents. Do not invent components.
- Keep node labels short; they are rendered in a diagram.
- Your response must be a single valid JSON object and nothing else.";

/// User prompt; `{files}` receives the formatted file contents.
pub const ANALYSIS_USER: &str = r#"{files}

Return JSON:
{{"processFlow": ["step", ...], "nodes": [{{"id": "0", "label": "name", "type": "service"}}, ...], "edges": [{{"id": "e0", "source": "0", "target": "1"}}, ...], "bottlenecks": {{"identified": <bool>, "items": [{{"location": "...", "impact": "...", "evidence": "..."}}]}}, "optimization": {{"suggestions": ["...", ...]}}, "details": {{}}}}"#;

/// Simple template interpolation for prompts.
///
/// Replaces `{key}` with the corresponding value in a single pass, so values
/// are inserted verbatim. Doubled braces (`{{`, `}}`) render as literal braces;
/// unknown placeholders are left untouched.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after) = tail.strip_prefix("{{") {
            out.push('{');
            rest = after;
            continue;
        }
        if let Some(after) = tail.strip_prefix("}}") {
            out.push('}');
            rest = after;
            continue;
        }
        if tail.starts_with('{') {
            if let Some(end) = tail.find('}') {
                let key = &tail[1..end];
                if let Some((_, value)) = vars.iter().find(|(k, _)| *k == key) {
                    out.push_str(value);
                    rest = &tail[end + 1..];
                    continue;
                }
            }
        }
        out.push_str(&tail[..1]);
        rest = &tail[1..];
    }

    out.push_str(rest);
    out
}

/// Format uploaded files as one prompt section per file.
#[must_use]
pub fn format_files<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    files
        .into_iter()
        .map(|(name, content)| format!("File: {name}\n\n{content}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Errors loading a prompt template from disk.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to read prompt file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse prompt file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Inner `[prompt]` section of a TOML prompt file.
#[derive(Debug, Clone, Deserialize)]
struct TomlPromptFile {
    prompt: PromptTemplate,
}

/// A loaded, ready-to-render prompt template.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PromptTemplate {
    /// Prompt version string (e.g., "1.0").
    pub version: String,
    /// Maximum output tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// System prompt template.
    pub system: String,
    /// User prompt template (contains `{files}`).
    pub user: String,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptTemplate {
    /// The compiled-in analysis template.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            version: "builtin".into(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system: ANALYSIS_SYSTEM.into(),
            user: ANALYSIS_USER.into(),
        }
    }

    /// Parse a template from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or lacks a `[prompt]` section.
    pub fn from_toml(content: &str) -> Result<Self, PromptError> {
        let parsed: TomlPromptFile = toml::from_str(content)?;
        Ok(parsed.prompt)
    }

    /// Load a template from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PromptError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PromptError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Render `(system_prompt, user_prompt)` for the given files section.
    #[must_use]
    pub fn render(&self, files: &str) -> (String, String) {
        let vars = [("files", files)];
        (
            render_template(&self.system, &vars),
            render_template(&self.user, &vars),
        )
    }
}
