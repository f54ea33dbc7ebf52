//! Core data types: analysis input and the report handed back to callers.

use chrono::{DateTime, Utc};
use loglens_llm::ErrorKind;
use serde::Serialize;

use crate::error::OrchestrationError;
use crate::payload::AnalysisPayload;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One uploaded log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// Original file name, as uploaded.
    pub name: String,
    /// Decoded text content.
    pub content: String,
}

impl InputFile {
    /// Create a file from already-decoded text.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Create a file from raw bytes, replacing invalid UTF-8 sequences.
    #[must_use]
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(name, String::from_utf8_lossy(bytes))
    }
}

/// The ordered set of files submitted for one analysis.
///
/// Order is upload order and is preserved in every report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisInput {
    files: Vec<InputFile>,
}

impl AnalysisInput {
    /// Wrap `files`, keeping their order.
    #[must_use]
    pub fn new(files: Vec<InputFile>) -> Self {
        Self { files }
    }

    /// The files, in upload order.
    #[must_use]
    pub fn files(&self) -> &[InputFile] {
        &self.files
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no files were submitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// File names, in upload order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.name.as_str())
    }

    /// Check the input can be analysed at all.
    ///
    /// # Errors
    /// [`OrchestrationError::NoInput`] for an empty batch,
    /// [`OrchestrationError::EmptyContent`] for the first file without content.
    pub fn validate(&self) -> Result<(), OrchestrationError> {
        if self.files.is_empty() {
            return Err(OrchestrationError::NoInput);
        }
        if let Some(empty) = self.files.iter().find(|f| f.content.is_empty()) {
            return Err(OrchestrationError::EmptyContent {
                name: empty.name.clone(),
            });
        }
        Ok(())
    }
}

impl From<Vec<InputFile>> for AnalysisInput {
    fn from(files: Vec<InputFile>) -> Self {
        Self::new(files)
    }
}

impl FromIterator<InputFile> for AnalysisInput {
    fn from_iter<I: IntoIterator<Item = InputFile>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Which path produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    /// Parsed from the language model's answer.
    Llm,
    /// Synthesised locally without a model.
    Fallback,
}

/// Why a report was produced in fallback mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DegradationReason {
    /// No live provider; the model was never called.
    #[serde(rename = "provider unavailable")]
    ProviderUnavailable,
    /// Every attempt failed.
    #[serde(rename = "retries exhausted")]
    RetriesExhausted,
    /// The model answered with something that is not an analysis object.
    #[serde(rename = "unparseable response")]
    UnparseableResponse,
}

impl std::fmt::Display for DegradationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ProviderUnavailable => "provider unavailable",
            Self::RetriesExhausted => "retries exhausted",
            Self::UnparseableResponse => "unparseable response",
        })
    }
}

/// Details attached to a fallback report explaining the degradation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    /// Why the model's answer was not used.
    pub reason: DegradationReason,
    /// Message of the last provider or parse failure.
    pub last_error: Option<String>,
    /// Classification of the last provider failure.
    pub error_kind: Option<ErrorKind>,
    /// Provider calls made for this analysis.
    pub attempts: u32,
    /// When the degradation was decided.
    pub timestamp: DateTime<Utc>,
}

/// The outcome of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// `llm` or `fallback`.
    pub mode: ReportMode,
    /// Process flow, graph and findings.
    pub analysis: AnalysisPayload,
    /// Human-readable recommendations.
    pub suggestions: Vec<String>,
    /// Present on degraded reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

impl Report {
    /// A report built from a parsed model answer.
    #[must_use]
    pub fn from_llm(analysis: AnalysisPayload) -> Self {
        let suggestions = analysis.suggestions();
        Self {
            mode: ReportMode::Llm,
            analysis,
            suggestions,
            diagnostics: None,
        }
    }

    /// Attach degradation details.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Whether the model's answer was used.
    #[must_use]
    pub fn is_llm(&self) -> bool {
        self.mode == ReportMode::Llm
    }
}
