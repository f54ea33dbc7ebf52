//! Error types for the LogLens core library.

use thiserror::Error;

/// Reasons an analysis request is rejected outright.
///
/// Provider failures never appear here; they are absorbed into a fallback
/// [`Report`](crate::Report).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestrationError {
    /// The input contained no files.
    #[error("no input")]
    NoInput,

    /// A file decoded to empty content.
    #[error("file '{name}' has no content")]
    EmptyContent {
        /// Name of the offending file.
        name: String,
    },

    /// The caller cancelled the analysis.
    #[error("analysis cancelled")]
    Cancelled,
}

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML did not match the expected layout.
    #[error("Configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range or inconsistent.
    #[error("Configuration error: {0}")]
    Invalid(String),

    /// The configured prompt file could not be loaded.
    #[error(transparent)]
    Prompt(#[from] loglens_llm::prompt::PromptError),

    /// The environment variable holding the API key is unset.
    #[error("API key environment variable '{0}' is not set")]
    MissingApiKey(String),
}
