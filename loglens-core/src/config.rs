//! Configuration for LogLens.
//!
//! Maps directly to `loglens.toml`. Every field has a default, so an empty
//! file is a valid configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use loglens_llm::prompt::PromptTemplate;
use loglens_llm::{Capability, HttpInferenceClient, InferenceClient, Provider};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;

/// Upper bound on `orchestrator.max_retries`; 2^10 seconds of backoff is
/// already far beyond any request deadline.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Top-level LogLens configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoglensConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Inference provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Retry and prompt settings.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

impl LoglensConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check values are in range.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.general.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "general.log_level must be one of {LEVELS:?}, got '{}'",
                self.general.log_level
            )));
        }
        if self.llm.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "llm.request_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.llm.max_tokens == 0 {
            return Err(ConfigError::Invalid("llm.max_tokens must be greater than 0".into()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid(
                "llm.max_concurrent_requests must be at least 1".into(),
            ));
        }
        if self.orchestrator.base_backoff_ms == 0 {
            return Err(ConfigError::Invalid(
                "orchestrator.base_backoff_ms must be greater than 0".into(),
            ));
        }
        if self.orchestrator.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "orchestrator.max_retries must be at most {MAX_RETRIES_LIMIT}, got {}",
                self.orchestrator.max_retries
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Which inference backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Local Ollama server.
    #[default]
    Ollama,
    /// OpenAI-compatible hosted API.
    Openai,
    /// llama.cpp server hosting a local GGUF model.
    LlamaCpp,
    /// No provider; every report uses the fallback analysis.
    None,
}

impl ProviderKind {
    /// Base URL used when `llm.base_url` is unset.
    #[must_use]
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::Openai => "https://api.openai.com",
            Self::LlamaCpp => "http://127.0.0.1:8080",
            Self::None => "",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ollama => "ollama",
            Self::Openai => "openai",
            Self::LlamaCpp => "llama_cpp",
            Self::None => "none",
        })
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::Openai),
            "llama_cpp" | "llama-cpp" | "llamacpp" => Ok(Self::LlamaCpp),
            "none" => Ok(Self::None),
            other => Err(ConfigError::Invalid(format!(
                "unknown provider '{other}' (expected ollama, openai, llama_cpp or none)"
            ))),
        }
    }
}

/// Inference provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Backend: ollama, openai, llama_cpp, none.
    #[serde(default)]
    pub provider: ProviderKind,
    /// Server URL; the backend's usual address when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model name sent to the server.
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the OpenAI API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// GGUF file served by llama.cpp; checked at startup.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// Per-call timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Maximum output tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Concurrent calls for providers that allow them.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Send a test prompt at startup before trusting the provider.
    #[serde(default = "default_true")]
    pub probe_on_startup: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: None,
            model: default_model(),
            api_key_env: default_api_key_env(),
            model_path: default_model_path(),
            request_timeout_ms: default_request_timeout_ms(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_concurrent_requests: default_max_concurrent_requests(),
            probe_on_startup: true,
        }
    }
}

impl LlmConfig {
    /// The configured base URL, or the backend's default.
    #[must_use]
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }

    /// Build the configured client, or `None` when the provider is `none`.
    ///
    /// # Errors
    /// `ConfigError::MissingApiKey` when the OpenAI key variable is unset.
    pub fn client(&self) -> Result<Option<Arc<dyn InferenceClient>>, ConfigError> {
        let base_url = self.effective_base_url();
        let provider = match self.provider {
            ProviderKind::None => return Ok(None),
            ProviderKind::Ollama => Provider::Ollama { base_url },
            ProviderKind::Openai => {
                let api_key = std::env::var(&self.api_key_env)
                    .map_err(|_| ConfigError::MissingApiKey(self.api_key_env.clone()))?;
                Provider::OpenAiCompatible { base_url, api_key }
            }
            ProviderKind::LlamaCpp => Provider::LlamaCpp {
                base_url,
                model_path: self.model_path.clone(),
            },
        };
        Ok(Some(Arc::new(HttpInferenceClient::new(
            provider,
            self.model.clone(),
        ))))
    }

    /// Decide the inference capability once, at startup.
    ///
    /// Never fails: a missing key, a missing model file or an unreachable
    /// server all yield [`Capability::Unavailable`].
    pub async fn connect(&self) -> Capability {
        let client = match self.client() {
            Ok(Some(client)) => client,
            Ok(None) => {
                info!("no inference provider configured; using basic analysis");
                return Capability::unavailable("no inference provider configured");
            }
            Err(err) => {
                warn!(provider = %self.provider, error = %err, "inference provider not usable");
                return Capability::unavailable(err.to_string());
            }
        };

        if self.probe_on_startup {
            Capability::probe(client, self.request_timeout_ms).await
        } else {
            Capability::live(client)
        }
    }
}

/// Retry and prompt settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff wait; doubles on each retry.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// Versioned TOML prompt replacing the built-in one.
    #[serde(default)]
    pub prompt_file: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            prompt_file: None,
        }
    }
}

impl OrchestratorConfig {
    /// First backoff wait as a duration.
    #[must_use]
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    /// The configured prompt, or the built-in one.
    ///
    /// # Errors
    /// Returns `ConfigError::Prompt` if the prompt file cannot be loaded.
    pub fn prompt(&self) -> Result<PromptTemplate, ConfigError> {
        match &self.prompt_file {
            Some(path) => Ok(PromptTemplate::from_file(path)?),
            None => Ok(PromptTemplate::builtin()),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_model() -> String {
    "llama3.2:3b".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_model_path() -> PathBuf {
    PathBuf::from("models/Llama-3.2-3B.Q4_K_M.gguf")
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_concurrent_requests() -> usize {
    4
}
fn default_max_retries() -> u32 {
    3
}
fn default_base_backoff_ms() -> u64 {
    1000
}
