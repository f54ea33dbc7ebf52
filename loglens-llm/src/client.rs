//! Inference clients: the `InferenceClient` seam and the HTTP backends behind it.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::InferenceError;
use crate::types::{InferenceOutcome, InferenceRequest, InferenceResponse};

/// A single-attempt call to an inference capability.
///
/// Implementations never retry internally and report every ordinary failure
/// (timeouts, connection errors, provider errors, unreadable bodies) as an
/// [`InferenceError`] rather than panicking.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Run one inference pass.
    async fn invoke(&self, request: &InferenceRequest) -> InferenceOutcome;

    /// Cheap local checks before the first call (model file present, etc.).
    async fn preflight(&self) -> Result<(), InferenceError> {
        Ok(())
    }

    /// Whether the provider can serve several requests at once.
    fn supports_concurrent_inference(&self) -> bool {
        true
    }

    /// Provider name for status reporting.
    fn name(&self) -> &str;

    /// Model identifier for status reporting.
    fn model(&self) -> &str {
        ""
    }
}

/// Provider backend for HTTP inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// Ollama running locally.
    Ollama { base_url: String },
    /// OpenAI-compatible chat completions API.
    OpenAiCompatible { base_url: String, api_key: String },
    /// llama.cpp server hosting a local GGUF model.
    LlamaCpp { base_url: String, model_path: PathBuf },
}

impl Provider {
    /// Short name used in logs and status output.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ollama { .. } => "ollama",
            Self::OpenAiCompatible { .. } => "openai",
            Self::LlamaCpp { .. } => "llama_cpp",
        }
    }

    fn base_url(&self) -> &str {
        match self {
            Self::Ollama { base_url }
            | Self::OpenAiCompatible { base_url, .. }
            | Self::LlamaCpp { base_url, .. } => base_url.trim_end_matches('/'),
        }
    }
}

/// HTTP client that talks to one configured [`Provider`].
pub struct HttpInferenceClient {
    provider: Provider,
    http: Client,
    model: String,
}

impl HttpInferenceClient {
    /// Create a new client for `provider`, asking for `model`.
    #[must_use]
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            http: Client::new(),
            model: model.into(),
        }
    }

    /// The configured provider.
    #[must_use]
    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    fn endpoint(&self) -> String {
        let base = self.provider.base_url();
        match self.provider {
            Provider::Ollama { .. } => format!("{base}/api/generate"),
            Provider::OpenAiCompatible { .. } => format!("{base}/v1/chat/completions"),
            Provider::LlamaCpp { .. } => format!("{base}/completion"),
        }
    }

    fn body(&self, request: &InferenceRequest) -> Value {
        match self.provider {
            Provider::Ollama { .. } => json!({
                "model": self.model,
                "system": request.system_prompt(),
                "prompt": request.prompt(),
                "stream": false,
                "format": "json",
                "options": {
                    "temperature": request.temperature(),
                    "num_predict": request.max_tokens(),
                }
            }),
            Provider::OpenAiCompatible { .. } => json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": request.system_prompt() },
                    { "role": "user", "content": request.prompt() },
                ],
                "max_tokens": request.max_tokens(),
                "temperature": request.temperature(),
            }),
            Provider::LlamaCpp { .. } => json!({
                "prompt": format_instruct(request.system_prompt(), request.prompt()),
                "n_predict": request.max_tokens(),
                "temperature": request.temperature(),
                "stream": false,
            }),
        }
    }

    fn extract(&self, json: &Value) -> Result<(String, u32), InferenceError> {
        match self.provider {
            Provider::Ollama { .. } => extract_ollama(json),
            Provider::OpenAiCompatible { .. } => extract_openai(json),
            Provider::LlamaCpp { .. } => extract_llama_cpp(json),
        }
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn invoke(&self, request: &InferenceRequest) -> InferenceOutcome {
        let url = self.endpoint();
        let timeout_ms = request.timeout_ms();
        debug!(provider = self.provider.name(), %url, "sending inference request");

        let mut builder = self
            .http
            .post(&url)
            .json(&self.body(request))
            .timeout(Duration::from_millis(timeout_ms));
        if let Provider::OpenAiCompatible { api_key, .. } = &self.provider {
            if !api_key.is_empty() {
                builder = builder.bearer_auth(api_key);
            }
        }

        let start = Instant::now();
        let resp = builder.send().await.map_err(|e| {
            let err = InferenceError::from_transport(&e, timeout_ms);
            warn!(provider = self.provider.name(), error = %err, "inference request failed");
            err
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(provider = self.provider.name(), %status, "provider returned error");
            return Err(InferenceError::Provider(format!("HTTP {status}: {body}")));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| InferenceError::from_transport(&e, timeout_ms))?;
        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let (text, tokens_generated) = self.extract(&json)?;

        Ok(InferenceResponse {
            text,
            tokens_generated,
            latency_ms,
            model: self.model.clone(),
        })
    }

    async fn preflight(&self) -> Result<(), InferenceError> {
        let Provider::LlamaCpp { model_path, .. } = &self.provider else {
            return Ok(());
        };
        let meta = tokio::fs::metadata(model_path).await.map_err(|e| {
            InferenceError::Unavailable(format!(
                "model file not found at {}: {e}",
                model_path.display()
            ))
        })?;
        if !meta.is_file() || meta.len() == 0 {
            return Err(InferenceError::Unavailable(format!(
                "model path {} is not a usable GGUF file",
                model_path.display()
            )));
        }
        #[allow(clippy::cast_precision_loss)]
        let size_gb = meta.len() as f64 / (1024.0 * 1024.0 * 1024.0);
        debug!(
            path = %model_path.display(),
            size_gb = %format!("{size_gb:.2}"),
            "model file found"
        );
        Ok(())
    }

    fn supports_concurrent_inference(&self) -> bool {
        !matches!(self.provider, Provider::LlamaCpp { .. })
    }

    fn name(&self) -> &str {
        self.provider.name()
    }

    fn model(&self) -> &str {
        match &self.provider {
            Provider::LlamaCpp { model_path, .. } if self.model.is_empty() => {
                model_path.to_str().unwrap_or_default()
            }
            _ => &self.model,
        }
    }
}

/// Instruction-style framing used for raw completion endpoints.
#[must_use]
pub fn format_instruct(system: &str, prompt: &str) -> String {
    format!("[INST] {system}\n{prompt} [/INST]")
}

fn missing(field: &str, json: &Value) -> InferenceError {
    InferenceError::InvalidResponse(format!("missing `{field}` in response: {json}"))
}

fn token_count(value: &Value) -> u32 {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

fn extract_ollama(json: &Value) -> Result<(String, u32), InferenceError> {
    let text = json["response"]
        .as_str()
        .ok_or_else(|| missing("response", json))?;
    Ok((text.to_string(), token_count(&json["eval_count"])))
}

fn extract_openai(json: &Value) -> Result<(String, u32), InferenceError> {
    let text = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| missing("choices[0].message.content", json))?;
    Ok((text.to_string(), token_count(&json["usage"]["completion_tokens"])))
}

fn extract_llama_cpp(json: &Value) -> Result<(String, u32), InferenceError> {
    let text = json["content"]
        .as_str()
        .ok_or_else(|| missing("content", json))?;
    Ok((text.to_string(), token_count(&json["tokens_predicted"])))
}
