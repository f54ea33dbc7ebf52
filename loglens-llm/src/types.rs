//! Core types for inference requests and responses.

use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

/// Outcome of one inference call: generated text or a classified failure.
pub type InferenceOutcome = Result<InferenceResponse, InferenceError>;

/// A request to the inference provider.
///
/// Built once and then only read; the `with_*` builders consume the value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceRequest {
    prompt: String,
    system_prompt: String,
    max_tokens: u32,
    temperature: f32,
    timeout_ms: u64,
}

impl InferenceRequest {
    /// Create a request with default generation parameters.
    #[must_use]
    pub fn new(prompt: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: system_prompt.into(),
            max_tokens: 1024,
            temperature: 0.2,
            timeout_ms: 30_000,
        }
    }

    /// Set the maximum number of tokens to generate.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// User prompt (the uploaded log contents).
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// System prompt (role and output contract).
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    #[must_use]
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    #[must_use]
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Per-call timeout in milliseconds.
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }
}

/// A response from the inference provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    /// The generated text.
    pub text: String,
    /// How many tokens were generated (0 if the provider does not say).
    pub tokens_generated: u32,
    /// Latency in milliseconds.
    pub latency_ms: u64,
    /// Which model was used.
    pub model: String,
}

impl InferenceResponse {
    /// A response carrying only text, for providers that report nothing else.
    #[must_use]
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens_generated: 0,
            latency_ms: 0,
            model: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let req = InferenceRequest::new("logs", "analyze")
            .with_max_tokens(64)
            .with_temperature(0.0)
            .with_timeout(250);
        assert_eq!(req.prompt(), "logs");
        assert_eq!(req.system_prompt(), "analyze");
        assert_eq!(req.max_tokens(), 64);
        assert_eq!(req.timeout_ms(), 250);
        assert!(req.temperature().abs() < f32::EPSILON);
    }
}
