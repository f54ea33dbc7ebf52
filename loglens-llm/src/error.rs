//! Inference error types.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Coarse classification of an inference failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Provider could not be reached or is not configured.
    Unavailable,
    /// The call did not complete within its deadline.
    Timeout,
    /// The provider answered, but not in a shape we can read.
    InvalidResponse,
    /// The provider answered with an error (non-2xx, rejected request).
    ProviderError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::InvalidResponse => "invalid_response",
            Self::ProviderError => "provider_error",
        };
        write!(f, "{name}")
    }
}

/// Errors that can occur during a single inference call or a retried one.
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    /// Inference provider is unavailable.
    #[error("inference provider unavailable: {0}")]
    Unavailable(String),

    /// Request timed out.
    #[error("inference request timed out after {0}ms")]
    Timeout(u64),

    /// Provider response was not in the expected shape.
    #[error("invalid inference response: {0}")]
    InvalidResponse(String),

    /// Provider rejected the request.
    #[error("inference provider error: {0}")]
    Provider(String),

    /// All retry attempts exhausted.
    #[error("inference failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        kind: ErrorKind,
        last_error: String,
    },
}

impl InferenceError {
    /// The kind of the underlying failure.
    ///
    /// For [`InferenceError::RetriesExhausted`] this is the kind of the last attempt.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::InvalidResponse(_) => ErrorKind::InvalidResponse,
            Self::Provider(_) => ErrorKind::ProviderError,
            Self::RetriesExhausted { kind, .. } => *kind,
        }
    }

    /// Number of attempts this error covers (1 for a single call).
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::RetriesExhausted { attempts, .. } => *attempts,
            _ => 1,
        }
    }

    /// Map a transport error, keeping the configured deadline for timeouts.
    #[must_use]
    pub fn from_transport(err: &reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout_ms)
        } else if err.is_connect() {
            Self::Unavailable(err.to_string())
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Provider(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_keeps_last_kind() {
        let err = InferenceError::RetriesExhausted {
            attempts: 4,
            kind: ErrorKind::Timeout,
            last_error: "slow".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.attempts(), 4);
        assert_eq!(err.to_string(), "inference failed after 4 attempts: slow");
    }

    #[test]
    fn single_failures_count_one_attempt() {
        assert_eq!(InferenceError::Provider("HTTP 500".into()).attempts(), 1);
        assert_eq!(
            InferenceError::Unavailable("down".into()).kind(),
            ErrorKind::Unavailable
        );
    }

    #[test]
    fn kind_display_is_snake_case() {
        assert_eq!(ErrorKind::InvalidResponse.to_string(), "invalid_response");
        assert_eq!(ErrorKind::ProviderError.to_string(), "provider_error");
    }
}
