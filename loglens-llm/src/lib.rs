//! # loglens-llm: Inference Layer for LogLens
//!
//! Provides a single-attempt inference seam and everything wrapped around it:
//!   - **Ollama** (local, recommended default)
//!   - **OpenAI-compatible API** (hosted)
//!   - **llama.cpp server** (local GGUF model, one inference at a time)
//!
//! All inference in LogLens goes through this crate, ensuring:
//!   - Per-call timeout management
//!   - Bounded retry with exponential backoff ([`RetryingInvoker`])
//!   - Back-pressure for single-slot local models ([`Throttled`])
//!   - Availability decided once at startup ([`Capability`])
//!
//! # Architecture
//!
//! ```text
//! Orchestrator ──► RetryingInvoker ──► Throttled ──► InferenceClient
//!                   (backoff 1s·2^k)   (slots)       (Ollama | OpenAI | llama.cpp | mock)
//! ```

pub mod capability;
pub mod client;
pub mod error;
#[cfg(any(test, feature = "test-mocks"))]
pub mod mock;
pub mod prompt;
pub mod retry;
pub mod throttle;
pub mod types;

pub use capability::Capability;
pub use client::{HttpInferenceClient, InferenceClient, Provider};
pub use error::{ErrorKind, InferenceError};
pub use retry::{RetryState, RetryingInvoker, TrackedOutcome};
pub use throttle::Throttled;
pub use types::{InferenceOutcome, InferenceRequest, InferenceResponse};
