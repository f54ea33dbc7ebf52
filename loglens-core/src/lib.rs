//! # LogLens Core Library
//!
//! Turns a batch of uploaded log files into a structured [`Report`].
//!
//! When a language model is reachable, the files are sent to it through a
//! bounded retry loop (exponential backoff starting at one second). When no
//! model is configured, the startup probe failed, every attempt failed, or the
//! answer is not a JSON object, the deterministic [`fallback`] analysis is
//! returned instead. Callers always get a usable report; only malformed input
//! is an error.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle ─► Validating ─┬─► Fallback-Immediate ───────────────┬─► Idle
//!                     └─► Invoking(0..=n) ─┬─► Succeeded ───┤
//!                                          └─► Fallback-Degraded
//! ```
//!
//! Shared state is limited to the [`StatusCell`] and the
//! [`OrchestratorCounters`], both owned by the [`Orchestrator`].

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod fallback;
pub mod metrics;
pub mod orchestrator;
pub mod payload;
pub mod status;
pub mod types;

pub use config::LoglensConfig;
pub use error::{ConfigError, OrchestrationError};
pub use metrics::{CounterSnapshot, OrchestratorCounters};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use payload::{AnalysisPayload, PayloadError};
pub use status::{AgentStatus, AnalysisState, Operation, ProviderDetails, StatusCell};
pub use types::*;
