//! Observable agent state, shared between running analyses and status readers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// What the orchestrator is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Waiting for work.
    Idle,
    /// The most recent status update came from a starting analysis.
    Analyzing,
    /// The most recent analysis was cancelled.
    Cancelled,
}

/// Retry bookkeeping from the most recent analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisState {
    /// Last provider or parse failure, cleared by a successful analysis.
    pub last_error: Option<String>,
    /// Retries used by the most recent analysis (attempts minus one).
    pub retry_count: u32,
    /// Configured retry limit.
    pub max_retries: u32,
}

/// The provider behind a live capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDetails {
    /// Backend name (`ollama`, `openai`, `llama_cpp`, ...).
    pub name: String,
    /// Model identifier.
    pub model: String,
    /// Concurrent inference slots.
    pub slots: usize,
}

/// Snapshot of the orchestrator's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    /// Whether a live provider is configured.
    pub available: bool,
    /// Why the provider is unavailable, if it is.
    pub error: Option<String>,
    /// Last state change.
    pub last_activity: DateTime<Utc>,
    /// Current operation.
    pub current_operation: Operation,
    /// Retry bookkeeping.
    pub analysis: AnalysisState,
    /// Provider details when available.
    pub provider: Option<ProviderDetails>,
}

/// Guarded, shareable [`AgentStatus`].
///
/// Clones share the same state. Every update is one short write-lock; the
/// last writer wins.
#[derive(Debug, Clone)]
pub struct StatusCell {
    inner: Arc<RwLock<AgentStatus>>,
}

impl StatusCell {
    /// Start idle with the given availability.
    #[must_use]
    pub fn new(
        available: bool,
        error: Option<String>,
        provider: Option<ProviderDetails>,
        max_retries: u32,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(AgentStatus {
                available,
                error,
                last_activity: Utc::now(),
                current_operation: Operation::Idle,
                analysis: AnalysisState {
                    last_error: None,
                    retry_count: 0,
                    max_retries,
                },
                provider,
            })),
        }
    }

    /// A copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> AgentStatus {
        self.inner.read().clone()
    }

    /// Mark an analysis as started.
    pub fn begin_analysis(&self) {
        let mut status = self.inner.write();
        status.current_operation = Operation::Analyzing;
        status.last_activity = Utc::now();
    }

    /// Mark an analysis as finished, recording its outcome.
    pub fn finish_analysis(&self, last_error: Option<String>, attempts: u32) {
        let mut status = self.inner.write();
        status.current_operation = Operation::Idle;
        status.last_activity = Utc::now();
        status.analysis.last_error = last_error;
        status.analysis.retry_count = attempts.saturating_sub(1);
    }

    /// Mark the running analysis as cancelled.
    pub fn mark_cancelled(&self) {
        let mut status = self.inner.write();
        status.current_operation = Operation::Cancelled;
        status.last_activity = Utc::now();
    }
}
