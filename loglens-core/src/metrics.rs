//! Runtime counters for the orchestrator.
//!
//! Lock-free `AtomicU64` counters incremented on the analysis path and read
//! through [`OrchestratorCounters::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters for analysis outcomes.
#[derive(Debug)]
pub struct OrchestratorCounters {
    /// Analyses that passed validation.
    pub analyses: AtomicU64,
    /// Reports built from a model answer.
    pub llm_reports: AtomicU64,
    /// Fallback reports produced without calling the provider.
    pub immediate_fallbacks: AtomicU64,
    /// Fallback reports produced after provider or parse failures.
    pub degraded_fallbacks: AtomicU64,
    /// Model answers that were not an analysis object.
    pub parse_failures: AtomicU64,
    /// Provider calls, including retries.
    pub provider_attempts: AtomicU64,
    /// Requests rejected for empty input or empty files.
    pub precondition_failures: AtomicU64,
    /// Analyses cancelled by the caller.
    pub cancellations: AtomicU64,
}

impl OrchestratorCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            analyses: AtomicU64::new(0),
            llm_reports: AtomicU64::new(0),
            immediate_fallbacks: AtomicU64::new(0),
            degraded_fallbacks: AtomicU64::new(0),
            parse_failures: AtomicU64::new(0),
            provider_attempts: AtomicU64::new(0),
            precondition_failures: AtomicU64::new(0),
            cancellations: AtomicU64::new(0),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            analyses: self.analyses.load(Ordering::Relaxed),
            llm_reports: self.llm_reports.load(Ordering::Relaxed),
            immediate_fallbacks: self.immediate_fallbacks.load(Ordering::Relaxed),
            degraded_fallbacks: self.degraded_fallbacks.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            provider_attempts: self.provider_attempts.load(Ordering::Relaxed),
            precondition_failures: self.precondition_failures.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
        }
    }
}

impl Default for OrchestratorCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of counter values at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    /// Analyses that passed validation.
    pub analyses: u64,
    /// Reports built from a model answer.
    pub llm_reports: u64,
    /// Fallbacks without a provider call.
    pub immediate_fallbacks: u64,
    /// Fallbacks after failures.
    pub degraded_fallbacks: u64,
    /// Unparseable model answers.
    pub parse_failures: u64,
    /// Provider calls, including retries.
    pub provider_attempts: u64,
    /// Rejected requests.
    pub precondition_failures: u64,
    /// Cancelled analyses.
    pub cancellations: u64,
}

impl CounterSnapshot {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let rows = [
            ("analyses", "Analyses started", self.analyses),
            ("llm_reports", "Reports built from a model answer", self.llm_reports),
            (
                "immediate_fallbacks",
                "Fallbacks without a provider call",
                self.immediate_fallbacks,
            ),
            (
                "degraded_fallbacks",
                "Fallbacks after provider or parse failures",
                self.degraded_fallbacks,
            ),
            ("parse_failures", "Unparseable model answers", self.parse_failures),
            ("provider_attempts", "Provider calls including retries", self.provider_attempts),
            ("precondition_failures", "Rejected analysis requests", self.precondition_failures),
            ("cancellations", "Cancelled analyses", self.cancellations),
        ];

        let mut out = String::new();
        for (name, help, value) in rows {
            out.push_str(&format!(
                "# HELP loglens_{name}_total {help}\n\
                 # TYPE loglens_{name}_total counter\n\
                 loglens_{name}_total {value}\n"
            ));
        }
        out
    }
}
