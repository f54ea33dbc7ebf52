//! The analysis entry point: retry the model, degrade to basic analysis.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;
use loglens_llm::prompt::{self, PromptTemplate};
use loglens_llm::retry::DEFAULT_BASE_DELAY;
use loglens_llm::{
    Capability, InferenceClient, InferenceError, InferenceRequest, RetryingInvoker, Throttled,
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::LoglensConfig;
use crate::error::{ConfigError, OrchestrationError};
use crate::fallback;
use crate::metrics::{CounterSnapshot, OrchestratorCounters};
use crate::payload::AnalysisPayload;
use crate::status::{AgentStatus, ProviderDetails, StatusCell};
use crate::types::{AnalysisInput, DegradationReason, Diagnostics, Report};

/// Tunables for an [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// First backoff wait; doubles on each retry.
    pub base_backoff: Duration,
    /// Per-call timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Concurrent calls for providers that allow them.
    pub max_concurrent_requests: usize,
    /// Analysis prompt, including its generation parameters.
    pub prompt: PromptTemplate,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: DEFAULT_BASE_DELAY,
            request_timeout_ms: 30_000,
            max_concurrent_requests: 4,
            prompt: PromptTemplate::builtin(),
        }
    }
}

impl OrchestratorSettings {
    /// Settings from a loaded configuration.
    ///
    /// The built-in prompt takes `llm.max_tokens` and `llm.temperature`; a
    /// prompt file keeps its own values.
    ///
    /// # Errors
    /// Returns `ConfigError::Prompt` if the prompt file cannot be loaded.
    pub fn from_config(config: &LoglensConfig) -> Result<Self, ConfigError> {
        let mut prompt = config.orchestrator.prompt()?;
        if config.orchestrator.prompt_file.is_none() {
            prompt.max_tokens = config.llm.max_tokens;
            prompt.temperature = config.llm.temperature;
        }
        Ok(Self {
            max_retries: config.orchestrator.max_retries,
            base_backoff: config.orchestrator.base_backoff(),
            request_timeout_ms: config.llm.request_timeout_ms,
            max_concurrent_requests: config.llm.max_concurrent_requests,
            prompt,
        })
    }
}

/// Runs analyses against a capability decided at startup.
///
/// Safe to share across tasks (`Arc<Orchestrator>`); each call to
/// [`analyze`](Self::analyze) owns its own retry state.
pub struct Orchestrator {
    capability: Capability,
    invoker: RetryingInvoker,
    settings: OrchestratorSettings,
    status: StatusCell,
    counters: OrchestratorCounters,
}

impl Orchestrator {
    /// Orchestrator with default settings.
    #[must_use]
    pub fn new(capability: Capability) -> Self {
        Self::with_settings(capability, OrchestratorSettings::default())
    }

    /// Orchestrator with explicit settings.
    ///
    /// A live client is wrapped in a [`Throttled`] pool sized from the
    /// provider's concurrency support.
    #[must_use]
    pub fn with_settings(capability: Capability, settings: OrchestratorSettings) -> Self {
        let (capability, provider) = match capability {
            Capability::Live(client) => {
                let throttled = Throttled::for_client(client, settings.max_concurrent_requests);
                let details = ProviderDetails {
                    name: throttled.name().to_string(),
                    model: throttled.model().to_string(),
                    slots: throttled.capacity(),
                };
                (Capability::live(Arc::new(throttled)), Some(details))
            }
            unavailable @ Capability::Unavailable { .. } => (unavailable, None),
        };

        let status = StatusCell::new(
            capability.is_available(),
            capability.reason().map(str::to_string),
            provider,
            settings.max_retries,
        );

        Self {
            capability,
            invoker: RetryingInvoker::new(settings.base_backoff),
            settings,
            status,
            counters: OrchestratorCounters::new(),
        }
    }

    /// Validate the config, load the prompt and probe the provider once.
    ///
    /// # Errors
    /// Returns an error for invalid values or an unreadable prompt file. An
    /// unusable provider is not an error; analyses fall back instead.
    pub async fn from_config(config: &LoglensConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let settings = OrchestratorSettings::from_config(config)?;
        let capability = config.llm.connect().await;
        Ok(Self::with_settings(capability, settings))
    }

    /// Analyse `input`, always producing a report for valid input.
    ///
    /// # Errors
    /// [`OrchestrationError::NoInput`] or [`OrchestrationError::EmptyContent`]
    /// for malformed input. Provider failures are never errors.
    pub async fn analyze(&self, input: &AnalysisInput) -> Result<Report, OrchestrationError> {
        self.analyze_with_cancel(input, &CancellationToken::new()).await
    }

    /// Like [`analyze`](Self::analyze), abandoning the in-flight call or
    /// backoff wait as soon as `cancel` fires.
    ///
    /// # Errors
    /// As [`analyze`](Self::analyze), plus [`OrchestrationError::Cancelled`].
    pub async fn analyze_with_cancel(
        &self,
        input: &AnalysisInput,
        cancel: &CancellationToken,
    ) -> Result<Report, OrchestrationError> {
        if let Err(err) = input.validate() {
            OrchestratorCounters::bump(&self.counters.precondition_failures);
            warn!(error = %err, "analysis request rejected");
            return Err(err);
        }

        let span = info_span!("analyze", analysis_id = %Uuid::new_v4(), files = input.len());
        self.run(input, cancel).instrument(span).await
    }

    /// Snapshot of the agent state.
    #[must_use]
    pub fn status(&self) -> AgentStatus {
        self.status.snapshot()
    }

    /// Snapshot of the outcome counters.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// The active settings.
    #[must_use]
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    async fn run(
        &self,
        input: &AnalysisInput,
        cancel: &CancellationToken,
    ) -> Result<Report, OrchestrationError> {
        OrchestratorCounters::bump(&self.counters.analyses);
        self.status.begin_analysis();

        let produced = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            produced = self.produce(input) => Some(produced),
        };

        let Some((report, attempts)) = produced else {
            OrchestratorCounters::bump(&self.counters.cancellations);
            self.status.mark_cancelled();
            warn!("analysis cancelled");
            return Err(OrchestrationError::Cancelled);
        };

        let last_error = report
            .diagnostics
            .as_ref()
            .and_then(|d| d.last_error.clone());
        self.status.finish_analysis(last_error, attempts);
        info!(mode = ?report.mode, attempts, "analysis complete");
        Ok(report)
    }

    /// The report plus the number of provider calls it took.
    async fn produce(&self, input: &AnalysisInput) -> (Report, u32) {
        let Some(client) = self.capability.client() else {
            OrchestratorCounters::bump(&self.counters.immediate_fallbacks);
            let reason = self.capability.reason().unwrap_or("provider unavailable");
            debug!(reason, "no live provider; using basic analysis");
            let report = degrade(
                input,
                DegradationReason::ProviderUnavailable,
                Some(reason.to_string()),
                None,
                0,
            );
            return (report, 0);
        };

        let request = self.build_request(input);
        let tracked = self
            .invoker
            .invoke_tracked(&**client, &request, self.settings.max_retries)
            .await;
        let attempts = tracked.attempts;
        self.counters
            .provider_attempts
            .fetch_add(u64::from(attempts), Ordering::Relaxed);

        let report = match tracked.outcome {
            Ok(response) => match AnalysisPayload::parse(&response.text) {
                Ok(payload) => {
                    OrchestratorCounters::bump(&self.counters.llm_reports);
                    debug!(
                        latency_ms = response.latency_ms,
                        tokens = response.tokens_generated,
                        "model answer parsed"
                    );
                    Report::from_llm(payload)
                }
                Err(err) => {
                    OrchestratorCounters::bump(&self.counters.parse_failures);
                    OrchestratorCounters::bump(&self.counters.degraded_fallbacks);
                    warn!(
                        error = %err,
                        "model answer is not an analysis object; using basic analysis"
                    );
                    degrade(
                        input,
                        DegradationReason::UnparseableResponse,
                        Some(err.to_string()),
                        None,
                        attempts,
                    )
                }
            },
            Err(err) => {
                OrchestratorCounters::bump(&self.counters.degraded_fallbacks);
                warn!(error = %err, "inference failed; using basic analysis");
                let kind = err.kind();
                let last_error = match err {
                    InferenceError::RetriesExhausted { last_error, .. } => last_error,
                    other => other.to_string(),
                };
                degrade(
                    input,
                    DegradationReason::RetriesExhausted,
                    Some(last_error),
                    Some(kind),
                    attempts,
                )
            }
        };
        (report, attempts)
    }

    fn build_request(&self, input: &AnalysisInput) -> InferenceRequest {
        let files = prompt::format_files(
            input
                .files()
                .iter()
                .map(|f| (f.name.as_str(), f.content.as_str())),
        );
        let template = &self.settings.prompt;
        let (system, user) = template.render(&files);
        InferenceRequest::new(user, system)
            .with_max_tokens(template.max_tokens)
            .with_temperature(template.temperature)
            .with_timeout(self.settings.request_timeout_ms)
    }
}

fn degrade(
    input: &AnalysisInput,
    reason: DegradationReason,
    last_error: Option<String>,
    error_kind: Option<loglens_llm::ErrorKind>,
    attempts: u32,
) -> Report {
    fallback::analyze_basic(input).with_diagnostics(Diagnostics {
        reason,
        last_error,
        error_kind,
        attempts,
        timestamp: Utc::now(),
    })
}
