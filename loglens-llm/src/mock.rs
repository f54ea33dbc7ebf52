//! Scripted in-process inference client.
//!
//! Replays a fixed sequence of outcomes (the last one repeats once the script
//! runs out) and records when each call happened. Used by tests and benches.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::client::InferenceClient;
use crate::error::InferenceError;
use crate::types::{InferenceOutcome, InferenceRequest, InferenceResponse};

/// An [`InferenceClient`] that plays back scripted outcomes.
pub struct ScriptedClient {
    script: Mutex<VecDeque<InferenceOutcome>>,
    last: Mutex<Option<InferenceOutcome>>,
    call_times: Mutex<Vec<Instant>>,
    prompts: Mutex<Vec<String>>,
    latency: Duration,
    concurrent: bool,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedClient {
    /// Play `outcomes` in order, repeating the last one afterwards.
    #[must_use]
    pub fn from_script(outcomes: Vec<InferenceOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            last: Mutex::new(None),
            call_times: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
            concurrent: true,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Always answer with `text`.
    #[must_use]
    pub fn succeeding(text: impl Into<String>) -> Self {
        Self::from_script(vec![Ok(InferenceResponse::text_only(text))])
    }

    /// Always fail with `err`.
    #[must_use]
    pub fn always_failing(err: InferenceError) -> Self {
        Self::from_script(vec![Err(err)])
    }

    /// Fail `failures` times with `err`, then answer with `text`.
    #[must_use]
    pub fn failing_then_succeeding(
        failures: usize,
        err: InferenceError,
        text: impl Into<String>,
    ) -> Self {
        let mut script: Vec<InferenceOutcome> = (0..failures).map(|_| Err(err.clone())).collect();
        script.push(Ok(InferenceResponse::text_only(text)));
        Self::from_script(script)
    }

    /// Simulate inference time on every call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Report the provider as unable to serve concurrent requests.
    #[must_use]
    pub fn single_slot(mut self) -> Self {
        self.concurrent = false;
        self
    }

    /// Number of calls made so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.call_times.lock().len()
    }

    /// Time between consecutive call starts.
    #[must_use]
    pub fn gaps(&self) -> Vec<Duration> {
        self.call_times
            .lock()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }

    /// User prompts received, in call order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Highest number of calls observed running at the same time.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> InferenceOutcome {
        let next = self.script.lock().pop_front();
        let mut last = self.last.lock();
        match next {
            Some(outcome) => {
                *last = Some(outcome.clone());
                outcome
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(InferenceError::Unavailable("empty script".into()))),
        }
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    async fn invoke(&self, request: &InferenceRequest) -> InferenceOutcome {
        self.call_times.lock().push(Instant::now());
        self.prompts.lock().push(request.prompt().to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let outcome = self.next_outcome();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    fn supports_concurrent_inference(&self) -> bool {
        self.concurrent
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
