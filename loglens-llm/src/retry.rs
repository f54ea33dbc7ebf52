//! Bounded retries with pure exponential backoff around a single inference call.
//!
//! Attempt `k` (0-based) that fails is followed by a wait of
//! `base_delay * 2^k` before attempt `k + 1`. The final attempt's failure is
//! returned as [`InferenceError::RetriesExhausted`]. Waiting uses
//! `tokio::time::sleep`, so only the calling task is suspended.

use std::time::Duration;

use tracing::{debug, warn};

use crate::client::InferenceClient;
use crate::error::InferenceError;
use crate::types::{InferenceOutcome, InferenceRequest};

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Per-invocation retry bookkeeping. Lives only for one `invoke_with_retry` call.
#[derive(Debug, Clone)]
pub struct RetryState {
    /// Current attempt, 0-based.
    pub attempt: u32,
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Failure from the most recent attempt.
    pub last_error: Option<InferenceError>,
}

impl RetryState {
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            attempt: 0,
            max_retries,
            last_error: None,
        }
    }

    /// Whether the current attempt is the last one allowed.
    #[must_use]
    pub fn is_final_attempt(&self) -> bool {
        self.attempt >= self.max_retries
    }
}

/// Result of a retried invocation together with how many calls it took.
#[derive(Debug, Clone)]
pub struct TrackedOutcome {
    /// Success, or the exhausted-retries failure.
    pub outcome: InferenceOutcome,
    /// Calls made to the client (always at least 1).
    pub attempts: u32,
}

/// Calls an [`InferenceClient`] up to `max_retries + 1` times.
#[derive(Debug, Clone, Copy)]
pub struct RetryingInvoker {
    base_delay: Duration,
}

impl Default for RetryingInvoker {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY)
    }
}

impl RetryingInvoker {
    #[must_use]
    pub fn new(base_delay: Duration) -> Self {
        Self { base_delay }
    }

    /// Delay before the retry that follows failed attempt `attempt`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Invoke `client` with bounded retries.
    ///
    /// Returns the first success. After `max_retries + 1` failures returns
    /// [`InferenceError::RetriesExhausted`] carrying the attempt count, the
    /// last failure's kind and its message.
    pub async fn invoke_with_retry(
        &self,
        client: &dyn InferenceClient,
        request: &InferenceRequest,
        max_retries: u32,
    ) -> InferenceOutcome {
        self.invoke_tracked(client, request, max_retries).await.outcome
    }

    /// Like [`invoke_with_retry`](Self::invoke_with_retry), also reporting the
    /// number of calls made.
    pub async fn invoke_tracked(
        &self,
        client: &dyn InferenceClient,
        request: &InferenceRequest,
        max_retries: u32,
    ) -> TrackedOutcome {
        let mut state = RetryState::new(max_retries);

        loop {
            if state.attempt > 0 {
                debug!(
                    "Retrying inference call (attempt {}/{})",
                    state.attempt + 1,
                    max_retries + 1
                );
            }

            match client.invoke(request).await {
                Ok(response) => {
                    return TrackedOutcome {
                        outcome: Ok(response),
                        attempts: state.attempt + 1,
                    };
                }
                Err(err) => {
                    warn!(
                        attempt = state.attempt,
                        kind = %err.kind(),
                        error = %err,
                        "inference attempt failed"
                    );
                    state.last_error = Some(err);
                }
            }

            if state.is_final_attempt() {
                break;
            }

            let wait = self.backoff(state.attempt);
            debug!(wait_ms = wait.as_millis(), "backing off before retry");
            tokio::time::sleep(wait).await;
            state.attempt += 1;
        }

        let attempts = state.attempt + 1;
        let err = match state.last_error {
            Some(err) => InferenceError::RetriesExhausted {
                attempts,
                kind: err.kind(),
                last_error: err.to_string(),
            },
            None => InferenceError::Unavailable("no inference attempt was made".into()),
        };
        TrackedOutcome {
            outcome: Err(err),
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mock::ScriptedClient;
    use tokio::time::Instant;

    fn request() -> InferenceRequest {
        InferenceRequest::new("log line", "analyze")
    }

    #[test]
    fn backoff_doubles_from_base() {
        let invoker = RetryingInvoker::default();
        assert_eq!(invoker.backoff(0), Duration::from_millis(1000));
        assert_eq!(invoker.backoff(1), Duration::from_millis(2000));
        assert_eq!(invoker.backoff(2), Duration::from_millis(4000));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let invoker = RetryingInvoker::new(Duration::from_secs(1));
        assert_eq!(invoker.backoff(40), Duration::from_secs(u64::from(u32::MAX)));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_is_one_attempt_without_wait() {
        let client = ScriptedClient::always_failing(InferenceError::Timeout(50));
        let start = Instant::now();

        let err = RetryingInvoker::default()
            .invoke_with_retry(&client, &request(), 0)
            .await
            .expect_err("should fail");

        assert_eq!(client.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(err.attempts(), 1);
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_makes_n_plus_one_calls() {
        for n in 0..=4 {
            let client =
                ScriptedClient::always_failing(InferenceError::Provider("HTTP 503".into()));
            let err = RetryingInvoker::new(Duration::from_millis(10))
                .invoke_with_retry(&client, &request(), n)
                .await
                .expect_err("should fail");
            assert_eq!(client.calls(), n as usize + 1);
            assert_eq!(err.attempts(), n + 1);
            assert!(err.to_string().contains("HTTP 503"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_attempt_k_stops_retrying() {
        let client = ScriptedClient::failing_then_succeeding(
            2,
            InferenceError::Unavailable("connection refused".into()),
            "{}",
        );

        let response = RetryingInvoker::default()
            .invoke_with_retry(&client, &request(), 3)
            .await
            .expect("third attempt succeeds");

        assert_eq!(response.text, "{}");
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn tracked_reports_attempts_on_success() {
        let client = ScriptedClient::failing_then_succeeding(1, InferenceError::Timeout(10), "{}");
        let tracked = RetryingInvoker::new(Duration::from_millis(1))
            .invoke_tracked(&client, &request(), 3)
            .await;
        assert!(tracked.outcome.is_ok());
        assert_eq!(tracked.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_grow_exponentially_between_calls() {
        let client = ScriptedClient::failing_then_succeeding(
            2,
            InferenceError::Timeout(100),
            "{}",
        );

        RetryingInvoker::default()
            .invoke_with_retry(&client, &request(), 3)
            .await
            .expect("third attempt succeeds");

        let gaps = client.gaps();
        assert_eq!(gaps, vec![Duration::from_millis(1000), Duration::from_millis(2000)]);
    }

    #[tokio::test(start_paused = true)]
    async fn worst_case_delay_is_geometric_sum() {
        let client = ScriptedClient::always_failing(InferenceError::Timeout(100));
        let start = Instant::now();

        let _ = RetryingInvoker::default()
            .invoke_with_retry(&client, &request(), 3)
            .await;

        assert_eq!(client.calls(), 4);
        assert_eq!(start.elapsed(), Duration::from_millis(1000 * (2u64.pow(3) - 1)));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_does_not_block_other_tasks() {
        let slow = ScriptedClient::always_failing(InferenceError::Timeout(100));
        let fast = ScriptedClient::succeeding("{}");

        let invoker = RetryingInvoker::default();
        let req = request();

        let retrying = invoker.invoke_with_retry(&slow, &req, 2);
        let single = async {
            let out = invoker.invoke_with_retry(&fast, &req, 0).await;
            (out, Instant::now())
        };
        let start = Instant::now();
        let (_, (out, finished_at)) = tokio::join!(retrying, single);

        assert!(out.is_ok());
        assert_eq!(finished_at - start, Duration::ZERO);
    }
}
