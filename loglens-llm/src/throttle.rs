//! Back-pressure for inference providers.
//!
//! A provider that cannot run concurrent inference (a single local model
//! handle) gets exactly one slot; others get a bounded pool. A slot is held
//! for one attempt only, never across a retry backoff.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::trace;

use crate::client::InferenceClient;
use crate::error::InferenceError;
use crate::types::{InferenceOutcome, InferenceRequest};

/// Wraps a client so at most `slots` calls run at the same time.
pub struct Throttled {
    inner: Arc<dyn InferenceClient>,
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl Throttled {
    /// Size the slot pool from the provider's concurrency capability.
    ///
    /// `pool_size` applies only to providers that support concurrent
    /// inference; it is clamped to at least 1.
    #[must_use]
    pub fn for_client(inner: Arc<dyn InferenceClient>, pool_size: usize) -> Self {
        let capacity = if inner.supports_concurrent_inference() {
            pool_size.max(1)
        } else {
            1
        };
        Self {
            inner,
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Number of concurrent calls allowed.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[async_trait]
impl InferenceClient for Throttled {
    async fn invoke(&self, request: &InferenceRequest) -> InferenceOutcome {
        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| InferenceError::Unavailable("inference slots closed".into()))?;
        trace!(available = self.slots.available_permits(), "inference slot acquired");
        self.inner.invoke(request).await
    }

    async fn preflight(&self) -> Result<(), InferenceError> {
        self.inner.preflight().await
    }

    fn supports_concurrent_inference(&self) -> bool {
        self.capacity > 1
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}
