//! Whether a working inference provider exists, decided once at startup.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::client::InferenceClient;
use crate::types::InferenceRequest;

/// System prompt used by the startup probe.
pub const PROBE_SYSTEM: &str = "System: Respond with 'OK' if working.";

/// Prompt used by the startup probe.
pub const PROBE_PROMPT: &str = "Test";

/// The inference capability handed to the orchestrator.
#[derive(Clone)]
pub enum Capability {
    /// A provider that answered the startup probe (or was trusted without one).
    Live(Arc<dyn InferenceClient>),
    /// No usable provider; analysis runs in fallback mode.
    Unavailable {
        /// Why the provider is unusable.
        reason: String,
    },
}

impl Capability {
    /// Trust `client` without probing it.
    #[must_use]
    pub fn live(client: Arc<dyn InferenceClient>) -> Self {
        Self::Live(client)
    }

    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Run preflight checks and one short test prompt against `client`.
    ///
    /// Any failure yields [`Capability::Unavailable`] with the failure message;
    /// the probe itself is never retried.
    pub async fn probe(client: Arc<dyn InferenceClient>, timeout_ms: u64) -> Self {
        if let Err(err) = client.preflight().await {
            warn!(provider = client.name(), error = %err, "inference preflight failed");
            return Self::unavailable(err.to_string());
        }

        let request = InferenceRequest::new(PROBE_PROMPT, PROBE_SYSTEM)
            .with_max_tokens(8)
            .with_timeout(timeout_ms);
        match client.invoke(&request).await {
            Ok(response) => {
                info!(
                    provider = client.name(),
                    model = client.model(),
                    latency_ms = response.latency_ms,
                    "inference provider available"
                );
                Self::Live(client)
            }
            Err(err) => {
                warn!(provider = client.name(), error = %err, "inference probe failed");
                Self::unavailable(err.to_string())
            }
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    /// The live client, if any.
    #[must_use]
    pub fn client(&self) -> Option<&Arc<dyn InferenceClient>> {
        match self {
            Self::Live(client) => Some(client),
            Self::Unavailable { .. } => None,
        }
    }

    /// Why the provider is unusable, if it is.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Live(_) => None,
            Self::Unavailable { reason } => Some(reason),
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live(client) => f
                .debug_tuple("Live")
                .field(&format_args!("{}:{}", client.name(), client.model()))
                .finish(),
            Self::Unavailable { reason } => {
                f.debug_struct("Unavailable").field("reason", reason).finish()
            }
        }
    }
}
