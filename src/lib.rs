//! # llm-gateway
//!
//! A resilient gateway in front of multiple upstream LLM providers.
//!
//! ## Architecture
//!
//! Inbound chat requests are normalized into a provider-agnostic schema and
//! dispatched by the [`Router`], which asks the configured routing strategy
//! for a per-request candidate sequence and walks it until one provider
//! answers:
//!
//! ```text
//! ChatRequest → Router → strategy.candidates() → provider client → ChatResponse
//!                  │                                   │
//!                  └── health / latency feedback ◄─────┘
//! ```
//!
//! Transient provider failures are absorbed by the dispatch loop and drive
//! candidate advancement; health recovery is delegated to the background
//! [`health`] monitor.

use thiserror::Error;

pub mod config;
pub mod health;
pub mod latency;
pub mod model;
pub mod providers;
pub mod router;
pub mod routing;
pub mod schemas;

#[cfg(feature = "web-api")]
pub mod web_api;

// Re-exports
pub use latency::LatencyTracker;
pub use model::LangModel;
pub use providers::{ClientError, ErrorClass, ProviderClient};
pub use router::Router;
pub use schemas::{ChatMessage, ChatRequest, ChatResponse, ModelResponse, TokenUsage};

/// One attempted-and-failed candidate inside an
/// [`GatewayError::AllProvidersFailed`] tail.
#[derive(Debug)]
pub struct ModelFailure {
    /// Configured id of the model that was attempted.
    pub model_id: String,
    /// The transient error the provider client returned.
    pub error: ClientError,
}

/// Errors surfaced at the router boundary.
///
/// This is a closed set: transient provider errors never escape on their own,
/// they only appear inside the `AllProvidersFailed` failure tail.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The inbound request is malformed (empty message, unknown override id).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The provider rejected the request for a reason retrying cannot fix.
    /// Propagated verbatim from the first candidate that returned it.
    #[error("provider rejected the request: {0}")]
    NonRetryable(#[source] ClientError),

    /// The provider signalled account-scope quota exhaustion.
    #[error("provider budget exhausted: {0}")]
    BudgetExhausted(#[source] ClientError),

    /// The strategy could not produce a single candidate.
    #[error("no healthy models available")]
    NoHealthyModels,

    /// Every candidate was attempted and every attempt failed transiently.
    #[error("all providers failed across {} candidates", .failures.len())]
    AllProvidersFailed {
        /// Per-model error tail, in attempt order.
        failures: Vec<ModelFailure>,
    },

    /// The caller cancelled the request mid-dispatch.
    #[error("request cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Stable machine-readable tag for this error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::NonRetryable(_) => "non_retryable_provider_error",
            Self::BudgetExhausted(_) => "budget_exhausted",
            Self::NoHealthyModels => "no_healthy_models",
            Self::AllProvidersFailed { .. } => "all_providers_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Initialise global tracing. Call once at binary startup.
///
/// Honours `RUST_LOG` when set, defaulting to `info`; the output format
/// comes from the observability config section.
pub fn init_tracing(format: config::LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = match format {
        config::LogFormat::Pretty => builder.try_init(),
        config::LogFormat::Json => builder.json().try_init(),
    };
}
