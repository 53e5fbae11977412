//! Provider client adapters
//!
//! One adapter per upstream vendor, all behind the [`ProviderClient`] trait
//! the router dispatches through:
//! - [`OpenAiClient`]: OpenAI chat completions API
//! - [`AnthropicClient`]: Anthropic messages API
//! - [`CohereClient`]: Cohere chat API
//! - [`EchoClient`]: testing/demo adapter, no network
//!
//! Adapters own the vendor URL and auth, serialize the normalized request
//! into vendor JSON, deserialize the response back, and map vendor failures
//! into the [`ClientError`] taxonomy. They never retry internally — retry
//! policy belongs to the router.
//!
//! ## Environment Variables
//!
//! - `OPENAI_API_KEY`: required for [`OpenAiClient`]
//! - `ANTHROPIC_API_KEY`: required for [`AnthropicClient`]
//! - `COHERE_API_KEY`: required for [`CohereClient`]

pub mod anthropic;
pub mod cohere;
pub mod echo;
pub mod error;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{ConfigError, ModelConfig, ProviderKind};
use crate::schemas::{ChatRequest, ChatResponse};

pub use anthropic::AnthropicClient;
pub use cohere::CohereClient;
pub use echo::EchoClient;
pub use error::{classify_status, ClientError, ErrorClass};
pub use openai::OpenAiClient;

/// The contract the router requires of any upstream.
///
/// Implementations must be thread-safe (`Send + Sync`); the trait is
/// object-safe so the router can hold `Arc<dyn ProviderClient>`. Calls are
/// cancellable by dropping the returned future — the router races every call
/// against its cancellation token, and reqwest aborts the in-flight HTTP
/// request when the future is dropped.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Send one normalized chat request and return the normalized response.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError>;

    /// Stable provider tag, unique within a router (e.g. `"openai"`).
    fn id(&self) -> &str;
}

/// Read a provider API key from the environment.
pub(crate) fn key_from_env(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var)
        .map_err(|_| ConfigError::Validation(format!("{var} environment variable not set")))
}

/// Build the provider client for one model config entry.
///
/// API keys come from the vendor's environment variable; `base_url` and
/// `timeout_ms` overrides are applied when present.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when the required API key variable is
/// not set.
pub fn build_client(cfg: &ModelConfig) -> Result<Arc<dyn ProviderClient>, ConfigError> {
    let timeout = Duration::from_millis(cfg.timeout_ms);
    match cfg.provider {
        ProviderKind::OpenAi => {
            let mut client = OpenAiClient::from_env(&cfg.api_model)?.with_timeout(timeout);
            if let Some(url) = &cfg.base_url {
                client = client.with_base_url(url);
            }
            Ok(Arc::new(client))
        }
        ProviderKind::Anthropic => {
            let mut client = AnthropicClient::from_env(&cfg.api_model)?.with_timeout(timeout);
            if let Some(url) = &cfg.base_url {
                client = client.with_base_url(url);
            }
            Ok(Arc::new(client))
        }
        ProviderKind::Cohere => {
            let mut client = CohereClient::from_env(&cfg.api_model)?.with_timeout(timeout);
            if let Some(url) = &cfg.base_url {
                client = client.with_base_url(url);
            }
            Ok(Arc::new(client))
        }
        ProviderKind::Echo => Ok(Arc::new(EchoClient::new())),
    }
}
