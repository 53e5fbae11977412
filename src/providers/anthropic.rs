//! Anthropic messages adapter
//!
//! Targets the messages API (`POST {base}/v1/messages`). Requires the
//! `ANTHROPIC_API_KEY` environment variable. Anthropic does not return a
//! creation timestamp, so `created` is gateway-filled.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::ClientError;
use super::ProviderClient;
use crate::config::ConfigError;
use crate::schemas::{unix_now, ChatMessage, ChatRequest, ChatResponse, ModelResponse, TokenUsage};

const PROVIDER_NAME: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";

/// Anthropic API request payload.
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

/// Anthropic API response.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    id: String,
    model: String,
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

/// Anthropic messages adapter.
///
/// The messages API makes `max_tokens` mandatory on the wire, so a default
/// of 1024 is always sent; tune it per deployment with
/// [`AnthropicClient::with_max_tokens`].
#[derive(Debug)]
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    /// Where requests go; tests point this at wiremock.
    base_url: String,
}

impl AnthropicClient {
    /// Build an adapter for `model`, taking the key from `ANTHROPIC_API_KEY`.
    ///
    /// # Errors
    ///
    /// Fails with `ConfigError::Validation` when the variable is absent.
    pub fn from_env(model: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: super::key_from_env("ANTHROPIC_API_KEY")?,
            model: model.into(),
            max_tokens: 1024,
            temperature: 1.0,
            timeout: Duration::from_secs(60),
            base_url: "https://api.anthropic.com".to_string(),
        })
    }

    /// Cap on generated tokens, forwarded as the wire-level `max_tokens`.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sampling temperature; Anthropic accepts values in `[0.0, 1.0]`.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Per-attempt deadline enforced by the HTTP client.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Redirect traffic to a compatible endpoint or a mock server.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Split the normalized conversation into Anthropic's system string plus
    /// alternating user/assistant messages.
    fn build_payload(&self, request: &ChatRequest) -> AnthropicRequest {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut messages: Vec<AnthropicMessage> = Vec::new();

        for msg in request.message_history.iter().chain([&request.message]) {
            match msg.role.as_str() {
                "system" => system_parts.push(&msg.content),
                "model" | "assistant" => messages.push(AnthropicMessage {
                    role: "assistant".to_string(),
                    content: msg.content.clone(),
                }),
                _ => messages.push(AnthropicMessage {
                    role: "user".to_string(),
                    content: msg.content.clone(),
                }),
            }
        }

        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages,
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n"))
            },
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        let payload = self.build_payload(request);

        tracing::debug!(model = %self.model, "anthropic chat request");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "anthropic chat request failed");
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let completion: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        let text = completion
            .content
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(ClientError::EmptyResponse);
        }

        let usage = completion.usage;
        Ok(ChatResponse {
            id: completion.id.clone(),
            created: unix_now(),
            provider: PROVIDER_NAME.to_string(),
            model_name: completion.model,
            cached: false,
            model_response: ModelResponse {
                system_id: HashMap::from([("messageId".to_string(), completion.id)]),
                message: ChatMessage::model(text),
                token_usage: TokenUsage {
                    prompt_tokens: usage.input_tokens,
                    response_tokens: usage.output_tokens,
                    total_tokens: usage.input_tokens + usage.output_tokens,
                },
            },
        })
    }

    fn id(&self) -> &str {
        PROVIDER_NAME
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
