//! Cohere chat adapter
//!
//! Targets the chat API (`POST {base}/v1/chat`). Requires the
//! `COHERE_API_KEY` environment variable. Cohere does not return a creation
//! timestamp, so `created` is gateway-filled.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::ClientError;
use super::ProviderClient;
use crate::config::ConfigError;
use crate::schemas::{unix_now, ChatMessage, ChatRequest, ChatResponse, ModelResponse, TokenUsage};

const PROVIDER_NAME: &str = "cohere";

/// Cohere API request payload.
#[derive(Debug, Serialize)]
struct CohereChatRequest {
    model: String,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    chat_history: Vec<CohereHistoryEntry>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct CohereHistoryEntry {
    role: String,
    message: String,
}

/// Cohere API response.
#[derive(Debug, Deserialize)]
struct CohereChatResponse {
    #[serde(default)]
    response_id: String,
    #[serde(default)]
    generation_id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    token_count: CohereTokenCount,
}

#[derive(Debug, Default, Deserialize)]
struct CohereTokenCount {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    response_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// Cohere chat adapter.
#[derive(Debug)]
pub struct CohereClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    timeout: Duration,
    /// Request target; tests substitute a local mock.
    base_url: String,
}

impl CohereClient {
    /// Build an adapter for `model`, taking the key from `COHERE_API_KEY`.
    ///
    /// # Errors
    ///
    /// Fails with `ConfigError::Validation` when the variable is absent.
    pub fn from_env(model: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: super::key_from_env("COHERE_API_KEY")?,
            model: model.into(),
            temperature: 0.3,
            timeout: Duration::from_secs(30),
            base_url: "https://api.cohere.ai".to_string(),
        })
    }

    /// Generation temperature forwarded on every call.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Deadline for a single attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Aim the adapter at a different host (regional endpoint, mock server).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn build_payload(&self, request: &ChatRequest) -> CohereChatRequest {
        let chat_history = request
            .message_history
            .iter()
            .map(|msg: &ChatMessage| CohereHistoryEntry {
                role: msg.role.clone(),
                message: msg.content.clone(),
            })
            .collect();

        CohereChatRequest {
            model: self.model.clone(),
            message: request.message.content.clone(),
            chat_history,
            temperature: self.temperature,
            stream: false,
        }
    }
}

#[async_trait]
impl ProviderClient for CohereClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        let payload = self.build_payload(request);

        tracing::debug!(model = %self.model, "cohere chat request");

        let response = self
            .client
            .post(format!("{}/v1/chat", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "cohere chat request failed");
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let completion: CohereChatResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        if completion.text.is_empty() {
            return Err(ClientError::EmptyResponse);
        }

        Ok(ChatResponse {
            id: completion.response_id.clone(),
            created: unix_now(),
            provider: PROVIDER_NAME.to_string(),
            model_name: self.model.clone(),
            cached: false,
            model_response: ModelResponse {
                system_id: HashMap::from([
                    ("generationId".to_string(), completion.generation_id),
                    ("responseId".to_string(), completion.response_id),
                ]),
                message: ChatMessage::model(completion.text),
                token_usage: TokenUsage {
                    prompt_tokens: completion.token_count.prompt_tokens,
                    response_tokens: completion.token_count.response_tokens,
                    total_tokens: completion.token_count.total_tokens,
                },
            },
        })
    }

    fn id(&self) -> &str {
        PROVIDER_NAME
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
