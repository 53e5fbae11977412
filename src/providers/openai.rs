//! OpenAI chat adapter
//!
//! Targets the chat completions API (`POST {base}/v1/chat/completions`).
//! Requires the `OPENAI_API_KEY` environment variable.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::ClientError;
use super::ProviderClient;
use crate::config::ConfigError;
use crate::schemas::{ChatMessage, ChatRequest, ChatResponse, ModelResponse, TokenUsage};

const PROVIDER_NAME: &str = "openai";

/// OpenAI API request payload.
#[derive(Debug, Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

/// OpenAI API response.
#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    id: String,
    created: u64,
    model: String,
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: OpenAiUsage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// Error envelope OpenAI wraps failures in.
#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// OpenAI chat adapter.
///
/// Holds one pooled [`reqwest::Client`] shared across requests; generation
/// knobs are fixed at construction and sent with every call.
#[derive(Debug)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    /// Endpoint prefix; tests swap this for a local mock server.
    base_url: String,
}

impl OpenAiClient {
    /// Build an adapter for `model`, taking the key from `OPENAI_API_KEY`.
    ///
    /// # Errors
    ///
    /// Fails with `ConfigError::Validation` when the variable is absent.
    pub fn from_env(model: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_key: super::key_from_env("OPENAI_API_KEY")?,
            model: model.into(),
            max_tokens: 1024,
            temperature: 0.7,
            timeout: Duration::from_secs(30),
            base_url: "https://api.openai.com".to_string(),
        })
    }

    /// Replace the generation knobs sent with every request.
    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Bound a single attempt; retry policy stays with the router.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send requests somewhere else: an OpenAI-compatible proxy, Azure, or
    /// a mock server in tests.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn build_payload(&self, request: &ChatRequest) -> OpenAiChatRequest {
        let mut messages: Vec<OpenAiMessage> = request
            .message_history
            .iter()
            .map(to_openai_message)
            .collect();
        messages.push(to_openai_message(&request.message));

        OpenAiChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Map the normalized role vocabulary onto OpenAI's.
fn to_openai_message(msg: &ChatMessage) -> OpenAiMessage {
    let role = match msg.role.as_str() {
        "model" => "assistant",
        other => other,
    };
    OpenAiMessage {
        role: role.to_string(),
        content: msg.content.clone(),
    }
}

/// Map a non-2xx response into the error taxonomy.
///
/// `insufficient_quota` is the one account-scope signal OpenAI exposes; all
/// other failures map by status code.
fn map_api_error(status: u16, body: &str) -> ClientError {
    if let Ok(parsed) = serde_json::from_str::<OpenAiErrorBody>(body) {
        let code = parsed.error.code.as_deref();
        let kind = parsed.error.kind.as_deref();
        if code == Some("insufficient_quota") || kind == Some("insufficient_quota") {
            return ClientError::BudgetExhausted(parsed.error.message);
        }
    }
    ClientError::Api {
        status,
        message: body.to_string(),
    }
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        let payload = self.build_payload(request);

        tracing::debug!(model = %self.model, "openai chat request");

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "openai chat request failed");
            return Err(map_api_error(status.as_u16(), &body));
        }

        let completion: OpenAiChatResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        let Some(choice) = completion.choices.into_iter().next() else {
            return Err(ClientError::EmptyResponse);
        };
        if choice.message.content.is_empty() {
            return Err(ClientError::EmptyResponse);
        }

        Ok(ChatResponse {
            id: completion.id.clone(),
            created: completion.created,
            provider: PROVIDER_NAME.to_string(),
            model_name: completion.model,
            cached: false,
            model_response: ModelResponse {
                system_id: HashMap::from([("responseId".to_string(), completion.id)]),
                message: ChatMessage::model(choice.message.content),
                token_usage: TokenUsage {
                    prompt_tokens: completion.usage.prompt_tokens,
                    response_tokens: completion.usage.completion_tokens,
                    total_tokens: completion.usage.total_tokens,
                },
            },
        })
    }

    fn id(&self) -> &str {
        PROVIDER_NAME
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
