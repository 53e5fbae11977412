//! Echo adapter
//!
//! Returns the inbound message back as the completion after a configurable
//! delay. Useful for dispatch-loop and pipeline smoke tests without real
//! provider dependencies.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use super::error::ClientError;
use super::ProviderClient;
use crate::schemas::{unix_now, ChatMessage, ChatRequest, ChatResponse, ModelResponse, TokenUsage};

/// Testing/demo adapter that echoes the prompt.
#[derive(Debug)]
pub struct EchoClient {
    /// Simulated inference delay.
    pub delay_ms: u64,
}

impl EchoClient {
    /// Create a new `EchoClient` with a default 10 ms simulated delay.
    pub fn new() -> Self {
        Self { delay_ms: 10 }
    }

    /// Create a new `EchoClient` with a custom simulated delay in milliseconds.
    pub fn with_delay(delay_ms: u64) -> Self {
        Self { delay_ms }
    }
}

impl Default for EchoClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderClient for EchoClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;

        let words = request.message.content.split_whitespace().count() as u32;

        Ok(ChatResponse {
            id: "echo".to_string(),
            created: unix_now(),
            provider: "echo".to_string(),
            model_name: "echo".to_string(),
            cached: false,
            model_response: ModelResponse {
                system_id: HashMap::new(),
                message: ChatMessage::model(request.message.content.clone()),
                token_usage: TokenUsage {
                    prompt_tokens: words,
                    response_tokens: words,
                    total_tokens: words * 2,
                },
            },
        })
    }

    fn id(&self) -> &str {
        "echo"
    }
}
