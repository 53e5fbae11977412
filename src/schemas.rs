//! Normalized chat schemas
//!
//! Provider-agnostic request/response payloads crossing the router↔adapter
//! boundary. Every vendor adapter serializes *from* and deserializes *into*
//! these types; callers never see vendor JSON.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A single chat message.
///
/// `name` is optional on the wire; an absent name deserializes to an empty
/// string, and model responses always carry an empty name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub name: String,
}

impl ChatMessage {
    /// Convenience constructor for a user-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            name: String::new(),
        }
    }

    /// Convenience constructor for a model-role message.
    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: "model".to_string(),
            content: content.into(),
            name: String::new(),
        }
    }
}

/// Force dispatch to a specific configured model, bypassing the strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideParams {
    /// Configured model id the request must be served by.
    pub model_id: String,
}

/// Normalized inbound chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The current user message.
    pub message: ChatMessage,
    /// Prior conversation turns, time-ordered, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub message_history: Vec<ChatMessage>,
    /// Optional strategy bypass.
    #[serde(
        rename = "override",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub override_params: Option<OverrideParams>,
}

impl ChatRequest {
    /// Build a single-message request with no history.
    pub fn from_message(content: impl Into<String>) -> Self {
        Self {
            message: ChatMessage::user(content),
            message_history: Vec::new(),
            override_params: None,
        }
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub response_tokens: u32,
    pub total_tokens: u32,
}

/// The model-generated part of a chat response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Opaque provider-side identifiers (generation ids, trace ids, ...).
    pub system_id: HashMap<String, String>,
    /// The generated message; role is always `"model"`.
    pub message: ChatMessage,
    pub token_usage: TokenUsage,
}

/// Normalized chat response returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Provider response id.
    pub id: String,
    /// Unix seconds; provider-supplied where available, gateway-filled otherwise.
    pub created: u64,
    /// Stable provider tag (e.g. `"openai"`).
    pub provider: String,
    /// Vendor model that served the request (e.g. `"gpt-4o"`).
    pub model_name: String,
    pub cached: bool,
    pub model_response: ModelResponse,
}

/// Current wall-clock time as unix seconds, for gateway-filled `created`.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
