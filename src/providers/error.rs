//! Provider error taxonomy and classifier
//!
//! Every failure a provider adapter can produce maps to exactly one
//! [`ClientError`] variant, and every variant classifies into exactly one
//! [`ErrorClass`]. The dispatch loop acts on the class, never on vendor
//! specifics.

use thiserror::Error;

/// How the dispatch loop should react to an adapter error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Plausibly resolved by retrying on a different model.
    Transient,
    /// Caller's fault or semantic rejection; retrying cannot help.
    NonRetryable,
    /// Account-scope quota exhaustion; retrying costs money for nothing.
    BudgetExhausted,
}

/// Errors produced by provider adapters.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The provider answered with a non-2xx status.
    #[error("provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// The provider explicitly signalled account-scope quota exhaustion.
    #[error("provider quota exhausted: {0}")]
    BudgetExhausted(String),

    /// Transport-level failure: connect error, DNS, broken connection.
    #[error("provider request failed: {0}")]
    Transport(String),

    /// The per-attempt timeout elapsed.
    #[error("provider request timed out")]
    Timeout,

    /// The provider answered 2xx but the completion text was empty.
    #[error("provider returned an empty completion")]
    EmptyResponse,

    /// The provider answered 2xx but the body did not match its schema.
    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Stable machine-readable tag, used in failure-tail detail blobs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Api { .. } => "api_error",
            Self::BudgetExhausted(_) => "budget_exhausted",
            Self::Transport(_) => "transport_error",
            Self::Timeout => "timeout",
            Self::EmptyResponse => "empty_response",
            Self::Decode(_) => "decode_error",
        }
    }

    /// Classify this error for the dispatch loop.
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::Api { status, .. } => classify_status(*status),
            Self::BudgetExhausted(_) => ErrorClass::BudgetExhausted,
            Self::Transport(_) | Self::Timeout | Self::EmptyResponse | Self::Decode(_) => {
                ErrorClass::Transient
            }
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Classify an HTTP status code.
///
/// 408 and 429 are per-request conditions a different model may not share;
/// the remaining 4xx are semantic rejections that follow the request to any
/// provider.
pub fn classify_status(status: u16) -> ErrorClass {
    match status {
        408 | 429 => ErrorClass::Transient,
        400..=499 => ErrorClass::NonRetryable,
        _ => ErrorClass::Transient,
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
