//! # Gateway configuration
//!
//! ## Responsibility
//! Parse and validate TOML gateway configuration: routing strategy, retry
//! policy, the ordered model list, health-monitor knobs, and the HTTP server
//! section.
//!
//! ## Guarantees
//! - Deterministic: same TOML input always produces the same `GatewayConfig`
//! - Validated: all semantic constraints are checked before a config is accepted
//! - Type-safe: invalid field combinations are caught at parse time via serde
//! - Schema-exportable: JSON Schema output enables IDE autocomplete
//!
//! ## NOT Responsible For
//! - Building clients, models, or the router from config (see `providers`
//!   and `router`)
//! - Reading files from disk (see `loader`)

pub mod loader;
pub mod validation;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use validation::ConfigError;

// ── Default value functions ──────────────────────────────────────────────

/// Default model weight for weighted round-robin.
fn default_weight() -> u32 {
    1
}

/// Default retry attempts per request.
fn default_max_attempts() -> u32 {
    3
}

/// Default per-attempt provider timeout: 30 000 ms.
fn default_timeout_ms() -> u64 {
    30_000
}

/// Default latency estimate freshness window: 30 000 ms.
fn default_latency_update_interval_ms() -> u64 {
    30_000
}

/// Default warm-up sample threshold.
fn default_warmup_samples() -> u32 {
    3
}

/// Default EWMA decay — weights roughly the last ~30 samples.
fn default_latency_decay() -> f64 {
    0.06
}

/// Default health probe interval: 30 000 ms.
fn default_probe_interval_ms() -> u64 {
    30_000
}

/// Default health probe timeout: 5000 ms.
fn default_probe_timeout_ms() -> u64 {
    5000
}

/// Default enabled state: true.
fn default_true() -> bool {
    true
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Root configuration for a gateway instance.
///
/// Deserialized from a TOML file and validated before use.
///
/// # Example
///
/// ```toml
/// [gateway]
/// name = "production"
///
/// [router]
/// strategy = "least_latency"
///
/// [[models]]
/// id = "primary"
/// provider = "open_ai"
/// api_model = "gpt-4o"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct GatewayConfig {
    /// Gateway identity metadata.
    pub gateway: GatewaySection,
    /// Routing strategy and retry policy.
    pub router: RouterSection,
    /// Ordered model list; order is the configured priority order.
    pub models: Vec<ModelConfig>,
    /// Background health monitor settings.
    #[serde(default)]
    pub health: HealthConfig,
    /// HTTP server settings (`web-api` feature).
    #[serde(default)]
    pub server: ServerConfig,
    /// Observability: logging format.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Gateway identity metadata.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct GatewaySection {
    /// Human-readable gateway name (e.g., "production", "staging").
    pub name: String,
    /// Optional description for documentation purposes.
    pub description: Option<String>,
}

// ── Router section ───────────────────────────────────────────────────────

/// Routing strategy and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RouterSection {
    /// Which candidate-selection strategy to use.
    pub strategy: RoutingStrategyKind,
    /// Retry policy across candidates.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Supported routing strategies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategyKind {
    /// Healthy models in configured order, first healthy first.
    Priority,
    /// Shared cursor advancing once per request.
    RoundRobin,
    /// Round-robin with `weight` consecutive turns per model.
    WeightedRoundRobin,
    /// Adaptive selection by measured response latency.
    LeastLatency,
}

/// Retry policy across candidates.
///
/// The effective per-request attempt budget is
/// `min(max_attempts, number of models)` — at most one attempt per model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum candidates attempted per request. Must be ≥ 1.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts in milliseconds. May be zero.
    #[serde(default)]
    pub inter_attempt_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            inter_attempt_delay_ms: 0,
        }
    }
}

// ── Model entries ────────────────────────────────────────────────────────

/// Supported provider backends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI chat completions API.
    OpenAi,
    /// Anthropic messages API.
    Anthropic,
    /// Cohere chat API.
    Cohere,
    /// Echo adapter for testing — returns the prompt as the completion.
    Echo,
}

/// Configuration for one upstream model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ModelConfig {
    /// Unique id of this model within the gateway.
    pub id: String,
    /// Which provider backend serves this model.
    pub provider: ProviderKind,
    /// Vendor model identifier (e.g., "gpt-4o", "command-r").
    pub api_model: String,
    /// Share of traffic under weighted round-robin. Must be ≥ 1.
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Disabled entries are skipped at router construction.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Optional API base URL override.
    pub base_url: Option<String>,
    /// Per-attempt provider timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// How long (ms) a latency estimate stays fresh before the least-latency
    /// strategy forces a re-probe.
    #[serde(default = "default_latency_update_interval_ms")]
    pub latency_update_interval_ms: u64,
    /// Latency samples required before latency-based selection is trusted.
    #[serde(default = "default_warmup_samples")]
    pub warmup_samples: u32,
    /// EWMA decay factor, in (0, 1) exclusive.
    #[serde(default = "default_latency_decay")]
    pub latency_decay: f64,
}

// ── Health monitor ───────────────────────────────────────────────────────

/// Background health monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct HealthConfig {
    /// Whether the background monitor runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// How often (ms) unhealthy models are probed.
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    /// Per-probe timeout in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            probe_interval_ms: default_probe_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

// ── Server ───────────────────────────────────────────────────────────────

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ServerConfig {
    /// IP address or hostname to bind to.
    pub host: String,
    /// TCP port the server listens on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

// ── Observability ────────────────────────────────────────────────────────

/// Observability configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable, colorized log output.
    #[default]
    Pretty,
    /// Structured JSON log output for machine consumption.
    Json,
}

/// Export the JSON Schema for `GatewayConfig`.
///
/// This enables IDE autocomplete when editing TOML config files.
///
/// # Errors
///
/// Returns `serde_json::Error` if schema serialization fails.
pub fn export_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(GatewayConfig);
    serde_json::to_string_pretty(&schema)
}
