//! Configuration validation engine.
//!
//! ## Responsibility
//! Validate semantic constraints on a parsed [`GatewayConfig`] that cannot
//! be expressed through the type system alone (range checks, uniqueness,
//! cross-field invariants).
//!
//! ## Guarantees
//! - Validation collects *all* errors before returning (no short-circuit)
//! - Error messages include the field path and the invalid value
//!
//! ## NOT Responsible For
//! - Parsing TOML (that belongs to `loader`)
//! - File I/O (that belongs to `loader`)

use std::collections::HashSet;

use super::GatewayConfig;

/// Errors arising from configuration parsing, validation, or I/O.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("Parse error in {file}: {source}")]
    Parse {
        /// Path of the file that failed to parse.
        file: String,
        /// Underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// One or more semantic validation rules failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A specific field has an out-of-range or contradictory value.
    #[error("Field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Dot-separated field path (e.g., "router.retry.max_attempts").
        field: String,
        /// String representation of the invalid value.
        value: String,
        /// Human-readable explanation of the constraint.
        reason: String,
    },

    /// File I/O error.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// Path of the file that could not be read.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Validate all semantic constraints on a [`GatewayConfig`].
///
/// Collects every violation before returning so the caller sees the full
/// scope of issues at once.
pub fn validate(config: &GatewayConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.gateway.name.is_empty() {
        errors.push(ConfigError::InvalidField {
            field: "gateway.name".into(),
            value: "\"\"".into(),
            reason: "must not be empty".into(),
        });
    }

    // ── Retry settings ───────────────────────────────────────────────
    if config.router.retry.max_attempts == 0 {
        errors.push(ConfigError::InvalidField {
            field: "router.retry.max_attempts".into(),
            value: "0".into(),
            reason: "must be at least 1".into(),
        });
    }

    // ── Model list ───────────────────────────────────────────────────
    if config.models.is_empty() {
        errors.push(ConfigError::InvalidField {
            field: "models".into(),
            value: "[]".into(),
            reason: "at least one model must be configured".into(),
        });
    } else if !config.models.iter().any(|m| m.enabled) {
        errors.push(ConfigError::InvalidField {
            field: "models".into(),
            value: "all disabled".into(),
            reason: "at least one model must be enabled".into(),
        });
    }

    let mut seen_ids = HashSet::new();
    for (i, model) in config.models.iter().enumerate() {
        let prefix = format!("models[{i}]");

        if model.id.is_empty() {
            errors.push(ConfigError::InvalidField {
                field: format!("{prefix}.id"),
                value: "\"\"".into(),
                reason: "must not be empty".into(),
            });
        }
        if !seen_ids.insert(model.id.as_str()) {
            errors.push(ConfigError::InvalidField {
                field: format!("{prefix}.id"),
                value: model.id.clone(),
                reason: "duplicate model id".into(),
            });
        }
        if model.weight == 0 {
            errors.push(ConfigError::InvalidField {
                field: format!("{prefix}.weight"),
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        if model.timeout_ms == 0 {
            errors.push(ConfigError::InvalidField {
                field: format!("{prefix}.timeout_ms"),
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }
        if model.latency_update_interval_ms == 0 {
            errors.push(ConfigError::InvalidField {
                field: format!("{prefix}.latency_update_interval_ms"),
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }
        if model.warmup_samples == 0 {
            errors.push(ConfigError::InvalidField {
                field: format!("{prefix}.warmup_samples"),
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        if model.latency_decay <= 0.0 || model.latency_decay >= 1.0 {
            errors.push(ConfigError::InvalidField {
                field: format!("{prefix}.latency_decay"),
                value: model.latency_decay.to_string(),
                reason: "must be strictly between 0.0 and 1.0".into(),
            });
        }
    }

    // ── Health monitor ───────────────────────────────────────────────
    if config.health.enabled && config.health.probe_interval_ms == 0 {
        errors.push(ConfigError::InvalidField {
            field: "health.probe_interval_ms".into(),
            value: "0".into(),
            reason: "must be positive when the monitor is enabled".into(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
