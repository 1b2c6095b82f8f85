//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, windows ordered)
//! - Check channel identity (non-empty, unique per scope) and endpoint URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{ChannelConfig, RouterConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("health.max_quarantine_secs ({max}) is shorter than health.initial_quarantine_secs ({initial})")]
    QuarantineWindow { initial: u64, max: u64 },

    #[error("channel in scope '{scope}' has an empty id")]
    EmptyChannelId { scope: String },

    #[error("channel '{id}' appears more than once in scope '{scope}'")]
    DuplicateChannel { scope: String, id: String },

    #[error("channel '{id}' in scope '{scope}' has invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        scope: String,
        id: String,
        endpoint: String,
        reason: String,
    },

    #[error("invalid {field} '{value}'")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate a full router configuration.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let numeric = [
        ("scheduler.queue_timeout_secs", config.scheduler.queue_timeout_secs),
        ("health.failure_threshold", u64::from(config.health.failure_threshold)),
        ("health.recovery_window", u64::from(config.health.recovery_window)),
        ("health.initial_quarantine_secs", config.health.initial_quarantine_secs),
        ("health.backoff_multiplier", u64::from(config.health.backoff_multiplier)),
    ];
    for (field, value) in numeric {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.health.max_quarantine_secs < config.health.initial_quarantine_secs {
        errors.push(ValidationError::QuarantineWindow {
            initial: config.health.initial_quarantine_secs,
            max: config.health.max_quarantine_secs,
        });
    }

    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "admin.bind_address",
            value: config.admin.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if let Err(scope_errors) = validate_scopes(&config.scopes) {
        errors.extend(scope_errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate channel definitions only. Used by registries that re-read
/// channel lists without the rest of the configuration.
pub fn validate_scopes(
    scopes: &BTreeMap<String, Vec<ChannelConfig>>,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (scope, channels) in scopes {
        let mut seen = HashSet::new();
        for channel in channels {
            if channel.id.trim().is_empty() {
                errors.push(ValidationError::EmptyChannelId {
                    scope: scope.clone(),
                });
                continue;
            }
            if !seen.insert(channel.id.as_str()) {
                errors.push(ValidationError::DuplicateChannel {
                    scope: scope.clone(),
                    id: channel.id.clone(),
                });
            }
            if let Err(e) = Url::parse(&channel.endpoint) {
                errors.push(ValidationError::InvalidEndpoint {
                    scope: scope.clone(),
                    id: channel.id.clone(),
                    endpoint: channel.endpoint.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
