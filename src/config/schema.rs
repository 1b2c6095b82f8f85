//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the channel router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Allocation queue settings.
    pub scheduler: SchedulerConfig,

    /// Circuit breaker thresholds and quarantine backoff.
    pub health: HealthConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Channel definitions keyed by provider scope ("claude", "codex", ...).
    /// Listing order inside a scope is significant for weighted selection.
    pub scopes: BTreeMap<String, Vec<ChannelConfig>>,
}

/// Scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How long a queued allocation waits for a free channel.
    pub queue_timeout_secs: u64,
}

impl SchedulerConfig {
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_timeout_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_timeout_secs: 15,
        }
    }
}

/// Health tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Consecutive failures that put a healthy channel into quarantine.
    pub failure_threshold: u32,

    /// Consecutive successes a probing channel needs to be healthy again.
    pub recovery_window: u32,

    /// Length of the first quarantine window, in seconds.
    pub initial_quarantine_secs: u64,

    /// Upper bound for the quarantine window, in seconds.
    pub max_quarantine_secs: u64,

    /// Growth factor applied to the window after each quarantine episode.
    pub backoff_multiplier: u32,
}

impl HealthConfig {
    pub fn initial_quarantine(&self) -> Duration {
        Duration::from_secs(self.initial_quarantine_secs)
    }

    pub fn max_quarantine(&self) -> Duration {
        Duration::from_secs(self.max_quarantine_secs)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_window: 5,
            initial_quarantine_secs: 60,
            max_quarantine_secs: 30 * 60,
            backoff_multiplier: 2,
        }
    }
}

/// A single upstream channel as stored in the registry.
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Identifier, unique within its scope.
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Upstream base URL.
    pub endpoint: String,

    /// API key or token presented to the upstream.
    #[serde(default)]
    pub credential: String,

    /// Disabled channels are invisible to scheduling and health tracking.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Relative weight for weighted selection (default: 1, floor: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Maximum concurrent allocations. Absent or zero means unlimited.
    #[serde(default)]
    pub max_concurrency: Option<u32>,
}

fn default_enabled() -> bool {
    true
}

fn default_weight() -> u32 {
    1
}

impl ChannelConfig {
    /// Create an enabled, unlimited channel with weight 1.
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            endpoint: endpoint.into(),
            credential: String::new(),
            enabled: true,
            weight: 1,
            max_concurrency: None,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_max_concurrency(mut self, max: u32) -> Self {
        self.max_concurrency = Some(max);
        self
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = credential.into();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

// Credentials never reach log output.
impl fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("credential", &"<redacted>")
            .field("enabled", &self.enabled)
            .field("weight", &self.weight)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:10090".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9091".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: RouterConfig = toml::from_str("").unwrap();
        assert_eq!(config.scheduler.queue_timeout(), Duration::from_secs(15));
        assert_eq!(config.health.failure_threshold, 3);
        assert_eq!(config.health.recovery_window, 5);
        assert_eq!(config.health.initial_quarantine(), Duration::from_secs(60));
        assert_eq!(config.health.max_quarantine(), Duration::from_secs(1800));
        assert!(config.scopes.is_empty());
    }

    #[test]
    fn test_channel_defaults() {
        let config: RouterConfig = toml::from_str(
            r#"
            [[scopes.claude]]
            id = "a"
            endpoint = "https://a.example.com"
            "#,
        )
        .unwrap();

        let channel = &config.scopes["claude"][0];
        assert!(channel.enabled);
        assert_eq!(channel.weight, 1);
        assert_eq!(channel.max_concurrency, None);
    }

    #[test]
    fn test_debug_redacts_credential() {
        let channel = ChannelConfig::new("a", "https://a.example.com").with_credential("sk-secret");
        let rendered = format!("{:?}", channel);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
