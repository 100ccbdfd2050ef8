mod realtime;
mod reservations;
mod server;

pub use realtime::*;
pub use reservations::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub realtime_model: RealtimeModelConfig,
    #[serde(default)]
    pub reservation_store: ReservationStoreConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub tenant_config_store: TenantConfigStoreConfig,
    #[serde(default)]
    pub call_registry: CallRegistryConfig,
    #[serde(default)]
    pub event_log: EventLogConfig,
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub debug: DebugConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.realtime_model.endpoint_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "realtime_model.endpoint_url".into(),
                message: "endpoint_url must not be empty".into(),
            });
        } else if !self.realtime_model.endpoint_url.starts_with("ws://")
            && !self.realtime_model.endpoint_url.starts_with("wss://")
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "realtime_model.endpoint_url".into(),
                message: format!(
                    "endpoint_url must start with ws:// or wss:// (got \"{}\")",
                    self.realtime_model.endpoint_url
                ),
            });
        }

        if self.realtime_model.session_ready_deadline_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "realtime_model.session_ready_deadline_ms".into(),
                message: "session_ready_deadline_ms must be greater than 0".into(),
            });
        }

        if self.reservation_store.database_path.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "reservation_store.database_path".into(),
                message: "database_path must not be empty".into(),
            });
        }

        if self.notifications.email_webhook_url.is_none()
            && self.notifications.chat_webhook_url.is_none()
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "notifications".into(),
                message: "no notification transport configured; dispatch will only log".into(),
            });
        }

        if self.features.barge_in_debounce_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "features.barge_in_debounce_ms".into(),
                message: "barge_in_debounce_ms must be greater than 0".into(),
            });
        }

        if !(0.0..=1.0).contains(&self.features.vad_threshold) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "features.vad_threshold".into(),
                message: format!(
                    "vad_threshold must be within [0.0, 1.0] (got {})",
                    self.features.vad_threshold
                ),
            });
        }

        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.requests_per_second".into(),
                    message: "requests_per_second must be greater than 0".into(),
                });
            }
            if rl.burst_size == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.burst_size".into(),
                    message: "burst_size must be greater than 0".into(),
                });
            }
        }

        if self.call_registry.stale_after_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "call_registry.stale_after_secs".into(),
                message: "stale_after_secs must be greater than 0".into(),
            });
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
