//! Configuration settings for the gateward daemon.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::auth::RateLimitConfig;
use crate::error::GateError;

/// Main configuration structure for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    /// Declarative webhook source table.
    #[serde(default, rename = "webhook")]
    pub webhooks: Vec<WebhookSourceConfig>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// Security configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Single-use nonce time-to-live in seconds.
    #[serde(default = "default_nonce_ttl")]
    pub nonce_ttl_seconds: u64,
    /// Maximum age of signed messages and webhook timestamps in seconds.
    #[serde(default = "default_timestamp_tolerance")]
    pub timestamp_tolerance_seconds: u64,
    /// Tolerated clock skew for timestamps from the future, in seconds.
    #[serde(default = "default_future_skew")]
    pub future_skew_seconds: u64,
    /// Bearer token lifetime in seconds.
    #[serde(default = "default_bearer_ttl")]
    pub bearer_ttl_seconds: u64,
    /// Addresses granted the admin flag in derived auth contexts.
    #[serde(default)]
    pub admin_addresses: Vec<String>,
    /// Interval between expiry sweeps of nonce and rate-limit state.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Rate-limit preset applied to the recovery endpoint.
    #[serde(default = "default_recovery_preset")]
    pub recovery_rate_preset: String,
}

/// One webhook source and its header conventions.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSourceConfig {
    /// Source name; becomes the `/webhooks/{source}` path segment.
    pub name: String,
    /// Environment variable holding the shared secret.
    ///
    /// An unset variable leaves the source unconfigured and every request
    /// to it is rejected (fail-closed), never trusted by default.
    pub secret_env: Option<String>,
    /// Inline secret, mainly for tests. `secret_env` wins when both are set.
    pub secret: Option<String>,
    /// Accepted signature header names, in preference order.
    #[serde(default = "default_signature_headers")]
    pub signature_headers: Vec<String>,
    /// Accepted timestamp header names, in preference order.
    #[serde(default = "default_timestamp_headers")]
    pub timestamp_headers: Vec<String>,
    /// Whether the digest is bound to the timestamp (`"{ts}.{body}"`).
    #[serde(default)]
    pub bind_timestamp: bool,
    /// Rate-limit preset name for this source.
    #[serde(default = "default_webhook_preset")]
    pub rate_preset: String,
}

impl WebhookSourceConfig {
    /// Resolve the shared secret for this source, if configured.
    pub fn resolve_secret(&self) -> Option<Vec<u8>> {
        if let Some(var) = &self.secret_env {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    return Some(value.into_bytes());
                }
            }
        }
        self.secret
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| s.clone().into_bytes())
    }

    /// Rate-limit config for this source.
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig::preset(&self.rate_preset).unwrap_or(RateLimitConfig::STANDARD)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Path to the audit log file.
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,
}

// Default value functions

fn default_bind() -> String {
    "127.0.0.1:8444".to_string()
}

fn default_nonce_ttl() -> u64 {
    300
}

fn default_timestamp_tolerance() -> u64 {
    300
}

fn default_future_skew() -> u64 {
    60
}

fn default_bearer_ttl() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    120
}

fn default_recovery_preset() -> String {
    "auth".to_string()
}

fn default_webhook_preset() -> String {
    "standard".to_string()
}

fn default_signature_headers() -> Vec<String> {
    vec![
        "x-webhook-signature".to_string(),
        "x-signature".to_string(),
    ]
}

fn default_timestamp_headers() -> Vec<String> {
    vec![
        "x-webhook-timestamp".to_string(),
        "x-timestamp".to_string(),
    ]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("/var/log/gateward/audit.log")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            nonce_ttl_seconds: default_nonce_ttl(),
            timestamp_tolerance_seconds: default_timestamp_tolerance(),
            future_skew_seconds: default_future_skew(),
            bearer_ttl_seconds: default_bearer_ttl(),
            admin_addresses: Vec::new(),
            sweep_interval_seconds: default_sweep_interval(),
            recovery_rate_preset: default_recovery_preset(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            log_path: default_audit_log_path(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GateError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| GateError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        let settings: Settings = toml::from_str(&content).map_err(|e| GateError::Config {
            message: format!("Failed to parse config file '{}': {}", path.display(), e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), GateError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(GateError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(GateError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        if RateLimitConfig::preset(&self.security.recovery_rate_preset).is_none() {
            return Err(GateError::Config {
                message: format!(
                    "Unknown rate-limit preset '{}'",
                    self.security.recovery_rate_preset
                ),
            });
        }

        for webhook in &self.webhooks {
            if webhook.name.is_empty()
                || !webhook
                    .name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(GateError::Config {
                    message: format!("Invalid webhook source name '{}'", webhook.name),
                });
            }
            if webhook.signature_headers.is_empty() {
                return Err(GateError::Config {
                    message: format!(
                        "Webhook source '{}' accepts no signature headers",
                        webhook.name
                    ),
                });
            }
            if RateLimitConfig::preset(&webhook.rate_preset).is_none() {
                return Err(GateError::Config {
                    message: format!(
                        "Webhook source '{}' uses unknown rate-limit preset '{}'",
                        webhook.name, webhook.rate_preset
                    ),
                });
            }
        }

        Ok(())
    }
}
