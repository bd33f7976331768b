//! Application configuration
//!
//! Loaded from a TOML file (default `<config_dir>/parking-service/config.toml`).
//! Every section is optional; missing keys fall back to their defaults.
//! Secrets can be supplied through the environment instead of the file:
//!
//! | Variable | Overrides |
//! |---|---|
//! | `PARKING_WEBHOOK_SECRET` | `webhook.secret` |
//! | `PARKING_GATEWAY_CLIENT_ID` | `gateway.client_id` |
//! | `PARKING_GATEWAY_CLIENT_SECRET` | `gateway.client_secret` |
//! | `DATABASE_URL` | `database.url` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{BillingPolicy, SlotCount};
use crate::infrastructure::database::DatabaseConfig;
use crate::infrastructure::gateway::HttpGatewayConfig;
use crate::shared::phone::PhoneNormalizer;
use crate::shared::retry::RetryConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parking-service")
        .join("config.toml")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub gateway: GatewayConfig,
    pub webhook: WebhookConfig,
    pub billing: BillingPolicy,
    pub phone: PhoneNormalizer,
    pub reconciliation: ReconciliationConfig,
    /// Lots created on startup when the store holds none.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lots: Vec<LotSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds to wait for in-flight requests on shutdown.
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout: 30,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout_secs: u64,
    /// Cash-in attempts per payment initiation, first one included.
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    /// `development` or `production`; omitted from requests when empty.
    pub webhook_mode: String,
    /// Country prefix stripped from numbers sent to the gateway.
    pub country_prefix: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://payments.paypack.rw/api".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            timeout_secs: 15,
            retry_attempts: 3,
            retry_backoff_ms: 500,
            webhook_mode: "production".to_string(),
            country_prefix: "+250".to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn http(&self) -> HttpGatewayConfig {
        HttpGatewayConfig {
            base_url: self.base_url.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            country_prefix: self.country_prefix.clone(),
            webhook_mode: Some(self.webhook_mode.clone()).filter(|m| !m.is_empty()),
        }
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_attempts,
            initial_delay: Duration::from_millis(self.retry_backoff_ms),
            ..RetryConfig::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// HMAC-SHA256 key shared with the gateway.
    pub secret: String,
    pub signature_header: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            signature_header: "X-Paypack-Signature".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Seconds between poll sweeps of PaymentPending sessions. 0 disables.
    pub poll_interval_secs: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotSeed {
    pub name: String,
    pub slots: i32,
    pub rate_per_minute: Decimal,
}

impl AppConfig {
    /// Load from `path`. A missing file yields the defaults; environment
    /// overrides apply in both cases.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Self::from_toml(&raw)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Write the configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(path, raw).map_err(io_err)
    }

    /// Apply secret overrides from `lookup` (the process environment in
    /// production). Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("PARKING_WEBHOOK_SECRET") {
            self.webhook.secret = v;
        }
        if let Some(v) = get("PARKING_GATEWAY_CLIENT_ID") {
            self.gateway.client_id = v;
        }
        if let Some(v) = get("PARKING_GATEWAY_CLIENT_SECRET") {
            self.gateway.client_secret = v;
        }
        if let Some(v) = get("DATABASE_URL") {
            self.database.url = v;
        }
    }

    /// Checks that need no I/O. Run before starting the server.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.webhook.secret.is_empty() {
            return invalid(
                "webhook.secret is required (or set PARKING_WEBHOOK_SECRET)".to_string(),
            );
        }
        if self.webhook.signature_header.trim().is_empty() {
            return invalid("webhook.signature_header must not be empty".to_string());
        }
        if self.gateway.retry_attempts == 0 {
            return invalid("gateway.retry_attempts must be at least 1".to_string());
        }
        if self.gateway.timeout_secs == 0 {
            return invalid("gateway.timeout_secs must be positive".to_string());
        }
        if self.database.max_connections == 0 {
            return invalid("database.max_connections must be positive".to_string());
        }
        for lot in &self.lots {
            if lot.name.trim().is_empty() {
                return invalid("lots[].name must not be empty".to_string());
            }
            SlotCount::new(lot.slots)
                .map_err(|e| ConfigError::Invalid(format!("lot '{}': {}", lot.name, e)))?;
            if lot.rate_per_minute.is_sign_negative() {
                return invalid(format!("lot '{}': rate must not be negative", lot.name));
            }
        }
        Ok(())
    }
}
