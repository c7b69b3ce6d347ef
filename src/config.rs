// Configuration management module
// This file handles loading and validating exporter settings from
// environment variables
//
// Numan Thabit 2025 Nov

use crate::errors::ConfigError;
use crate::transport::management::ManagementSettings;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use url::Url;

pub const DEFAULT_PORT: u16 = 9090;
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_API_TIMEOUT_MS: u64 = 10_000;

/// Environment variables as read by `config::Environment` (keys lowercased).
#[derive(Debug, Deserialize)]
struct RawConfig {
    port: u16,
    rabbitmq_api_url: Option<String>,
    rabbitmq_username: Option<String>,
    rabbitmq_password: Option<String>,
    refresh_interval_ms: u64,
    rabbitmq_api_timeout: u64,
}

#[derive(Clone)]
pub struct AppConfig {
    /// Port the exposition server listens on
    pub port: u16,
    /// Base URL of the RabbitMQ management API, e.g. http://rabbitmq:15672/api
    pub api_url: Url,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Delay between two refresh cycles
    pub refresh_interval: Duration,
    /// Upper bound for one management API request
    pub api_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(config::Environment::default())
    }

    /// Load from an explicit variable map instead of the process environment.
    pub fn from_source(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::load(config::Environment::default().source(Some(vars)))
    }

    fn load(env: config::Environment) -> Result<Self, ConfigError> {
        let cfg = config::Config::builder()
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("refresh_interval_ms", DEFAULT_REFRESH_INTERVAL_MS as i64)?
            .set_default("rabbitmq_api_timeout", DEFAULT_API_TIMEOUT_MS as i64)?
            .add_source(env)
            .build()?;
        let raw: RawConfig = cfg.try_deserialize()?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let url = non_empty(raw.rabbitmq_api_url).ok_or(ConfigError::Missing("RABBITMQ_API_URL"))?;
        let api_url = Url::parse(&url).map_err(|e| ConfigError::Invalid {
            name: "RABBITMQ_API_URL",
            reason: e.to_string(),
        })?;

        if raw.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                name: "REFRESH_INTERVAL_MS",
                reason: "must be greater than zero".to_string(),
            });
        }
        if raw.rabbitmq_api_timeout == 0 {
            return Err(ConfigError::Invalid {
                name: "RABBITMQ_API_TIMEOUT",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            port: raw.port,
            api_url,
            username: non_empty(raw.rabbitmq_username),
            password: non_empty(raw.rabbitmq_password),
            refresh_interval: Duration::from_millis(raw.refresh_interval_ms),
            api_timeout: Duration::from_millis(raw.rabbitmq_api_timeout),
        })
    }

    /// Basic auth is only used when both halves are configured.
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    pub fn management_settings(&self) -> ManagementSettings {
        ManagementSettings {
            base_url: self.api_url.clone(),
            timeout: self.api_timeout,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("api_url", &self.api_url.as_str())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("refresh_interval", &self.refresh_interval)
            .field("api_timeout", &self.api_timeout)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
