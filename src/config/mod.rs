//! Configuration module for the relay server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `relay`: Relay policy (fallbacks, retry timing, session limits)
//!
//! # Example
//! ```rust,no_run
//! use live_relay::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde_json::json;
use thiserror::Error;

mod env;
mod merge;
mod relay;
mod validation;
mod yaml;

pub use relay::{RelayConfig, SessionLimits};
pub use yaml::YamlConfig;

use crate::core::realtime::RealtimeProvider;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains:
/// - Server settings (host, port, TLS)
/// - Provider credentials
/// - Relay policy
/// - Security settings (CORS, rate limiting, connection limits)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Provider API keys
    /// Gemini Live API key
    pub gemini_api_key: Option<String>,
    /// OpenAI Realtime API key
    pub openai_api_key: Option<String>,

    pub relay: RelayConfig,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,

    // Connection limits
    /// Maximum concurrent WebSocket connections
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    /// Default: 100
    pub max_connections_per_ip: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: merge::DEFAULT_HOST.to_string(),
            port: merge::DEFAULT_PORT,
            tls: None,
            gemini_api_key: None,
            openai_api_key: None,
            relay: RelayConfig::default(),
            cors_allowed_origins: None,
            rate_limit_requests_per_second: merge::DEFAULT_RATE_LIMIT_RPS,
            rate_limit_burst_size: merge::DEFAULT_RATE_LIMIT_BURST,
            max_websocket_connections: None,
            max_connections_per_ip: merge::DEFAULT_MAX_CONNECTIONS_PER_IP,
        }
    }
}

/// Zeroize provider keys when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.gemini_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// `.env` is loaded in `main` before this is called, so its values show up
    /// as ordinary environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env = env::load()?;
        let config = merge::merge_config(env, None)?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;
        let env = env::load()?;
        let config = merge::merge_config(env, Some(yaml_config))?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Get the server address as a string in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Whether a non-empty API key is configured for the provider.
    pub fn has_api_key(&self, provider: RealtimeProvider) -> bool {
        let key = match provider {
            RealtimeProvider::Gemini => self.gemini_api_key.as_deref(),
            RealtimeProvider::OpenAI => self.openai_api_key.as_deref(),
        };
        key.is_some_and(|key| !key.trim().is_empty())
    }

    /// Providers with credentials.
    pub fn configured_providers(&self) -> Vec<RealtimeProvider> {
        [RealtimeProvider::Gemini, RealtimeProvider::OpenAI]
            .into_iter()
            .filter(|provider| self.has_api_key(*provider))
            .collect()
    }

    /// Effective configuration with secrets replaced by their presence.
    pub fn redacted(&self) -> serde_json::Value {
        let relay = &self.relay;
        json!({
            "server": {
                "host": self.host,
                "port": self.port,
                "tls": self.tls.as_ref().map(|tls| json!({
                    "cert_path": tls.cert_path.display().to_string(),
                    "key_path": tls.key_path.display().to_string(),
                })),
            },
            "providers": {
                "gemini_api_key": redact(self.gemini_api_key.as_deref()),
                "openai_api_key": redact(self.openai_api_key.as_deref()),
            },
            "relay": {
                "gemini_endpoint": relay.gemini_endpoint,
                "openai_endpoint": relay.openai_endpoint,
                "gemini_fallback_models": relay.gemini_fallback_models,
                "openai_fallback_models": relay.openai_fallback_models,
                "reconnect_enabled": relay.reconnection.enabled,
                "max_retries": relay.reconnection.max_attempts,
                "transient_retry_delay_ms": relay.reconnection.transient_delay_ms,
                "rate_limit_retry_delay_ms": relay.reconnection.rate_limit_delay_ms,
                "connect_timeout_seconds": relay.connect_timeout_secs,
                "session_margin_seconds": relay.session_margin_secs,
                "pending_queue_capacity": relay.max_pending_messages,
                "idle_timeout_seconds": relay.idle_timeout_secs,
                "session_limits": {
                    "gemini_audio_only_seconds": relay.session_limits.gemini_audio_only_secs,
                    "gemini_vision_seconds": relay.session_limits.gemini_vision_secs,
                    "openai_seconds": relay.session_limits.openai_secs,
                },
                "custom_instructions": {
                    "audio_only": relay.audio_only_instructions.is_some(),
                    "vision": relay.vision_instructions.is_some(),
                },
            },
            "security": {
                "cors_allowed_origins": self.cors_allowed_origins,
                "rate_limit_requests_per_second": self.rate_limit_requests_per_second,
                "rate_limit_burst_size": self.rate_limit_burst_size,
                "max_websocket_connections": self.max_websocket_connections,
                "max_connections_per_ip": self.max_connections_per_ip,
            },
        })
    }
}

fn redact(secret: Option<&str>) -> &'static str {
    match secret {
        Some(secret) if !secret.trim().is_empty() => "<set>",
        _ => "<unset>",
    }
}
