use serde::Deserialize;
use std::path::Path;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. The environment
/// layer is read into the same shape so the two can be merged field by field.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   tls:
///     enabled: true
///     cert_path: "/etc/relay/cert.pem"
///     key_path: "/etc/relay/key.pem"
///
/// providers:
///   gemini_api_key: "your-gemini-key"
///   openai_api_key: "your-openai-key"
///
/// relay:
///   gemini_fallback_models:
///     - "gemini-2.0-flash-live-001"
///     - "gemini-2.0-flash-exp"
///   openai_fallback_models:
///     - "gpt-4o-realtime-preview"
///   transient_retry_delay_ms: 1000
///   rate_limit_retry_delay_ms: 10000
///   max_retries: 5
///   connect_timeout_seconds: 10
///   session_margin_seconds: 30
///   pending_queue_capacity: 512
///   idle_timeout_seconds: 300
///   session_limits:
///     gemini_audio_only_seconds: 900
///     gemini_vision_seconds: 120
///     openai_seconds: 1800
///   instructions:
///     audio_only: "You are a helpful voice assistant."
///     vision: "You can see the user's camera."
///
/// security:
///   cors_allowed_origins: "https://example.com,https://app.example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///   max_websocket_connections: 1000
///   max_connections_per_ip: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub providers: Option<ProvidersYaml>,
    pub relay: Option<RelayYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Provider credentials from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

/// Relay policy from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RelayYaml {
    pub gemini_endpoint: Option<String>,
    pub openai_endpoint: Option<String>,
    pub gemini_fallback_models: Option<Vec<String>>,
    pub openai_fallback_models: Option<Vec<String>>,
    /// Set to false to make every recoverable termination terminal
    pub reconnect_enabled: Option<bool>,
    pub transient_retry_delay_ms: Option<u64>,
    pub rate_limit_retry_delay_ms: Option<u64>,
    /// Consecutive retries before giving up (0 = unlimited)
    pub max_retries: Option<u32>,
    pub connect_timeout_seconds: Option<u64>,
    pub session_margin_seconds: Option<u64>,
    pub pending_queue_capacity: Option<usize>,
    pub idle_timeout_seconds: Option<u64>,
    pub session_limits: Option<SessionLimitsYaml>,
    pub instructions: Option<InstructionsYaml>,
}

/// Session duration ceilings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionLimitsYaml {
    pub gemini_audio_only_seconds: Option<u64>,
    pub gemini_vision_seconds: Option<u64>,
    pub openai_seconds: Option<u64>,
}

/// Custom system instructions per session mode
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct InstructionsYaml {
    pub audio_only: Option<String>,
    pub vision: Option<String>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: Option<u32>,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: Option<u32>,
    /// Maximum concurrent WebSocket connections
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: YamlConfig = serde_yaml::from_str(&contents)?;

        Ok(config)
    }
}
