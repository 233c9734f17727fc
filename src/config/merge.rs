//! Merge the environment layer with YAML overrides.
//!
//! Priority: YAML > environment (including `.env`) > defaults.

use std::path::PathBuf;

use super::relay::{RelayConfig, SessionLimits};
use super::yaml::{RelayYaml, TlsYaml, YamlConfig};
use super::{ConfigError, ServerConfig, TlsConfig};
use crate::core::realtime::ReconnectionConfig;

pub(crate) const DEFAULT_HOST: &str = "0.0.0.0";
pub(crate) const DEFAULT_PORT: u16 = 3001;
pub(crate) const DEFAULT_RATE_LIMIT_RPS: u32 = 60;
pub(crate) const DEFAULT_RATE_LIMIT_BURST: u32 = 10;
pub(crate) const DEFAULT_MAX_CONNECTIONS_PER_IP: u32 = 100;

pub(crate) fn merge_config(
    env: YamlConfig,
    file: Option<YamlConfig>,
) -> Result<ServerConfig, ConfigError> {
    let file = file.unwrap_or_default();

    let env_server = env.server.unwrap_or_default();
    let file_server = file.server.unwrap_or_default();
    let env_providers = env.providers.unwrap_or_default();
    let file_providers = file.providers.unwrap_or_default();
    let env_security = env.security.unwrap_or_default();
    let file_security = file.security.unwrap_or_default();

    let tls = merge_tls(file_server.tls, env_server.tls)?;

    Ok(ServerConfig {
        host: file_server
            .host
            .or(env_server.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: file_server.port.or(env_server.port).unwrap_or(DEFAULT_PORT),
        tls,
        gemini_api_key: file_providers
            .gemini_api_key
            .or(env_providers.gemini_api_key),
        openai_api_key: file_providers
            .openai_api_key
            .or(env_providers.openai_api_key),
        relay: merge_relay(
            env.relay.unwrap_or_default(),
            file.relay.unwrap_or_default(),
        ),
        cors_allowed_origins: file_security
            .cors_allowed_origins
            .or(env_security.cors_allowed_origins),
        rate_limit_requests_per_second: file_security
            .rate_limit_requests_per_second
            .or(env_security.rate_limit_requests_per_second)
            .unwrap_or(DEFAULT_RATE_LIMIT_RPS),
        rate_limit_burst_size: file_security
            .rate_limit_burst_size
            .or(env_security.rate_limit_burst_size)
            .unwrap_or(DEFAULT_RATE_LIMIT_BURST),
        max_websocket_connections: file_security
            .max_websocket_connections
            .or(env_security.max_websocket_connections),
        max_connections_per_ip: file_security
            .max_connections_per_ip
            .or(env_security.max_connections_per_ip)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS_PER_IP),
    })
}

fn merge_tls(
    file: Option<TlsYaml>,
    env: Option<TlsYaml>,
) -> Result<Option<TlsConfig>, ConfigError> {
    let file = file.unwrap_or_default();
    let env = env.unwrap_or_default();

    let cert_path = file.cert_path.or(env.cert_path);
    let key_path = file.key_path.or(env.key_path);
    let enabled = file
        .enabled
        .or(env.enabled)
        .unwrap_or(cert_path.is_some() && key_path.is_some());

    if !enabled {
        return Ok(None);
    }

    match (cert_path, key_path) {
        (Some(cert_path), Some(key_path)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert_path),
            key_path: PathBuf::from(key_path),
        })),
        _ => Err(ConfigError::Invalid(
            "TLS is enabled but cert_path or key_path is missing".to_string(),
        )),
    }
}

fn merge_relay(env: RelayYaml, file: RelayYaml) -> RelayConfig {
    let defaults = RelayConfig::default();
    let env_limits = env.session_limits.unwrap_or_default();
    let file_limits = file.session_limits.unwrap_or_default();
    let env_instructions = env.instructions.unwrap_or_default();
    let file_instructions = file.instructions.unwrap_or_default();

    RelayConfig {
        gemini_endpoint: file
            .gemini_endpoint
            .or(env.gemini_endpoint)
            .unwrap_or(defaults.gemini_endpoint),
        openai_endpoint: file
            .openai_endpoint
            .or(env.openai_endpoint)
            .unwrap_or(defaults.openai_endpoint),
        gemini_fallback_models: file
            .gemini_fallback_models
            .or(env.gemini_fallback_models)
            .unwrap_or(defaults.gemini_fallback_models),
        openai_fallback_models: file
            .openai_fallback_models
            .or(env.openai_fallback_models)
            .unwrap_or(defaults.openai_fallback_models),
        reconnection: ReconnectionConfig {
            enabled: file
                .reconnect_enabled
                .or(env.reconnect_enabled)
                .unwrap_or(defaults.reconnection.enabled),
            max_attempts: file
                .max_retries
                .or(env.max_retries)
                .unwrap_or(defaults.reconnection.max_attempts),
            transient_delay_ms: file
                .transient_retry_delay_ms
                .or(env.transient_retry_delay_ms)
                .unwrap_or(defaults.reconnection.transient_delay_ms),
            rate_limit_delay_ms: file
                .rate_limit_retry_delay_ms
                .or(env.rate_limit_retry_delay_ms)
                .unwrap_or(defaults.reconnection.rate_limit_delay_ms),
        },
        connect_timeout_secs: file
            .connect_timeout_seconds
            .or(env.connect_timeout_seconds)
            .unwrap_or(defaults.connect_timeout_secs),
        session_limits: SessionLimits {
            gemini_audio_only_secs: file_limits
                .gemini_audio_only_seconds
                .or(env_limits.gemini_audio_only_seconds)
                .unwrap_or(defaults.session_limits.gemini_audio_only_secs),
            gemini_vision_secs: file_limits
                .gemini_vision_seconds
                .or(env_limits.gemini_vision_seconds)
                .unwrap_or(defaults.session_limits.gemini_vision_secs),
            openai_secs: file_limits
                .openai_seconds
                .or(env_limits.openai_seconds)
                .unwrap_or(defaults.session_limits.openai_secs),
        },
        session_margin_secs: file
            .session_margin_seconds
            .or(env.session_margin_seconds)
            .unwrap_or(defaults.session_margin_secs),
        max_pending_messages: file
            .pending_queue_capacity
            .or(env.pending_queue_capacity)
            .unwrap_or(defaults.max_pending_messages),
        idle_timeout_secs: file
            .idle_timeout_seconds
            .or(env.idle_timeout_seconds)
            .unwrap_or(defaults.idle_timeout_secs),
        audio_only_instructions: file_instructions
            .audio_only
            .or(env_instructions.audio_only),
        vision_instructions: file_instructions.vision.or(env_instructions.vision),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::yaml::{ProvidersYaml, ServerYaml, SessionLimitsYaml};

    #[test]
    fn test_defaults_when_both_layers_empty() {
        let config = merge_config(YamlConfig::default(), None).unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.tls.is_none());
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.relay, RelayConfig::default());
        assert_eq!(config.rate_limit_requests_per_second, 60);
        assert_eq!(config.max_connections_per_ip, 100);
    }

    #[test]
    fn test_file_overrides_env() {
        let env = YamlConfig {
            server: Some(ServerYaml {
                host: Some("10.0.0.1".to_string()),
                port: Some(4000),
                tls: None,
            }),
            providers: Some(ProvidersYaml {
                gemini_api_key: Some("env-key".to_string()),
                openai_api_key: Some("env-openai".to_string()),
            }),
            ..Default::default()
        };
        let file = YamlConfig {
            server: Some(ServerYaml {
                port: Some(5000),
                ..Default::default()
            }),
            providers: Some(ProvidersYaml {
                gemini_api_key: Some("file-key".to_string()),
                openai_api_key: None,
            }),
            ..Default::default()
        };

        let config = merge_config(env, Some(file)).unwrap();
        assert_eq!(config.host, "10.0.0.1");
        assert_eq!(config.port, 5000);
        assert_eq!(config.gemini_api_key.as_deref(), Some("file-key"));
        assert_eq!(config.openai_api_key.as_deref(), Some("env-openai"));
    }

    #[test]
    fn test_relay_layers_merge_per_field() {
        let env = YamlConfig {
            relay: Some(RelayYaml {
                max_retries: Some(2),
                session_limits: Some(SessionLimitsYaml {
                    openai_seconds: Some(600),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let file = YamlConfig {
            relay: Some(RelayYaml {
                transient_retry_delay_ms: Some(250),
                gemini_fallback_models: Some(vec!["only".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let relay = merge_config(env, Some(file)).unwrap().relay.clone();
        assert_eq!(relay.reconnection.max_attempts, 2);
        assert_eq!(relay.reconnection.transient_delay_ms, 250);
        assert_eq!(relay.reconnection.rate_limit_delay_ms, 10_000);
        assert_eq!(relay.session_limits.openai_secs, 600);
        assert_eq!(relay.session_limits.gemini_vision_secs, 120);
        assert_eq!(relay.gemini_fallback_models, vec!["only".to_string()]);
    }

    #[test]
    fn test_tls_enabled_from_paths() {
        let tls = merge_tls(
            None,
            Some(TlsYaml {
                enabled: None,
                cert_path: Some("/c.pem".to_string()),
                key_path: Some("/k.pem".to_string()),
            }),
        )
        .unwrap()
        .unwrap();
        assert_eq!(tls.cert_path, PathBuf::from("/c.pem"));
    }

    #[test]
    fn test_tls_explicitly_disabled() {
        let tls = merge_tls(
            Some(TlsYaml {
                enabled: Some(false),
                ..Default::default()
            }),
            Some(TlsYaml {
                enabled: None,
                cert_path: Some("/c.pem".to_string()),
                key_path: Some("/k.pem".to_string()),
            }),
        )
        .unwrap();
        assert!(tls.is_none());
    }

    #[test]
    fn test_tls_enabled_without_paths_fails() {
        let result = merge_tls(
            Some(TlsYaml {
                enabled: Some(true),
                cert_path: Some("/c.pem".to_string()),
                key_path: None,
            }),
            None,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
