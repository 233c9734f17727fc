//! Environment variable layer.
//!
//! Reads every supported variable into a [`YamlConfig`] so environment and
//! file values merge field by field. Blank values count as unset.

use std::env;
use std::str::FromStr;

use super::ConfigError;
use super::yaml::{
    InstructionsYaml, ProvidersYaml, RelayYaml, SecurityYaml, ServerYaml, SessionLimitsYaml,
    TlsYaml, YamlConfig,
};

pub(crate) fn load() -> Result<YamlConfig, ConfigError> {
    let tls_cert = var("TLS_CERT_PATH");
    let tls_key = var("TLS_KEY_PATH");
    let tls_enabled = flag("TLS_ENABLED")?;
    let tls = if tls_enabled.is_some() || tls_cert.is_some() || tls_key.is_some() {
        Some(TlsYaml {
            enabled: tls_enabled,
            cert_path: tls_cert,
            key_path: tls_key,
        })
    } else {
        None
    };

    Ok(YamlConfig {
        server: Some(ServerYaml {
            host: var("HOST"),
            port: parse("PORT")?,
            tls,
        }),
        providers: Some(ProvidersYaml {
            gemini_api_key: var("GEMINI_API_KEY"),
            openai_api_key: var("OPENAI_API_KEY"),
        }),
        relay: Some(RelayYaml {
            gemini_endpoint: var("GEMINI_LIVE_ENDPOINT"),
            openai_endpoint: var("OPENAI_REALTIME_ENDPOINT"),
            gemini_fallback_models: list("GEMINI_FALLBACK_MODELS"),
            openai_fallback_models: list("OPENAI_FALLBACK_MODELS"),
            reconnect_enabled: flag("RELAY_RECONNECT_ENABLED")?,
            transient_retry_delay_ms: parse("RELAY_TRANSIENT_RETRY_DELAY_MS")?,
            rate_limit_retry_delay_ms: parse("RELAY_RATE_LIMIT_RETRY_DELAY_MS")?,
            max_retries: parse("RELAY_MAX_RETRIES")?,
            connect_timeout_seconds: parse("RELAY_CONNECT_TIMEOUT_SECONDS")?,
            session_margin_seconds: parse("RELAY_SESSION_MARGIN_SECONDS")?,
            pending_queue_capacity: parse("RELAY_PENDING_QUEUE_CAPACITY")?,
            idle_timeout_seconds: parse("RELAY_IDLE_TIMEOUT_SECONDS")?,
            session_limits: Some(SessionLimitsYaml {
                gemini_audio_only_seconds: parse("GEMINI_AUDIO_SESSION_LIMIT_SECONDS")?,
                gemini_vision_seconds: parse("GEMINI_VISION_SESSION_LIMIT_SECONDS")?,
                openai_seconds: parse("OPENAI_SESSION_LIMIT_SECONDS")?,
            }),
            instructions: Some(InstructionsYaml {
                audio_only: var("AUDIO_ONLY_INSTRUCTIONS"),
                vision: var("VISION_INSTRUCTIONS"),
            }),
        }),
        security: Some(SecurityYaml {
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS"),
            rate_limit_requests_per_second: parse("RATE_LIMIT_REQUESTS_PER_SECOND")?,
            rate_limit_burst_size: parse("RATE_LIMIT_BURST_SIZE")?,
            max_websocket_connections: parse("MAX_WEBSOCKET_CONNECTIONS")?,
            max_connections_per_ip: parse("MAX_CONNECTIONS_PER_IP")?,
        }),
    })
}

fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match var(name) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { name, value }),
        None => Ok(None),
    }
}

fn flag(name: &'static str) -> Result<Option<bool>, ConfigError> {
    match var(name) {
        Some(value) => match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidEnv { name, value }),
        },
        None => Ok(None),
    }
}

/// Comma-separated list; blank entries are dropped.
fn list(name: &str) -> Option<Vec<String>> {
    var(name).map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn cleanup() {
        unsafe {
            env::remove_var("PORT");
            env::remove_var("TLS_ENABLED");
            env::remove_var("GEMINI_FALLBACK_MODELS");
            env::remove_var("RELAY_MAX_RETRIES");
            env::remove_var("RELAY_RECONNECT_ENABLED");
        }
    }

    #[test]
    #[serial]
    fn test_list_parsing() {
        cleanup();
        unsafe {
            env::set_var("GEMINI_FALLBACK_MODELS", " a, ,b ,c");
        }
        let config = load().unwrap();
        assert_eq!(
            config.relay.unwrap().gemini_fallback_models,
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        cleanup();
    }

    #[test]
    #[serial]
    fn test_invalid_number_is_rejected() {
        cleanup();
        unsafe {
            env::set_var("RELAY_MAX_RETRIES", "many");
        }
        let err = load().unwrap_err();
        assert!(err.to_string().contains("RELAY_MAX_RETRIES"));
        cleanup();
    }

    #[test]
    #[serial]
    fn test_flags() {
        cleanup();
        unsafe {
            env::set_var("RELAY_RECONNECT_ENABLED", "off");
        }
        assert_eq!(load().unwrap().relay.unwrap().reconnect_enabled, Some(false));

        unsafe {
            env::set_var("RELAY_RECONNECT_ENABLED", "maybe");
        }
        assert!(load().is_err());
        cleanup();
    }

    #[test]
    #[serial]
    fn test_blank_values_are_unset() {
        cleanup();
        unsafe {
            env::set_var("PORT", "   ");
        }
        assert_eq!(load().unwrap().server.unwrap().port, None);
        cleanup();
    }
}
