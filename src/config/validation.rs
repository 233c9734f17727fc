//! Configuration validation.

use url::Url;

use super::relay::RelayConfig;
use super::{ConfigError, ServerConfig, TlsConfig};

pub(crate) fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
    validate_server(&config.host, config.port)?;
    validate_tls(&config.tls)?;
    validate_relay(&config.relay)?;
    validate_security(config)?;
    Ok(())
}

pub(crate) fn validate_server(host: &str, port: u16) -> Result<(), ConfigError> {
    if host.trim().is_empty() {
        return Err(ConfigError::Invalid("host must not be empty".to_string()));
    }
    if port == 0 {
        return Err(ConfigError::Invalid("port must be greater than 0".to_string()));
    }
    Ok(())
}

/// Certificate and key files must exist when TLS is enabled.
pub(crate) fn validate_tls(tls: &Option<TlsConfig>) -> Result<(), ConfigError> {
    let Some(tls) = tls else {
        return Ok(());
    };
    for (label, path) in [("certificate", &tls.cert_path), ("private key", &tls.key_path)] {
        if !path.exists() {
            return Err(ConfigError::Invalid(format!(
                "TLS {label} file not found: {}",
                path.display()
            )));
        }
    }
    Ok(())
}

pub(crate) fn validate_relay(relay: &RelayConfig) -> Result<(), ConfigError> {
    validate_endpoint("gemini_endpoint", &relay.gemini_endpoint)?;
    validate_endpoint("openai_endpoint", &relay.openai_endpoint)?;

    if relay.gemini_fallback_models.is_empty() {
        return Err(ConfigError::Invalid(
            "gemini_fallback_models must contain at least one model".to_string(),
        ));
    }
    if relay.openai_fallback_models.is_empty() {
        return Err(ConfigError::Invalid(
            "openai_fallback_models must contain at least one model".to_string(),
        ));
    }

    let reconnection = &relay.reconnection;
    if reconnection.rate_limit_delay_ms < reconnection.transient_delay_ms {
        return Err(ConfigError::Invalid(format!(
            "rate_limit_retry_delay_ms ({}) must not be shorter than transient_retry_delay_ms ({})",
            reconnection.rate_limit_delay_ms, reconnection.transient_delay_ms
        )));
    }

    let shortest = relay.session_limits.min_secs();
    if relay.session_margin_secs >= shortest {
        return Err(ConfigError::Invalid(format!(
            "session_margin_seconds ({}) must be smaller than every session limit (shortest is {shortest})",
            relay.session_margin_secs
        )));
    }

    if relay.connect_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "connect_timeout_seconds must be greater than 0".to_string(),
        ));
    }
    if relay.max_pending_messages == 0 {
        return Err(ConfigError::Invalid(
            "pending_queue_capacity must be greater than 0".to_string(),
        ));
    }
    if relay.idle_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "idle_timeout_seconds must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_endpoint(name: &str, endpoint: &str) -> Result<(), ConfigError> {
    let url = Url::parse(endpoint)
        .map_err(|e| ConfigError::Invalid(format!("{name} is not a valid URL: {e}")))?;
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        scheme => Err(ConfigError::Invalid(format!(
            "{name} must use ws or wss, got {scheme}"
        ))),
    }
}

pub(crate) fn validate_security(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.rate_limit_requests_per_second == 0 {
        return Err(ConfigError::Invalid(
            "rate_limit_requests_per_second must be greater than 0".to_string(),
        ));
    }
    if config.rate_limit_burst_size == 0 {
        return Err(ConfigError::Invalid(
            "rate_limit_burst_size must be greater than 0".to_string(),
        ));
    }
    if config.max_connections_per_ip == 0 {
        return Err(ConfigError::Invalid(
            "max_connections_per_ip must be greater than 0".to_string(),
        ));
    }
    if config.max_websocket_connections == Some(0) {
        return Err(ConfigError::Invalid(
            "max_websocket_connections must be greater than 0 when set".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::ReconnectionConfig;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_default_relay_is_valid() {
        assert!(validate_relay(&RelayConfig::default()).is_ok());
    }

    #[test]
    fn test_server_validation() {
        assert!(validate_server("0.0.0.0", 3001).is_ok());
        assert!(validate_server("", 3001).is_err());
        assert!(validate_server("localhost", 0).is_err());
    }

    #[test]
    fn test_empty_fallback_list_rejected() {
        let relay = RelayConfig {
            openai_fallback_models: Vec::new(),
            ..RelayConfig::default()
        };
        let err = validate_relay(&relay).unwrap_err();
        assert!(err.to_string().contains("openai_fallback_models"));
    }

    #[test]
    fn test_delay_ordering() {
        let relay = RelayConfig {
            reconnection: ReconnectionConfig {
                transient_delay_ms: 5000,
                rate_limit_delay_ms: 1000,
                ..Default::default()
            },
            ..RelayConfig::default()
        };
        assert!(validate_relay(&relay).is_err());
    }

    #[test]
    fn test_margin_must_fit_every_ceiling() {
        let relay = RelayConfig {
            session_margin_secs: 120,
            ..RelayConfig::default()
        };
        let err = validate_relay(&relay).unwrap_err();
        assert!(err.to_string().contains("session_margin_seconds"));
    }

    #[test]
    fn test_endpoint_scheme() {
        let relay = RelayConfig {
            gemini_endpoint: "https://example.com".to_string(),
            ..RelayConfig::default()
        };
        assert!(validate_relay(&relay).is_err());

        let relay = RelayConfig {
            openai_endpoint: "not a url".to_string(),
            ..RelayConfig::default()
        };
        assert!(validate_relay(&relay).is_err());
    }

    #[test]
    fn test_tls_files_must_exist() {
        assert!(validate_tls(&None).is_ok());

        let missing = Some(TlsConfig {
            cert_path: PathBuf::from("/nonexistent/cert.pem"),
            key_path: PathBuf::from("/nonexistent/key.pem"),
        });
        assert!(validate_tls(&missing).is_err());

        let dir = TempDir::new().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        std::fs::write(&cert, "cert").unwrap();
        std::fs::write(&key, "key").unwrap();
        assert!(
            validate_tls(&Some(TlsConfig {
                cert_path: cert,
                key_path: key
            }))
            .is_ok()
        );
    }

    #[test]
    fn test_security_validation() {
        let mut config = ServerConfig::default();
        assert!(validate_security(&config).is_ok());

        config.max_websocket_connections = Some(0);
        assert!(validate_security(&config).is_err());

        config.max_websocket_connections = None;
        config.rate_limit_burst_size = 0;
        assert!(validate_security(&config).is_err());
    }
}
