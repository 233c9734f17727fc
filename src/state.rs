//! Shared application state.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{RelayConfig, ServerConfig};
use crate::core::realtime::{ProviderConnector, UpstreamConnector};
use crate::relay::ConnectionRegistry;

/// Why a WebSocket connection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionLimitError {
    #[error("global connection limit reached")]
    GlobalLimitReached,
    #[error("per-IP connection limit reached")]
    PerIpLimitReached,
}

/// State shared by every handler.
///
/// Owns the configuration, the live-connection registry, the upstream
/// connector and the connection counters used by the limit middleware.
pub struct AppState {
    pub config: ServerConfig,
    pub relay_config: Arc<RelayConfig>,
    pub registry: Arc<ConnectionRegistry>,
    pub connector: Arc<dyn UpstreamConnector>,
    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, u32>,
    started_at: Instant,
}

impl AppState {
    /// Build state with the real provider connector.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let connector = Arc::new(ProviderConnector::from_config(&config));
        let configured: Vec<&str> = config
            .configured_providers()
            .iter()
            .map(|provider| provider.as_str())
            .collect();
        info!(providers = ?configured, "Upstream providers configured");
        Self::with_connector(config, connector)
    }

    /// Build state around a specific connector.
    pub fn with_connector(config: ServerConfig, connector: Arc<dyn UpstreamConnector>) -> Arc<Self> {
        let relay_config = Arc::new(config.relay.clone());
        Arc::new(Self {
            config,
            relay_config,
            registry: Arc::new(ConnectionRegistry::new()),
            connector,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
            started_at: Instant::now(),
        })
    }

    /// Reserve a WebSocket slot for `ip`.
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        let max_global = self.config.max_websocket_connections;
        self.ws_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| match max_global {
                Some(max) if current >= max => None,
                _ => Some(current + 1),
            })
            .map_err(|_| ConnectionLimitError::GlobalLimitReached)?;

        let max_per_ip = self.config.max_connections_per_ip;
        let mut count = self.ip_connections.entry(ip).or_insert(0);
        if *count >= max_per_ip {
            drop(count);
            self.ws_connections.fetch_sub(1, Ordering::SeqCst);
            return Err(ConnectionLimitError::PerIpLimitReached);
        }
        *count += 1;
        Ok(())
    }

    /// Give back a slot taken by [`AppState::try_acquire_connection`].
    pub fn release_connection(&self, ip: IpAddr) {
        let _ = self
            .ws_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_sub(1)
            });
        if let Some(mut count) = self.ip_connections.get_mut(&ip) {
            *count = count.saturating_sub(1);
        }
        self.ip_connections.remove_if(&ip, |_, count| *count == 0);
        debug!(ip = %ip, active = self.ws_connection_count(), "Connection slot released");
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::SeqCst)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> u32 {
        self.ip_connections.get(ip).map(|count| *count).unwrap_or(0)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Releases a connection slot when dropped.
pub struct ConnectionSlot {
    state: Arc<AppState>,
    ip: IpAddr,
}

impl ConnectionSlot {
    pub fn new(state: Arc<AppState>, ip: IpAddr) -> Self {
        Self { state, ip }
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.state.release_connection(self.ip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn state(max_global: Option<usize>, max_per_ip: u32) -> Arc<AppState> {
        let mut config = ServerConfig::default();
        config.max_websocket_connections = max_global;
        config.max_connections_per_ip = max_per_ip;
        AppState::new(config)
    }

    #[test]
    fn test_per_ip_limit() {
        let state = state(Some(10), 3);
        let ip: IpAddr = Ipv4Addr::new(192, 168, 1, 100).into();

        assert_eq!(state.ws_connection_count(), 0);
        for expected in 1..=3 {
            assert!(state.try_acquire_connection(ip).is_ok());
            assert_eq!(state.ip_connection_count(&ip), expected);
        }
        assert_eq!(
            state.try_acquire_connection(ip),
            Err(ConnectionLimitError::PerIpLimitReached)
        );
        assert_eq!(state.ws_connection_count(), 3);

        state.release_connection(ip);
        assert_eq!(state.ws_connection_count(), 2);
        assert!(state.try_acquire_connection(ip).is_ok());
    }

    #[test]
    fn test_global_limit() {
        let state = state(Some(5), 10);
        let ips: Vec<IpAddr> = (1..=6)
            .map(|i| Ipv4Addr::new(192, 168, 1, i).into())
            .collect();

        for ip in &ips[0..5] {
            assert!(state.try_acquire_connection(*ip).is_ok());
        }
        assert_eq!(
            state.try_acquire_connection(ips[5]),
            Err(ConnectionLimitError::GlobalLimitReached)
        );

        state.release_connection(ips[0]);
        assert!(state.try_acquire_connection(ips[5]).is_ok());
    }

    #[test]
    fn test_release_never_underflows() {
        let state = state(None, 2);
        let ip: IpAddr = Ipv4Addr::LOCALHOST.into();
        state.release_connection(ip);
        assert_eq!(state.ws_connection_count(), 0);
        assert_eq!(state.ip_connection_count(&ip), 0);
    }

    #[test]
    fn test_slot_releases_on_drop() {
        let state = state(None, 1);
        let ip: IpAddr = Ipv4Addr::LOCALHOST.into();
        state.try_acquire_connection(ip).unwrap();
        {
            let slot = ConnectionSlot::new(state.clone(), ip);
            assert_eq!(slot.ip(), ip);
            assert_eq!(state.ip_connection_count(&ip), 1);
        }
        assert_eq!(state.ip_connection_count(&ip), 0);
        assert_eq!(state.ws_connection_count(), 0);
    }
}
