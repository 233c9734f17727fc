use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Client sockets currently registered with the relay
    pub active_connections: usize,
    /// Providers with credentials
    pub providers: Vec<String>,
    pub uptime_secs: u64,
}

/// `GET /` liveness probe.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        active_connections: state.registry.len(),
        providers: state
            .config
            .configured_providers()
            .iter()
            .map(|provider| provider.as_str().to_string())
            .collect(),
        uptime_secs: state.uptime_secs(),
    })
}
