pub mod api;
pub mod realtime;

use axum::{Router, middleware};
use std::sync::Arc;

use crate::middleware::connection_limit_middleware;
use crate::state::AppState;

/// Health and relay routes with the connection limit applied to the relay.
///
/// CORS, rate limiting and security headers are layered on by the binary.
pub fn create_app_router(state: Arc<AppState>) -> Router {
    let relay_routes = realtime::create_relay_router().layer(middleware::from_fn_with_state(
        state.clone(),
        connection_limit_middleware,
    ));

    api::create_api_router()
        .merge(relay_routes)
        .with_state(state)
}
