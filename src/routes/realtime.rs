//! Relay WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::realtime::relay_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the relay WebSocket router
///
/// # Endpoint
///
/// `GET /relay` - WebSocket upgrade for the multimodal relay
///
/// # Example
///
/// ```json
/// // Client binds a model once
/// {"type": "model_selection", "model": "gemini-2.0-flash-live-001", "mode": "audio_only"}
///
/// // Relay answers
/// {"type": "status", "text": "Connecting to gemini-2.0-flash-live-001..."}
/// {"type": "welcome", "text": "Connected to Gemini (gemini-2.0-flash-live-001). I'm listening."}
///
/// // Client streams media
/// {"type": "audio_chunk", "data": "GkXfo...", "mimeType": "audio/webm;codecs=opus", "timestamp": 1712345678901}
/// ```
pub fn create_relay_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/relay", get(relay_handler))
        .layer(TraceLayer::new_for_http())
}
