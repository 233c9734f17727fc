//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `realtime` - Relay WebSocket

pub mod api;
pub mod realtime;

pub use realtime::relay_handler;
