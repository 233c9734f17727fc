//! Mock realtime provider servers
//!
//! Plain `ws://` servers that speak just enough of the Gemini Live and
//! OpenAI Realtime protocols for end-to-end relay tests:
//! - setup / `session.update` acknowledgement
//! - canned replies to text turns
//! - scripted close frames (model rejection, quota, rate limiting)

#![allow(dead_code)]

pub mod websocket_mock;

pub use websocket_mock::{MockProvider, MockUpstream, Rejection};

use serde_json::Value;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters and captured frames shared by every socket of one mock server.
#[derive(Default)]
pub struct MockStats {
    pub connections: AtomicU64,
    pub frames_received: AtomicU64,
    received: Mutex<Vec<Value>>,
}

impl MockStats {
    pub fn record(&self, frame: Value) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut received) = self.received.lock() {
            received.push(frame);
        }
    }

    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    /// Every JSON frame received so far, across all sockets.
    pub fn received(&self) -> Vec<Value> {
        self.received
            .lock()
            .map(|received| received.clone())
            .unwrap_or_default()
    }

    /// Received frames that carry the given top-level key.
    pub fn received_with_key(&self, key: &str) -> Vec<Value> {
        self.received()
            .into_iter()
            .filter(|frame| frame.get(key).is_some())
            .collect()
    }

    /// Received frames with the given OpenAI event `type`.
    pub fn received_of_type(&self, kind: &str) -> Vec<Value> {
        self.received()
            .into_iter()
            .filter(|frame| frame.get("type").and_then(Value::as_str) == Some(kind))
            .collect()
    }
}
