//! Gemini Live API provider.
//!
//! Turn-based protocol: one `setup` message per socket, camera frames and
//! microphone audio as generic `realtime_input` media chunks, user text as
//! complete `client_content` turns. Server JSON may arrive in text or binary
//! frames.

mod client;
mod codec;
mod config;
mod messages;

pub use client::GeminiLiveSession;
pub use codec::GeminiCodec;
pub use config::{GEMINI_LIVE_URL, GeminiLiveModel, live_url, qualified_model_name};
pub use messages::{ClientMessage, ServerMessage};
