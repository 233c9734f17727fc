//! Relay WebSocket handler
//!
//! # Protocol
//!
//! ## Client → Relay (JSON text frames)
//!
//! - **model_selection**: `{model, mode?, provider?}`, honored once
//! - **video_frame**: `{data, timestamp?}` base64 JPEG
//! - **audio_chunk**: `{data, mimeType?, timestamp?}` base64 audio
//! - **text**: `{text}` user turn
//!
//! ## Relay → Client
//!
//! Every frame is `{text?, error?, type?}`. `type` marks status, welcome,
//! streaming (`partial` / `complete`) and turn events; `error` carries a short
//! stable label, never a raw provider payload.

mod handler;

pub use handler::relay_handler;
