//! OpenAI Realtime API provider.
//!
//! Event-typed protocol: the relay configures the session with
//! `session.update`, appends microphone audio with
//! `input_audio_buffer.append`, and turns user text into a
//! `conversation.item.create` followed by `response.create`. Camera frames
//! have no counterpart and are dropped by the codec.
//!
//! # Example
//!
//! ```rust,ignore
//! use live_relay::core::realtime::openai::OpenAICodec;
//! use live_relay::core::realtime::{MediaInput, WireCodec};
//!
//! let envelope = OpenAICodec.to_upstream(&MediaInput::Text { text: "hi".into() });
//! assert_eq!(envelope.unwrap().frames().len(), 2);
//! ```

mod client;
mod codec;
mod config;
mod messages;

pub use client::OpenAIRealtimeSession;
pub use codec::{OpenAICodec, PROVIDER_ERROR_LABEL};
pub use config::{
    Modality, OPENAI_BETA_HEADER, OPENAI_REALTIME_URL, OPENAI_TRANSCRIPTION_MODEL,
    OpenAIRealtimeModel, realtime_url,
};
pub use messages::{ClientEvent, ServerEvent};
