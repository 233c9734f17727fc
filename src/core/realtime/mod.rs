//! Realtime upstream provider module.
//!
//! This module provides the provider side of the relay: wire codecs,
//! upstream sessions, failure classification and the connector that opens
//! sessions.
//!
//! # Supported Providers
//!
//! - **Gemini Live** - turn-based bidirectional generation (`setup` /
//!   `client_content` / `realtime_input` / `serverContent`)
//! - **OpenAI Realtime API** - event-typed protocol (`session.update` /
//!   `input_audio_buffer.append` / `response.*`)
//!
//! # Architecture
//!
//! - [`WireCodec`] translates client media to provider envelopes and provider
//!   frames to client notifications. Envelopes are built only here.
//! - [`UpstreamSession`] owns one provider socket for one connection attempt.
//! - [`UpstreamConnector`] opens sessions; [`ProviderConnector`] is the real one.
//! - [`classify`] turns close frames, HTTP statuses and error events into a
//!   [`TerminationReason`].
//!
//! # Example
//!
//! ```rust,ignore
//! use live_relay::core::realtime::{codec_for, MediaInput, RealtimeProvider};
//!
//! let codec = codec_for(RealtimeProvider::Gemini);
//! let envelope = codec.to_upstream(&MediaInput::AudioChunk {
//!     data: "AAEC".into(),
//!     mime_type: "audio/webm;codecs=opus".into(),
//! });
//! ```

mod base;
pub mod classify;
mod connector;
pub mod gemini;
pub mod media;
pub mod openai;
mod transport;

pub use base::{
    BoxedUpstreamSession, ClientNotification, ConnectRequest, MediaInput, RealtimeError,
    RealtimeResult, ReconnectionConfig, SessionEvent, SessionEventKind, SessionEventSender,
    SessionMode, UpstreamConnector, UpstreamEnvelope, UpstreamEvent, UpstreamSession, WireCodec,
    notification_kind,
};
pub use classify::{TerminationKind, TerminationReason};
pub use connector::{ProviderConnector, SessionSettings};

use gemini::GeminiCodec;
use openai::OpenAICodec;

static GEMINI_CODEC: GeminiCodec = GeminiCodec;
static OPENAI_CODEC: OpenAICodec = OpenAICodec;

/// Supported realtime providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RealtimeProvider {
    /// Gemini Live API
    Gemini,
    /// OpenAI Realtime API
    OpenAI,
}

impl RealtimeProvider {
    /// Parse provider from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" | "gemini-live" | "gemini_live" => Some(RealtimeProvider::Gemini),
            "openai" | "openai-realtime" | "openai_realtime" => Some(RealtimeProvider::OpenAI),
            _ => None,
        }
    }

    /// Infer the provider from a model id.
    ///
    /// `gpt-*` and anything containing `realtime` is OpenAI; everything else
    /// is Gemini.
    pub fn for_model(model: &str) -> Self {
        let model = model.trim().to_lowercase();
        if model.starts_with("gpt-") || model.contains("realtime") {
            RealtimeProvider::OpenAI
        } else {
            RealtimeProvider::Gemini
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RealtimeProvider::Gemini => "gemini",
            RealtimeProvider::OpenAI => "openai",
        }
    }

    /// Name used in client-facing messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            RealtimeProvider::Gemini => "Gemini",
            RealtimeProvider::OpenAI => "OpenAI Realtime",
        }
    }

    /// Built-in fallback models, in order.
    pub fn default_fallback_models(&self) -> Vec<String> {
        match self {
            RealtimeProvider::Gemini => gemini::GeminiLiveModel::default_fallbacks(),
            RealtimeProvider::OpenAI => openai::OpenAIRealtimeModel::default_fallbacks(),
        }
    }
}

impl std::fmt::Display for RealtimeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The codec for a provider.
pub fn codec_for(provider: RealtimeProvider) -> &'static dyn WireCodec {
    match provider {
        RealtimeProvider::Gemini => &GEMINI_CODEC,
        RealtimeProvider::OpenAI => &OPENAI_CODEC,
    }
}

/// Get list of supported realtime providers.
pub fn get_supported_realtime_providers() -> Vec<&'static str> {
    vec!["gemini", "openai"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_supported_providers() {
        let providers = get_supported_realtime_providers();
        assert!(providers.contains(&"gemini"));
        assert!(providers.contains(&"openai"));
        assert_eq!(providers.len(), 2);
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(
            RealtimeProvider::parse("openai"),
            Some(RealtimeProvider::OpenAI)
        );
        assert_eq!(
            RealtimeProvider::parse("OPENAI"),
            Some(RealtimeProvider::OpenAI)
        );
        assert_eq!(
            RealtimeProvider::parse("Gemini"),
            Some(RealtimeProvider::Gemini)
        );
        assert_eq!(
            RealtimeProvider::parse("google"),
            Some(RealtimeProvider::Gemini)
        );
        assert_eq!(RealtimeProvider::parse("hume"), None);
    }

    #[test]
    fn test_provider_for_model() {
        assert_eq!(
            RealtimeProvider::for_model("gpt-4o-realtime-preview"),
            RealtimeProvider::OpenAI
        );
        assert_eq!(
            RealtimeProvider::for_model("some-realtime-model"),
            RealtimeProvider::OpenAI
        );
        assert_eq!(
            RealtimeProvider::for_model("gemini-2.0-flash-exp"),
            RealtimeProvider::Gemini
        );
        assert_eq!(
            RealtimeProvider::for_model("models/gemini-live-2.5-flash-preview"),
            RealtimeProvider::Gemini
        );
    }

    #[test]
    fn test_provider_display() {
        assert_eq!(RealtimeProvider::OpenAI.to_string(), "openai");
        assert_eq!(RealtimeProvider::Gemini.to_string(), "gemini");
    }

    #[test]
    fn test_codec_for_matches_provider() {
        assert_eq!(
            codec_for(RealtimeProvider::Gemini).provider(),
            RealtimeProvider::Gemini
        );
        assert_eq!(
            codec_for(RealtimeProvider::OpenAI).provider(),
            RealtimeProvider::OpenAI
        );
    }

    #[test]
    fn test_default_fallbacks_are_non_empty() {
        assert!(!RealtimeProvider::Gemini.default_fallback_models().is_empty());
        assert!(!RealtimeProvider::OpenAI.default_fallback_models().is_empty());
    }
}
