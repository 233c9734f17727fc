//! Base traits and types for upstream realtime sessions.
//!
//! This module defines the uniform contract every upstream provider exposes to
//! the relay: a [`WireCodec`] that translates client media into provider
//! envelopes (and provider events back into client notifications), an
//! [`UpstreamSession`] owning one provider socket for one connection attempt,
//! and an [`UpstreamConnector`] that opens sessions.
//!
//! # Supported Providers
//!
//! - Gemini Live (turn-based `setup` / `client_content` / `realtime_input` protocol)
//! - OpenAI Realtime API (event-typed `session.update` / `response.*` protocol)
//!
//! # Session Events
//!
//! Sessions never return raw provider errors. Every outcome is reported to the
//! relay as a [`SessionEvent`] tagged with the generation of the session that
//! produced it, so events from superseded sessions can be discarded.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use super::RealtimeProvider;
use super::classify::TerminationReason;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while opening or driving an upstream session.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Provider credential is not configured
    #[error("Missing credentials for provider: {0}")]
    MissingCredentials(RealtimeProvider),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Retry behavior for recoverable upstream terminations.
///
/// Transient failures and rate limiting retry the same model after a fixed
/// delay. The attempt counter is owned by the caller and reset once a session
/// reaches readiness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectionConfig {
    /// Enable automatic reconnection on recoverable terminations.
    /// Default: true
    pub enabled: bool,

    /// Maximum consecutive retries before giving up.
    /// Set to 0 for unlimited attempts.
    /// Default: 5
    pub max_attempts: u32,

    /// Delay before retrying after a transient failure (milliseconds).
    /// Default: 1000ms
    pub transient_delay_ms: u64,

    /// Delay before retrying after the provider rate limited us (milliseconds).
    /// Default: 10000ms
    pub rate_limit_delay_ms: u64,
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            transient_delay_ms: 1000,
            rate_limit_delay_ms: 10_000,
        }
    }
}

impl ReconnectionConfig {
    /// Create a config with reconnection disabled.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn transient_delay(&self) -> Duration {
        Duration::from_millis(self.transient_delay_ms)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    /// Check if more reconnection attempts are allowed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.enabled && (self.max_attempts == 0 || attempt < self.max_attempts)
    }
}

// =============================================================================
// Session Mode
// =============================================================================

const AUDIO_ONLY_INSTRUCTIONS: &str = "You are a helpful voice assistant. The user is \
talking to you through their microphone only; you cannot see them. Keep answers short \
and conversational.";

const VISION_INSTRUCTIONS: &str = "You are a helpful assistant that can see the user's \
camera and hear their microphone. Refer to what you see when it is relevant and keep \
answers short and conversational.";

/// Interaction mode chosen by the client on model selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Camera frames and microphone audio
    #[default]
    VisionAudio,
    /// Microphone audio only
    AudioOnly,
}

impl SessionMode {
    /// Map the optional `mode` field of a client selection.
    ///
    /// Only `audio_only` selects [`SessionMode::AudioOnly`]; anything else,
    /// including absence, is vision plus audio.
    pub fn from_client(mode: Option<&str>) -> Self {
        match mode.map(|m| m.trim().to_ascii_lowercase()) {
            Some(m) if m == "audio_only" || m == "audio-only" => SessionMode::AudioOnly,
            _ => SessionMode::VisionAudio,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::VisionAudio => "vision_audio",
            SessionMode::AudioOnly => "audio_only",
        }
    }

    pub fn is_audio_only(&self) -> bool {
        matches!(self, SessionMode::AudioOnly)
    }

    /// Built-in system instructions for this mode.
    pub fn default_instructions(&self) -> &'static str {
        match self {
            SessionMode::VisionAudio => VISION_INSTRUCTIONS,
            SessionMode::AudioOnly => AUDIO_ONLY_INSTRUCTIONS,
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Media and Notifications
// =============================================================================

/// Client media forwarded upstream once a session is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaInput {
    /// Base64 JPEG camera frame
    VideoFrame { data: String },
    /// Base64 audio with the client-declared MIME type (unnormalized)
    AudioChunk { data: String, mime_type: String },
    /// User text turn
    Text { text: String },
}

impl MediaInput {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MediaInput::VideoFrame { .. } => "video_frame",
            MediaInput::AudioChunk { .. } => "audio_chunk",
            MediaInput::Text { .. } => "text",
        }
    }
}

/// Notification kinds sent in the `type` field.
pub mod notification_kind {
    pub const STATUS: &str = "status";
    pub const WELCOME: &str = "welcome";
    pub const PARTIAL: &str = "partial";
    pub const COMPLETE: &str = "complete";
    pub const TURN_COMPLETE: &str = "turn_complete";
    pub const INTERRUPTED: &str = "interrupted";
    pub const USER_TRANSCRIPT: &str = "user_transcript";
    pub const SPEECH_STARTED: &str = "speech_started";
    pub const SPEECH_STOPPED: &str = "speech_stopped";
    pub const RESPONSE_DONE: &str = "response_done";
    pub const RATE_LIMITED: &str = "rate_limited";
}

/// Message delivered to the client: `{text?, error?, type?}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientNotification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ClientNotification {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn typed(kind: &str) -> Self {
        Self {
            kind: Some(kind.to_string()),
            ..Default::default()
        }
    }

    pub fn typed_text(kind: &str, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            error: None,
            kind: Some(kind.to_string()),
        }
    }

    pub fn error(label: impl Into<String>) -> Self {
        Self {
            error: Some(label.into()),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

// =============================================================================
// Wire Codec
// =============================================================================

/// Serialized provider frames produced by a [`WireCodec`].
///
/// Envelopes can only be built from codec output, so nothing else in the
/// crate assembles provider JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamEnvelope {
    frames: Vec<String>,
}

impl UpstreamEnvelope {
    pub(crate) fn single(frame: String) -> Self {
        Self {
            frames: vec![frame],
        }
    }

    pub(crate) fn from_frames(frames: Vec<String>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<String> {
        self.frames
    }
}

/// A provider frame after decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    /// Handshake acknowledgment; the session becomes ready
    SetupComplete,
    /// Something to show the client
    Notify(ClientNotification),
    /// Several notifications from one frame, in display order
    NotifyAll(Vec<ClientNotification>),
    /// Provider announced the session will end soon
    SessionEnding { time_left: Option<String> },
    /// Provider reported a fatal error
    Failed(TerminationReason),
    /// Nothing to do
    Ignored,
}

/// Translation between client media and one provider's wire format.
pub trait WireCodec: Send + Sync {
    /// Provider this codec speaks.
    fn provider(&self) -> RealtimeProvider;

    /// Translate client media into provider frames, or `None` if the provider
    /// has no use for it.
    fn to_upstream(&self, input: &MediaInput) -> Option<UpstreamEnvelope>;

    /// Decode a raw provider frame.
    fn decode(&self, raw: &str) -> UpstreamEvent;

    /// Client-facing notification for a raw provider frame, if any.
    ///
    /// Frames that decode to several notifications yield the first.
    fn from_upstream(&self, raw: &str) -> Option<ClientNotification> {
        match self.decode(raw) {
            UpstreamEvent::Notify(notification) => Some(notification),
            UpstreamEvent::NotifyAll(notifications) => notifications.into_iter().next(),
            UpstreamEvent::Failed(reason) => Some(ClientNotification::error(reason.user_label())),
            _ => None,
        }
    }
}

// =============================================================================
// Upstream Session
// =============================================================================

/// What happened on an upstream session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEventKind {
    /// Provider acknowledged the handshake
    Ready,
    /// Notification for the client
    Notify(ClientNotification),
    /// Provider warned that the session is about to end
    SessionEnding,
    /// Session is gone; carries the classified reason
    Terminated(TerminationReason),
}

/// Event emitted by an upstream session, tagged with its generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub generation: u64,
    pub kind: SessionEventKind,
}

impl SessionEvent {
    pub fn new(generation: u64, kind: SessionEventKind) -> Self {
        Self { generation, kind }
    }
}

/// Channel sessions report their events on.
pub type SessionEventSender = mpsc::UnboundedSender<SessionEvent>;

/// Parameters for one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub provider: RealtimeProvider,
    pub model: String,
    pub mode: SessionMode,
    pub generation: u64,
}

/// One provider socket for one connection attempt.
///
/// Sessions are replaced wholesale, never reconfigured.
#[async_trait]
pub trait UpstreamSession: Send + Sync {
    fn provider(&self) -> RealtimeProvider;

    fn model(&self) -> &str;

    fn generation(&self) -> u64;

    /// True between the handshake acknowledgment and the next close or error.
    fn is_ready(&self) -> bool;

    /// Queue an envelope for the provider socket.
    fn send(&self, envelope: UpstreamEnvelope) -> RealtimeResult<()>;

    /// Close the provider socket. Emits no further events.
    async fn close(&mut self);
}

/// Boxed upstream session.
pub type BoxedUpstreamSession = Box<dyn UpstreamSession>;

/// Opens upstream sessions.
///
/// `connect` returns immediately; the handshake runs in the background and
/// completes with a [`SessionEventKind::Ready`] or
/// [`SessionEventKind::Terminated`] event.
pub trait UpstreamConnector: Send + Sync {
    fn connect(
        &self,
        request: ConnectRequest,
        events: SessionEventSender,
    ) -> RealtimeResult<BoxedUpstreamSession>;
}
