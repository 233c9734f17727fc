//! Relay policy: fallback lists, retry timing, session ceilings and queue limits.

use std::time::Duration;

use crate::core::realtime::gemini::GEMINI_LIVE_URL;
use crate::core::realtime::openai::OPENAI_REALTIME_URL;
use crate::core::realtime::{RealtimeProvider, ReconnectionConfig, SessionMode, SessionSettings};

/// Maximum session durations per provider and mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLimits {
    /// Default: 15 minutes
    pub gemini_audio_only_secs: u64,
    /// Default: 2 minutes
    pub gemini_vision_secs: u64,
    /// Default: 30 minutes
    pub openai_secs: u64,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            gemini_audio_only_secs: 15 * 60,
            gemini_vision_secs: 2 * 60,
            openai_secs: 30 * 60,
        }
    }
}

impl SessionLimits {
    pub fn limit_secs(&self, provider: RealtimeProvider, mode: SessionMode) -> u64 {
        match (provider, mode) {
            (RealtimeProvider::Gemini, SessionMode::AudioOnly) => self.gemini_audio_only_secs,
            (RealtimeProvider::Gemini, SessionMode::VisionAudio) => self.gemini_vision_secs,
            (RealtimeProvider::OpenAI, _) => self.openai_secs,
        }
    }

    /// Smallest configured ceiling.
    pub fn min_secs(&self) -> u64 {
        self.gemini_audio_only_secs
            .min(self.gemini_vision_secs)
            .min(self.openai_secs)
    }
}

/// Relay behavior shared by every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Gemini Live WebSocket endpoint
    pub gemini_endpoint: String,
    /// OpenAI Realtime WebSocket endpoint
    pub openai_endpoint: String,
    /// Tried in order after the user's selection
    pub gemini_fallback_models: Vec<String>,
    pub openai_fallback_models: Vec<String>,
    pub reconnection: ReconnectionConfig,
    /// Upstream handshake timeout. Default: 10 seconds
    pub connect_timeout_secs: u64,
    pub session_limits: SessionLimits,
    /// Reconnect this long before a session ceiling. Default: 30 seconds
    pub session_margin_secs: u64,
    /// Messages held while no session is ready. Default: 512
    pub max_pending_messages: usize,
    /// Close client sockets silent for this long. Default: 5 minutes
    pub idle_timeout_secs: u64,
    pub audio_only_instructions: Option<String>,
    pub vision_instructions: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            gemini_endpoint: GEMINI_LIVE_URL.to_string(),
            openai_endpoint: OPENAI_REALTIME_URL.to_string(),
            gemini_fallback_models: RealtimeProvider::Gemini.default_fallback_models(),
            openai_fallback_models: RealtimeProvider::OpenAI.default_fallback_models(),
            reconnection: ReconnectionConfig::default(),
            connect_timeout_secs: 10,
            session_limits: SessionLimits::default(),
            session_margin_secs: 30,
            max_pending_messages: 512,
            idle_timeout_secs: 300,
            audio_only_instructions: None,
            vision_instructions: None,
        }
    }
}

impl RelayConfig {
    pub fn fallback_models(&self, provider: RealtimeProvider) -> &[String] {
        match provider {
            RealtimeProvider::Gemini => &self.gemini_fallback_models,
            RealtimeProvider::OpenAI => &self.openai_fallback_models,
        }
    }

    pub fn session_limit(&self, provider: RealtimeProvider, mode: SessionMode) -> Duration {
        Duration::from_secs(self.session_limits.limit_secs(provider, mode))
    }

    /// Time from readiness until the proactive reconnect. Never below one second.
    pub fn renewal_delay(&self, provider: RealtimeProvider, mode: SessionMode) -> Duration {
        let limit = self.session_limits.limit_secs(provider, mode);
        Duration::from_secs(limit.saturating_sub(self.session_margin_secs).max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Settings handed to every upstream session.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            gemini_endpoint: self.gemini_endpoint.clone(),
            openai_endpoint: self.openai_endpoint.clone(),
            connect_timeout: self.connect_timeout(),
            audio_only_instructions: self.audio_only_instructions.clone(),
            vision_instructions: self.vision_instructions.clone(),
        }
    }
}
