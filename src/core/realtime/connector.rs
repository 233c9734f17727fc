//! Opens upstream sessions for the relay.

use std::time::Duration;

use tracing::debug;
use zeroize::Zeroizing;

use super::RealtimeProvider;
use super::base::{
    BoxedUpstreamSession, ConnectRequest, RealtimeResult, SessionEventSender, SessionMode,
    UpstreamConnector,
};
use super::gemini::{GEMINI_LIVE_URL, GeminiLiveSession};
use super::openai::{OPENAI_REALTIME_URL, OpenAIRealtimeSession};
use crate::config::ServerConfig;

/// Per-session settings shared by both providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub gemini_endpoint: String,
    pub openai_endpoint: String,
    pub connect_timeout: Duration,
    pub audio_only_instructions: Option<String>,
    pub vision_instructions: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            gemini_endpoint: GEMINI_LIVE_URL.to_string(),
            openai_endpoint: OPENAI_REALTIME_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            audio_only_instructions: None,
            vision_instructions: None,
        }
    }
}

impl SessionSettings {
    /// Configured instructions for a mode, or the built-in wording.
    pub fn instructions_for(&self, mode: SessionMode) -> &str {
        let custom = match mode {
            SessionMode::AudioOnly => self.audio_only_instructions.as_deref(),
            SessionMode::VisionAudio => self.vision_instructions.as_deref(),
        };
        custom
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| mode.default_instructions())
    }
}

/// Connector that opens real provider sockets.
pub struct ProviderConnector {
    gemini_api_key: Zeroizing<String>,
    openai_api_key: Zeroizing<String>,
    settings: SessionSettings,
}

impl ProviderConnector {
    pub fn new(
        gemini_api_key: Option<&str>,
        openai_api_key: Option<&str>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            gemini_api_key: Zeroizing::new(gemini_api_key.unwrap_or_default().to_string()),
            openai_api_key: Zeroizing::new(openai_api_key.unwrap_or_default().to_string()),
            settings,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.gemini_api_key.as_deref(),
            config.openai_api_key.as_deref(),
            config.relay.session_settings(),
        )
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }
}

impl UpstreamConnector for ProviderConnector {
    fn connect(
        &self,
        request: ConnectRequest,
        events: SessionEventSender,
    ) -> RealtimeResult<BoxedUpstreamSession> {
        debug!(
            provider = %request.provider,
            model = %request.model,
            mode = %request.mode,
            generation = request.generation,
            "Opening upstream session"
        );
        match request.provider {
            RealtimeProvider::Gemini => Ok(Box::new(GeminiLiveSession::start(
                &self.gemini_api_key,
                &self.settings,
                request,
                events,
            )?)),
            RealtimeProvider::OpenAI => Ok(Box::new(OpenAIRealtimeSession::start(
                &self.openai_api_key,
                &self.settings,
                request,
                events,
            )?)),
        }
    }
}
