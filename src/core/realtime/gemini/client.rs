//! Gemini Live API session.
//!
//! Opens the BidiGenerateContent socket with the API key in the query string,
//! sends `setup` (text responses), and once the server acknowledges with
//! `setupComplete` injects the mode-specific instruction turn before
//! reporting readiness.

use async_trait::async_trait;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use zeroize::Zeroizing;

use super::codec::GeminiCodec;
use super::config::live_url;
use crate::core::realtime::RealtimeProvider;
use crate::core::realtime::SessionSettings;
use crate::core::realtime::base::{
    ConnectRequest, RealtimeError, RealtimeResult, SessionEventSender, UpstreamEnvelope,
    UpstreamSession,
};
use crate::core::realtime::transport::{SocketHandle, SocketPlan};

static CODEC: GeminiCodec = GeminiCodec;

/// One Gemini Live connection attempt.
pub struct GeminiLiveSession {
    model: String,
    generation: u64,
    socket: SocketHandle,
}

impl GeminiLiveSession {
    /// Start connecting. The handshake completes in the background.
    pub fn start(
        api_key: &Zeroizing<String>,
        settings: &SessionSettings,
        request: ConnectRequest,
        events: SessionEventSender,
    ) -> RealtimeResult<Self> {
        if api_key.is_empty() {
            return Err(RealtimeError::MissingCredentials(RealtimeProvider::Gemini));
        }

        let url = Zeroizing::new(live_url(&settings.gemini_endpoint, api_key)?.to_string());
        let ws_request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let setup_frames = CODEC.setup(&request.model).into_iter().collect();
        let post_setup_frames = CODEC
            .instruction_turn(settings.instructions_for(request.mode))
            .into_iter()
            .collect();

        let socket = SocketHandle::spawn(
            SocketPlan {
                request: ws_request,
                provider: RealtimeProvider::Gemini,
                model: request.model.clone(),
                generation: request.generation,
                connect_timeout: settings.connect_timeout,
                setup_frames,
                post_setup_frames,
                codec: &CODEC,
            },
            events,
        );

        Ok(Self {
            model: request.model,
            generation: request.generation,
            socket,
        })
    }
}

#[async_trait]
impl UpstreamSession for GeminiLiveSession {
    fn provider(&self) -> RealtimeProvider {
        RealtimeProvider::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn is_ready(&self) -> bool {
        self.socket.is_ready()
    }

    fn send(&self, envelope: UpstreamEnvelope) -> RealtimeResult<()> {
        self.socket.send(envelope)
    }

    async fn close(&mut self) {
        self.socket.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::base::SessionMode;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_missing_key_is_rejected_synchronously() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = GeminiLiveSession::start(
            &Zeroizing::new(String::new()),
            &SessionSettings::default(),
            ConnectRequest {
                provider: RealtimeProvider::Gemini,
                model: "gemini-2.0-flash-exp".to_string(),
                mode: SessionMode::VisionAudio,
                generation: 3,
            },
            tx,
        );
        assert!(matches!(
            result,
            Err(RealtimeError::MissingCredentials(RealtimeProvider::Gemini))
        ));
    }
}
