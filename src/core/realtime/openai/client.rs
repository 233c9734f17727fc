//! OpenAI Realtime API session.
//!
//! Opens `wss://api.openai.com/v1/realtime?model=<model>` with bearer
//! authentication, sends `session.update` (text responses, mode-specific
//! instructions, whisper transcription, server VAD) and reports readiness when
//! the server answers with `session.updated`.

use async_trait::async_trait;
use http::HeaderValue;
use http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use zeroize::Zeroizing;

use super::codec::OpenAICodec;
use super::config::{OPENAI_BETA_HEADER, realtime_url};
use crate::core::realtime::RealtimeProvider;
use crate::core::realtime::base::{
    ConnectRequest, RealtimeError, RealtimeResult, SessionEventSender, UpstreamEnvelope,
    UpstreamSession,
};
use crate::core::realtime::transport::{SocketHandle, SocketPlan};
use crate::core::realtime::SessionSettings;

static CODEC: OpenAICodec = OpenAICodec;

/// One OpenAI Realtime connection attempt.
pub struct OpenAIRealtimeSession {
    model: String,
    generation: u64,
    socket: SocketHandle,
}

impl OpenAIRealtimeSession {
    /// Start connecting. The handshake completes in the background.
    pub fn start(
        api_key: &Zeroizing<String>,
        settings: &SessionSettings,
        request: ConnectRequest,
        events: SessionEventSender,
    ) -> RealtimeResult<Self> {
        if api_key.is_empty() {
            return Err(RealtimeError::MissingCredentials(RealtimeProvider::OpenAI));
        }

        let url = realtime_url(&settings.openai_endpoint, &request.model)?;
        let mut ws_request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let bearer = Zeroizing::new(format!("Bearer {}", api_key.as_str()));
        let mut authorization = HeaderValue::from_str(&bearer)
            .map_err(|_| RealtimeError::InvalidConfiguration("Invalid OpenAI API key".into()))?;
        authorization.set_sensitive(true);
        let headers = ws_request.headers_mut();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert("openai-beta", HeaderValue::from_static(OPENAI_BETA_HEADER));

        let instructions = settings.instructions_for(request.mode);
        let setup_frames = CODEC.session_update(instructions).into_iter().collect();

        let socket = SocketHandle::spawn(
            SocketPlan {
                request: ws_request,
                provider: RealtimeProvider::OpenAI,
                model: request.model.clone(),
                generation: request.generation,
                connect_timeout: settings.connect_timeout,
                setup_frames,
                post_setup_frames: Vec::new(),
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
impl UpstreamSession for OpenAIRealtimeSession {
    fn provider(&self) -> RealtimeProvider {
        RealtimeProvider::OpenAI
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
