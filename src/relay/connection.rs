//! Per-connection relay state machine.
//!
//! A [`RelayConnection`] owns everything about one client socket: the current
//! upstream session, the pending queue, the retry and session-boundary
//! deadlines, and the model attempt list. All of it is driven from a single
//! dispatch loop (see [`crate::handlers::realtime`]), so nothing here is
//! shared or locked.
//!
//! # States
//!
//! ```text
//! AwaitingSelection -> Connecting(i) -> Ready(i) -> Reconnecting(i) -> Connecting(i)
//!                          |               |
//!                          +---------------+--> Connecting(i+1)   (model unsupported)
//!                          +---------------+--> Terminal          (quota, auth, exhausted)
//! ```
//!
//! Every path that would open a new upstream session first checks the
//! connection registry; a connection that is gone never gets one.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, trace, warn};

use super::fallback::ModelAttemptList;
use super::messages::RelayIncomingMessage;
use super::registry::{ConnectionId, ConnectionRegistry};
use crate::config::RelayConfig;
use crate::core::realtime::{
    BoxedUpstreamSession, ClientNotification, ConnectRequest, MediaInput, RealtimeError,
    RealtimeProvider, SessionEvent, SessionEventKind, SessionEventSender, SessionMode,
    TerminationKind, TerminationReason, UpstreamConnector, codec_for, notification_kind,
};

/// Client-facing labels for relay-level failures.
pub mod labels {
    pub const PROCESSING_FAILED: &str = "Failed to process message";
    pub const NO_MODELS_AVAILABLE: &str = "No models available. Please try again later.";
    pub const CONNECTION_LOST: &str = "Connection to the AI provider was lost";
    pub const NOT_CONFIGURED: &str = "The selected AI provider is not configured";
}

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Waiting for the first `model_selection`
    AwaitingSelection,
    /// Handshake in progress for attempt `i`
    Connecting(usize),
    /// Upstream acknowledged setup for attempt `i`
    Ready(usize),
    /// Waiting to reopen attempt `i`
    Reconnecting(usize),
    /// Gave up; the client socket stays open but nothing is forwarded
    Terminal,
    /// Client went away
    Closed,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayState::AwaitingSelection => write!(f, "AwaitingSelection"),
            RelayState::Connecting(i) => write!(f, "Connecting({i})"),
            RelayState::Ready(i) => write!(f, "Ready({i})"),
            RelayState::Reconnecting(i) => write!(f, "Reconnecting({i})"),
            RelayState::Terminal => write!(f, "Terminal"),
            RelayState::Closed => write!(f, "Closed"),
        }
    }
}

/// Something the dispatch loop must handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayWake {
    Session(SessionEvent),
    ReconnectDue,
    SessionBoundary,
}

#[derive(Debug)]
struct Binding {
    provider: RealtimeProvider,
    mode: SessionMode,
    attempts: ModelAttemptList,
}

/// Relay for one client connection.
pub struct RelayConnection {
    id: ConnectionId,
    registry: Arc<ConnectionRegistry>,
    connector: Arc<dyn UpstreamConnector>,
    config: Arc<RelayConfig>,
    client: mpsc::Sender<ClientNotification>,
    events_tx: SessionEventSender,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    state: RelayState,
    binding: Option<Binding>,
    session: Option<BoxedUpstreamSession>,
    generation: u64,
    pending: VecDeque<MediaInput>,
    reconnect_at: Option<Instant>,
    session_deadline: Option<Instant>,
    retry_attempts: u32,
    welcomed: bool,
}

impl RelayConnection {
    pub fn new(
        id: ConnectionId,
        registry: Arc<ConnectionRegistry>,
        connector: Arc<dyn UpstreamConnector>,
        config: Arc<RelayConfig>,
        client: mpsc::Sender<ClientNotification>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            id,
            registry,
            connector,
            config,
            client,
            events_tx,
            events_rx,
            state: RelayState::AwaitingSelection,
            binding: None,
            session: None,
            generation: 0,
            pending: VecDeque::new(),
            reconnect_at: None,
            session_deadline: None,
            retry_attempts: 0,
            welcomed: false,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Generation of the current upstream session (0 before the first).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, RelayState::Ready(_))
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn provider(&self) -> Option<RealtimeProvider> {
        self.binding.as_ref().map(|binding| binding.provider)
    }

    pub fn current_model(&self) -> Option<&str> {
        self.binding
            .as_ref()
            .and_then(|binding| binding.attempts.current())
    }

    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    pub fn session_deadline(&self) -> Option<Instant> {
        self.session_deadline
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Wait for the next session event or timer.
    pub async fn next_wake(&mut self) -> RelayWake {
        let reconnect_at = self.reconnect_at;
        let session_deadline = self.session_deadline;
        tokio::select! {
            Some(event) = self.events_rx.recv() => RelayWake::Session(event),
            _ = sleep_until_deadline(reconnect_at) => RelayWake::ReconnectDue,
            _ = sleep_until_deadline(session_deadline) => RelayWake::SessionBoundary,
        }
    }

    pub async fn handle_wake(&mut self, wake: RelayWake) {
        match wake {
            RelayWake::Session(event) => self.handle_session_event(event).await,
            RelayWake::ReconnectDue => {
                self.reconnect_at = None;
                if matches!(self.state, RelayState::Reconnecting(_)) {
                    self.open_session().await;
                }
            }
            RelayWake::SessionBoundary => {
                self.session_deadline = None;
                self.renew_session("session_limit").await;
            }
        }
    }

    /// Wait for and handle one wake.
    pub async fn step(&mut self) {
        let wake = self.next_wake().await;
        self.handle_wake(wake).await;
    }

    // =========================================================================
    // Client messages
    // =========================================================================

    /// Handle one text frame from the client.
    pub async fn handle_client_text(&mut self, text: &str) {
        let message = match serde_json::from_str::<RelayIncomingMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(connection_id = %self.id, "Failed to parse client message: {}", e);
                self.notify(ClientNotification::error(labels::PROCESSING_FAILED))
                    .await;
                return;
            }
        };

        if let Err(e) = message.validate_size() {
            warn!(connection_id = %self.id, "Client message validation failed: {}", e);
            self.notify(ClientNotification::error(e.to_string())).await;
            return;
        }

        self.handle_client_message(message).await;
    }

    pub async fn handle_client_message(&mut self, message: RelayIncomingMessage) {
        match message {
            RelayIncomingMessage::ModelSelection {
                model,
                mode,
                provider,
            } => self.select_model(model, mode, provider).await,
            RelayIncomingMessage::Unknown => {
                debug!(connection_id = %self.id, "Ignoring unknown client message type");
            }
            other => {
                if let Some(media) = other.into_media() {
                    self.accept_media(media);
                }
            }
        }
    }

    async fn select_model(
        &mut self,
        model: String,
        mode: Option<String>,
        provider: Option<String>,
    ) {
        if self.binding.is_some() || self.state != RelayState::AwaitingSelection {
            debug!(connection_id = %self.id, model = %model, "Ignoring repeated model selection");
            return;
        }

        let provider = provider
            .as_deref()
            .and_then(RealtimeProvider::parse)
            .unwrap_or_else(|| RealtimeProvider::for_model(&model));
        let mode = SessionMode::from_client(mode.as_deref());
        let attempts = ModelAttemptList::new(&model, self.config.fallback_models(provider));

        info!(
            connection_id = %self.id,
            provider = %provider,
            model = %model,
            mode = %mode,
            candidates = attempts.len(),
            "Model selected"
        );

        let first = attempts.current().map(str::to_string);
        self.binding = Some(Binding {
            provider,
            mode,
            attempts,
        });

        match first {
            Some(first) => {
                self.registry.bind(self.id, provider, &first);
                self.notify(ClientNotification::typed_text(
                    notification_kind::STATUS,
                    format!("Connecting to {first}..."),
                ))
                .await;
                self.open_session().await;
            }
            None => self.fail(labels::NO_MODELS_AVAILABLE).await,
        }
    }

    fn accept_media(&mut self, media: MediaInput) {
        match self.state {
            RelayState::Terminal | RelayState::Closed => {
                trace!(connection_id = %self.id, kind = media.kind(), "Dropping media, relay is not active");
            }
            RelayState::Ready(_) => self.forward(&media),
            _ => self.enqueue(media),
        }
    }

    fn enqueue(&mut self, media: MediaInput) {
        if self.pending.len() >= self.config.max_pending_messages {
            if let Some(dropped) = self.pending.pop_front() {
                warn!(
                    connection_id = %self.id,
                    kind = dropped.kind(),
                    capacity = self.config.max_pending_messages,
                    "Pending queue full, dropping oldest message"
                );
            }
        }
        self.pending.push_back(media);
    }

    fn forward(&self, media: &MediaInput) {
        let (Some(binding), Some(session)) = (&self.binding, &self.session) else {
            return;
        };
        let Some(envelope) = codec_for(binding.provider).to_upstream(media) else {
            trace!(connection_id = %self.id, kind = media.kind(), "Nothing to forward for message");
            return;
        };
        if let Err(e) = session.send(envelope) {
            debug!(connection_id = %self.id, kind = media.kind(), "Failed to forward message: {}", e);
        }
    }

    // =========================================================================
    // Upstream lifecycle
    // =========================================================================

    async fn open_session(&mut self) {
        if !self.registry.is_live(self.id) {
            debug!(connection_id = %self.id, "Connection is gone, not opening upstream session");
            return;
        }

        let Some(binding) = &self.binding else {
            return;
        };
        let Some(model) = binding.attempts.current() else {
            return;
        };
        let attempt = binding.attempts.index();
        let request = ConnectRequest {
            provider: binding.provider,
            model: model.to_string(),
            mode: binding.mode,
            generation: self.generation + 1,
        };

        self.teardown_session().await;
        self.generation = request.generation;
        self.reconnect_at = None;
        self.session_deadline = None;
        self.state = RelayState::Connecting(attempt);

        info!(
            connection_id = %self.id,
            provider = %request.provider,
            model = %request.model,
            attempt,
            generation = request.generation,
            "Connecting upstream"
        );

        match self.connector.connect(request, self.events_tx.clone()) {
            Ok(session) => self.session = Some(session),
            Err(RealtimeError::MissingCredentials(provider)) => {
                error!(connection_id = %self.id, provider = %provider, "No API key configured for provider");
                self.fail(labels::NOT_CONFIGURED).await;
            }
            Err(e) => {
                warn!(connection_id = %self.id, "Failed to start upstream session: {}", e);
                self.schedule_retry(TerminationReason::transient(e.to_string()))
                    .await;
            }
        }
    }

    async fn teardown_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            debug!(
                connection_id = %self.id,
                generation = session.generation(),
                model = session.model(),
                "Closing upstream session"
            );
            session.close().await;
        }
    }

    /// Handle an event from an upstream session. Events from superseded
    /// sessions are dropped.
    pub async fn handle_session_event(&mut self, event: SessionEvent) {
        if event.generation != self.generation || self.session.is_none() {
            trace!(
                connection_id = %self.id,
                event_generation = event.generation,
                current_generation = self.generation,
                "Dropping event from stale upstream session"
            );
            return;
        }

        match event.kind {
            SessionEventKind::Ready => self.on_ready().await,
            SessionEventKind::Notify(notification) => self.notify(notification).await,
            SessionEventKind::SessionEnding => self.renew_session("provider_go_away").await,
            SessionEventKind::Terminated(reason) => self.on_terminated(reason).await,
        }
    }

    async fn on_ready(&mut self) {
        let Some(binding) = &self.binding else {
            return;
        };
        let provider = binding.provider;
        let mode = binding.mode;
        let attempt = binding.attempts.index();
        let model = binding.attempts.current().unwrap_or_default().to_string();

        self.state = RelayState::Ready(attempt);
        self.retry_attempts = 0;
        self.session_deadline = Some(Instant::now() + self.config.renewal_delay(provider, mode));
        self.registry.bind(self.id, provider, &model);

        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            debug!(connection_id = %self.id, count = pending.len(), "Flushing pending messages");
        }
        for media in &pending {
            self.forward(media);
        }

        info!(
            connection_id = %self.id,
            provider = %provider,
            model = %model,
            generation = self.generation,
            "Upstream ready"
        );

        if !self.welcomed {
            self.welcomed = true;
            self.notify(welcome_message(provider, &model, mode)).await;
        }
    }

    async fn on_terminated(&mut self, reason: TerminationReason) {
        warn!(
            connection_id = %self.id,
            model = self.current_model().unwrap_or_default(),
            kind = %reason.kind(),
            "Upstream session ended: {}",
            reason.detail()
        );
        self.teardown_session().await;

        match reason.kind() {
            TerminationKind::ModelUnsupported => self.advance_model().await,
            TerminationKind::QuotaExhausted | TerminationKind::AuthenticationFailed => {
                self.fail(reason.user_label()).await
            }
            TerminationKind::RateLimited | TerminationKind::Transient => {
                self.schedule_retry(reason).await
            }
        }
    }

    async fn advance_model(&mut self) {
        if !self.registry.is_live(self.id) {
            return;
        }
        let next = match self.binding.as_mut() {
            Some(binding) => binding.attempts.advance().map(str::to_string),
            None => return,
        };
        match next {
            Some(model) => {
                info!(connection_id = %self.id, model = %model, "Falling back to next model");
                self.retry_attempts = 0;
                self.open_session().await;
            }
            None => {
                warn!(connection_id = %self.id, "Every candidate model was rejected");
                self.fail(labels::NO_MODELS_AVAILABLE).await;
            }
        }
    }

    async fn schedule_retry(&mut self, reason: TerminationReason) {
        if !self.config.reconnection.should_retry(self.retry_attempts) {
            warn!(
                connection_id = %self.id,
                attempts = self.retry_attempts,
                "Retry budget exhausted"
            );
            self.fail(labels::CONNECTION_LOST).await;
            return;
        }

        self.retry_attempts += 1;
        let delay = match reason.kind() {
            TerminationKind::RateLimited => {
                self.notify(
                    ClientNotification::error(reason.user_label())
                        .with_kind(notification_kind::RATE_LIMITED),
                )
                .await;
                self.config.reconnection.rate_limit_delay()
            }
            _ => self.config.reconnection.transient_delay(),
        };

        let attempt = self
            .binding
            .as_ref()
            .map(|binding| binding.attempts.index())
            .unwrap_or_default();
        self.state = RelayState::Reconnecting(attempt);
        self.reconnect_at = Some(Instant::now() + delay);

        info!(
            connection_id = %self.id,
            delay_ms = delay.as_millis() as u64,
            retry = self.retry_attempts,
            "Scheduling upstream reconnect"
        );
    }

    async fn renew_session(&mut self, trigger: &str) {
        let RelayState::Ready(attempt) = self.state else {
            debug!(connection_id = %self.id, trigger, state = %self.state, "Not renewing, session is not ready");
            return;
        };
        info!(connection_id = %self.id, trigger, "Renewing upstream session");
        self.state = RelayState::Reconnecting(attempt);
        self.open_session().await;
    }

    async fn fail(&mut self, label: &str) {
        self.teardown_session().await;
        self.reconnect_at = None;
        self.session_deadline = None;
        self.pending.clear();
        self.state = RelayState::Terminal;
        self.notify(ClientNotification::error(label)).await;
    }

    async fn notify(&self, notification: ClientNotification) {
        if self.state == RelayState::Closed {
            return;
        }
        if self.client.send(notification).await.is_err() {
            trace!(connection_id = %self.id, "Client writer is gone, dropping notification");
        }
    }

    /// Tear down the upstream session, cancel both timers and leave the
    /// registry. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.state == RelayState::Closed {
            return;
        }
        self.state = RelayState::Closed;
        self.reconnect_at = None;
        self.session_deadline = None;
        self.pending.clear();
        self.teardown_session().await;
        self.registry.remove(self.id);
        info!(connection_id = %self.id, "Relay connection closed");
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn welcome_message(provider: RealtimeProvider, model: &str, mode: SessionMode) -> ClientNotification {
    let detail = match (provider, mode) {
        (RealtimeProvider::Gemini, SessionMode::VisionAudio) => "I can see your camera and hear you.",
        (RealtimeProvider::Gemini, SessionMode::AudioOnly) => "I'm listening.",
        (RealtimeProvider::OpenAI, _) => "I'm listening. Camera frames are not sent to this model.",
    };
    ClientNotification::typed_text(
        notification_kind::WELCOME,
        format!("Connected to {} ({model}). {detail}", provider.display_name()),
    )
}
