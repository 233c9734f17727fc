//! Provider socket task shared by the upstream sessions.
//!
//! Each session attempt spawns one task that owns the provider WebSocket. The
//! task connects (bounded by a timeout), sends the provider's setup frames,
//! then multiplexes outgoing envelopes and incoming frames until the socket
//! closes or the session is closed locally. Incoming frames are decoded by the
//! provider's [`WireCodec`] and reported to the relay as [`SessionEvent`]s.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::RealtimeProvider;
use super::base::{
    RealtimeError, RealtimeResult, SessionEvent, SessionEventKind, SessionEventSender,
    UpstreamEnvelope, UpstreamEvent, WireCodec,
};
use super::classify::{TerminationReason, classify_close, classify_http_status};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// How long a closed socket task may run before it is aborted.
const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Everything the socket task needs for one connection attempt.
pub(crate) struct SocketPlan {
    pub request: Request,
    pub provider: RealtimeProvider,
    pub model: String,
    pub generation: u64,
    pub connect_timeout: Duration,
    /// Sent as soon as the socket opens
    pub setup_frames: Vec<String>,
    /// Sent after the provider acknowledges setup, before readiness is reported
    pub post_setup_frames: Vec<String>,
    pub codec: &'static dyn WireCodec,
}

/// Handle to a running socket task.
pub(crate) struct SocketHandle {
    outgoing: mpsc::UnboundedSender<Vec<String>>,
    ready: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SocketHandle {
    /// Spawn the socket task. Returns immediately.
    pub fn spawn(plan: SocketPlan, events: SessionEventSender) -> Self {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let ready = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let task = SocketTask {
            provider: plan.provider,
            model: plan.model.clone(),
            generation: plan.generation,
            codec: plan.codec,
            post_setup_frames: plan.post_setup_frames.clone(),
            ready: ready.clone(),
            cancel: cancel.clone(),
            events,
        };
        let handle = tokio::spawn(task.run(plan, outgoing_rx));

        Self {
            outgoing,
            ready,
            cancel,
            task: Some(handle),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn send(&self, envelope: UpstreamEnvelope) -> RealtimeResult<()> {
        if self.cancel.is_cancelled() {
            return Err(RealtimeError::NotConnected);
        }
        self.outgoing
            .send(envelope.into_frames())
            .map_err(|_| RealtimeError::NotConnected)
    }

    /// Close the socket without waiting for the task.
    ///
    /// The task gets `CLOSE_GRACE_PERIOD` to send its close frame in the
    /// background before it is aborted.
    pub fn close(&mut self) {
        self.ready.store(false, Ordering::SeqCst);
        self.cancel.cancel();

        if let Some(task) = self.task.take() {
            tokio::spawn(reap(task));
        }
    }
}

async fn reap(mut task: JoinHandle<()>) {
    if tokio::time::timeout(CLOSE_GRACE_PERIOD, &mut task)
        .await
        .is_err()
    {
        debug!("Upstream socket task did not finish in time, aborting");
        task.abort();
    }
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct SocketTask {
    provider: RealtimeProvider,
    model: String,
    generation: u64,
    codec: &'static dyn WireCodec,
    post_setup_frames: Vec<String>,
    ready: Arc<AtomicBool>,
    cancel: CancellationToken,
    events: SessionEventSender,
}

impl SocketTask {
    fn emit(&self, kind: SessionEventKind) {
        // A locally closed session reports nothing.
        if !self.cancel.is_cancelled() {
            let _ = self.events.send(SessionEvent::new(self.generation, kind));
        }
    }

    async fn run(mut self, plan: SocketPlan, mut outgoing: mpsc::UnboundedReceiver<Vec<String>>) {
        let SocketPlan {
            request,
            connect_timeout,
            setup_frames,
            ..
        } = plan;

        let connect = tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!(provider = %self.provider, model = %self.model, "Session closed before connect finished");
                return;
            }
            result = tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(request)) => result,
        };

        let ws_stream = match connect {
            Ok(Ok((ws_stream, _response))) => ws_stream,
            Ok(Err(e)) => {
                self.terminate(classify_handshake_error(&e));
                return;
            }
            Err(_) => {
                self.terminate(TerminationReason::transient(format!(
                    "connect timed out after {connect_timeout:?}"
                )));
                return;
            }
        };

        info!(
            provider = %self.provider,
            model = %self.model,
            generation = self.generation,
            "Connected to upstream provider"
        );

        let (mut sink, mut stream) = ws_stream.split();

        if let Err(e) = send_frames(&mut sink, setup_frames).await {
            self.terminate(TerminationReason::transient(format!("setup failed: {e}")));
            return;
        }

        let reason = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break None;
                }
                frames = outgoing.recv() => match frames {
                    Some(frames) => {
                        if let Err(e) = send_frames(&mut sink, frames).await {
                            break Some(TerminationReason::transient(format!("send failed: {e}")));
                        }
                    }
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        break None;
                    }
                },
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reason) = self.handle_frame(text.as_str(), &mut sink).await {
                            break Some(reason);
                        }
                    }
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => {
                            if let Some(reason) = self.handle_frame(text, &mut sink).await {
                                break Some(reason);
                            }
                        }
                        Err(_) => trace!("Ignoring non-UTF-8 binary frame ({} bytes)", data.len()),
                    },
                    Some(Ok(Message::Ping(payload))) => {
                        if let Err(e) = sink.send(Message::Pong(payload)).await {
                            break Some(TerminationReason::transient(format!("pong failed: {e}")));
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(frame) => (Some(u16::from(frame.code)), frame.reason.to_string()),
                            None => (None, String::new()),
                        };
                        break Some(classify_close(code, &reason));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Some(TerminationReason::transient(e.to_string())),
                    None => break Some(TerminationReason::transient("provider stream ended")),
                }
            }
        };

        self.ready.store(false, Ordering::SeqCst);
        match reason {
            Some(reason) => self.terminate(reason),
            None => info!(
                provider = %self.provider,
                model = %self.model,
                generation = self.generation,
                "Upstream session closed"
            ),
        }
    }

    fn terminate(&self, reason: TerminationReason) {
        warn!(
            provider = %self.provider,
            model = %self.model,
            generation = self.generation,
            kind = %reason.kind(),
            "Upstream session terminated: {}",
            reason.detail()
        );
        self.emit(SessionEventKind::Terminated(reason));
    }

    async fn handle_frame(&mut self, text: &str, sink: &mut WsSink) -> Option<TerminationReason> {
        match self.codec.decode(text) {
            UpstreamEvent::SetupComplete => {
                if self.ready.load(Ordering::SeqCst) {
                    return None;
                }
                let frames = std::mem::take(&mut self.post_setup_frames);
                if let Err(e) = send_frames(sink, frames).await {
                    return Some(TerminationReason::transient(format!("setup failed: {e}")));
                }
                self.ready.store(true, Ordering::SeqCst);
                info!(
                    provider = %self.provider,
                    model = %self.model,
                    generation = self.generation,
                    "Upstream session ready"
                );
                self.emit(SessionEventKind::Ready);
                None
            }
            UpstreamEvent::Notify(notification) => {
                self.emit(SessionEventKind::Notify(notification));
                None
            }
            UpstreamEvent::NotifyAll(notifications) => {
                for notification in notifications {
                    self.emit(SessionEventKind::Notify(notification));
                }
                None
            }
            UpstreamEvent::SessionEnding { time_left } => {
                info!(
                    provider = %self.provider,
                    model = %self.model,
                    time_left = ?time_left,
                    "Provider announced session end"
                );
                self.emit(SessionEventKind::SessionEnding);
                None
            }
            UpstreamEvent::Failed(reason) => {
                let _ = sink.send(Message::Close(None)).await;
                Some(reason)
            }
            UpstreamEvent::Ignored => None,
        }
    }
}

async fn send_frames(sink: &mut WsSink, frames: Vec<String>) -> Result<(), tungstenite::Error> {
    for frame in frames {
        sink.send(Message::Text(frame.into())).await?;
    }
    Ok(())
}

/// Classify a failed connect: HTTP rejections by status, everything else transient.
fn classify_handshake_error(error: &tungstenite::Error) -> TerminationReason {
    match error {
        tungstenite::Error::Http(response) => {
            let body = response
                .body()
                .as_ref()
                .map(|body| String::from_utf8_lossy(body).into_owned())
                .unwrap_or_default();
            classify_http_status(response.status().as_u16(), &body)
        }
        other => TerminationReason::transient(other.to_string()),
    }
}
