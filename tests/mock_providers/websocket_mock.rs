//! WebSocket mock servers for the realtime providers
//!
//! Gemini Live: acknowledges `setup` with a binary `setupComplete` frame and
//! answers every completed `client_content` turn with an echo.
//! OpenAI Realtime: reads the model from the upgrade URL, answers
//! `session.update` with `session.updated` and `response.create` with a
//! text delta, the final text and `response.done`.

use super::MockStats;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{WebSocketStream, accept_async, accept_hdr_async, tungstenite::Message};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockProvider {
    Gemini,
    OpenAI,
}

/// Scripted close frame sent instead of the setup acknowledgement.
#[derive(Debug, Clone)]
pub struct Rejection {
    /// Only sessions whose model contains this string; every session when `None`
    pub model: Option<String>,
    pub code: u16,
    pub reason: String,
}

impl Rejection {
    pub fn model_not_found(model: &str) -> Self {
        Self {
            model: Some(model.to_string()),
            code: 1008,
            reason: format!("models/{model} is not found for API version v1beta"),
        }
    }

    pub fn quota_exhausted() -> Self {
        Self {
            model: None,
            code: 1011,
            reason: "RESOURCE_EXHAUSTED: You exceeded your current quota".to_string(),
        }
    }

    pub fn rate_limited() -> Self {
        Self {
            model: None,
            code: 1013,
            reason: "Try again later".to_string(),
        }
    }

    fn matches(&self, model: &str) -> bool {
        self.model
            .as_deref()
            .map(|rejected| model.contains(rejected))
            .unwrap_or(true)
    }

    fn close_message(&self) -> Message {
        Message::Close(Some(CloseFrame {
            code: CloseCode::from(self.code),
            reason: self.reason.clone().into(),
        }))
    }
}

/// A running mock provider on an ephemeral local port.
pub struct MockUpstream {
    provider: MockProvider,
    addr: SocketAddr,
    pub stats: Arc<MockStats>,
    task: JoinHandle<()>,
}

impl MockUpstream {
    pub async fn start(provider: MockProvider, rejections: Vec<Rejection>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock upstream");
        let addr = listener.local_addr().expect("mock upstream address");
        let stats = Arc::new(MockStats::default());
        let rejections = Arc::new(rejections);

        let task = tokio::spawn({
            let stats = stats.clone();
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(handle_connection(
                        stream,
                        provider,
                        stats.clone(),
                        rejections.clone(),
                    ));
                }
            }
        });

        Self {
            provider,
            addr,
            stats,
            task,
        }
    }

    /// Endpoint to configure the relay with.
    pub fn endpoint(&self) -> String {
        match self.provider {
            MockProvider::Gemini => format!("ws://{}/ws/live", self.addr),
            MockProvider::OpenAI => format!("ws://{}/v1/realtime", self.addr),
        }
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle_connection(
    stream: TcpStream,
    provider: MockProvider,
    stats: Arc<MockStats>,
    rejections: Arc<Vec<Rejection>>,
) {
    stats.connections.fetch_add(1, Ordering::Relaxed);
    let result = match provider {
        MockProvider::Gemini => handle_gemini(stream, &stats, &rejections).await,
        MockProvider::OpenAI => handle_openai(stream, &stats, &rejections).await,
    };
    if let Err(e) = result {
        eprintln!("mock {provider:?} connection error: {e}");
    }
}

/// Next JSON frame from the relay, or `None` once the socket closes.
async fn next_frame(ws: &mut WebSocketStream<TcpStream>) -> Result<Option<Value>, Box<dyn std::error::Error + Send + Sync>> {
    while let Some(msg) = ws.next().await {
        let text = match msg? {
            Message::Text(text) => text.to_string(),
            Message::Binary(data) => String::from_utf8(data.to_vec())?,
            Message::Close(_) => return Ok(None),
            _ => continue,
        };
        return Ok(Some(serde_json::from_str(&text)?));
    }
    Ok(None)
}

async fn reject(ws: &mut WebSocketStream<TcpStream>, rejection: &Rejection) -> HandlerResult {
    ws.send(rejection.close_message()).await?;
    // Wait for the close handshake to finish
    while let Some(Ok(_)) = ws.next().await {}
    Ok(())
}

async fn handle_gemini(stream: TcpStream, stats: &MockStats, rejections: &[Rejection]) -> HandlerResult {
    let mut ws = accept_async(stream).await?;

    while let Some(frame) = next_frame(&mut ws).await? {
        stats.record(frame.clone());

        if let Some(setup) = frame.get("setup") {
            let model = setup["model"].as_str().unwrap_or_default();
            if let Some(rejection) = rejections.iter().find(|r| r.matches(model)) {
                return reject(&mut ws, rejection).await;
            }
            // Live API server messages arrive as binary frames
            let ack = json!({ "setupComplete": {} }).to_string();
            ws.send(Message::Binary(Bytes::from(ack))).await?;
        } else if let Some(content) = frame.get("client_content") {
            if content["turn_complete"].as_bool() != Some(true) {
                continue;
            }
            let text = content["turns"][0]["parts"][0]["text"]
                .as_str()
                .unwrap_or_default();
            let reply = json!({
                "serverContent": {
                    "modelTurn": { "parts": [{ "text": format!("echo: {text}") }] },
                    "turnComplete": true
                }
            });
            ws.send(Message::Text(reply.to_string().into())).await?;
        }
    }
    Ok(())
}

async fn handle_openai(stream: TcpStream, stats: &MockStats, rejections: &[Rejection]) -> HandlerResult {
    let mut model = String::new();
    let mut ws = accept_hdr_async(stream, |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        model = model_from_query(request.uri().query().unwrap_or_default());
        Ok(response)
    })
    .await?;

    if let Some(rejection) = rejections.iter().find(|r| r.matches(&model)) {
        return reject(&mut ws, rejection).await;
    }

    let created = json!({ "type": "session.created", "session": { "id": "sess_mock", "model": model } });
    ws.send(Message::Text(created.to_string().into())).await?;

    let mut last_text = String::new();
    while let Some(frame) = next_frame(&mut ws).await? {
        stats.record(frame.clone());

        match frame["type"].as_str().unwrap_or_default() {
            "session.update" => {
                let updated = json!({ "type": "session.updated", "session": { "id": "sess_mock", "model": model } });
                ws.send(Message::Text(updated.to_string().into())).await?;
            }
            "conversation.item.create" => {
                last_text = frame["item"]["content"][0]["text"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
            }
            "response.create" => {
                let reply = format!("echo: {last_text}");
                for event in [
                    json!({ "type": "response.text.delta", "delta": "echo: " }),
                    json!({ "type": "response.text.done", "text": reply }),
                    json!({ "type": "response.done", "response": { "id": "resp_mock", "status": "completed" } }),
                ] {
                    ws.send(Message::Text(event.to_string().into())).await?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn model_from_query(query: &str) -> String {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "model")
        .map(|(_, value)| value.to_string())
        .unwrap_or_default()
}
