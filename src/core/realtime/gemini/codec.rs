//! Wire codec for the Gemini Live protocol.

use tracing::{debug, warn};

use super::config::qualified_model_name;
use super::messages::{
    ClientContent, ClientMessage, Content, GenerationConfig, MediaChunk, RealtimeInput,
    ServerContent, ServerMessage, Setup,
};
use crate::core::realtime::RealtimeProvider;
use crate::core::realtime::base::{
    ClientNotification, MediaInput, UpstreamEnvelope, UpstreamEvent, WireCodec,
    notification_kind,
};
use crate::core::realtime::classify::{TerminationReason, classify_error_event};
use crate::core::realtime::media::{VIDEO_FRAME_MIME_TYPE, normalize_mime_type, strip_data_url};

/// Codec for the turn-based Gemini Live protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiCodec;

impl GeminiCodec {
    /// The `setup` frame sent right after the socket opens.
    pub fn setup(&self, model: &str) -> Option<String> {
        encode(&ClientMessage::Setup(Setup {
            model: qualified_model_name(model),
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["TEXT".to_string()],
            }),
        }))
    }

    /// The synthetic instruction turn sent once setup is acknowledged.
    ///
    /// The turn is left open so the model waits for the user.
    pub fn instruction_turn(&self, instructions: &str) -> Option<String> {
        encode(&ClientMessage::ClientContent(ClientContent {
            turns: vec![Content::user_text(instructions)],
            turn_complete: false,
        }))
    }

    fn media_chunk(mime_type: String, data: &str) -> Option<UpstreamEnvelope> {
        encode(&ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![MediaChunk {
                mime_type,
                data: strip_data_url(data).to_string(),
            }],
        }))
        .map(UpstreamEnvelope::single)
    }

    /// One `serverContent` frame can carry a user transcript, model output
    /// and turn markers together; each becomes its own notification.
    fn decode_content(content: ServerContent) -> UpstreamEvent {
        let mut notifications = Vec::new();

        if let Some(transcription) = content.input_transcription.filter(|t| !t.text.is_empty()) {
            notifications.push(ClientNotification::typed_text(
                notification_kind::USER_TRANSCRIPT,
                transcription.text,
            ));
        }

        if let Some(transcription) = content.output_transcription.filter(|t| !t.text.is_empty())
        {
            notifications.push(ClientNotification::typed_text(
                notification_kind::PARTIAL,
                transcription.text,
            ));
        }

        let text = content
            .model_turn
            .map(|turn| {
                turn.parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .filter(|text| !text.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        if content.interrupted {
            notifications.push(ClientNotification::typed(notification_kind::INTERRUPTED));
        }

        if !text.is_empty() {
            let notification = ClientNotification::text(text);
            notifications.push(if content.turn_complete {
                notification.with_kind(notification_kind::TURN_COMPLETE)
            } else {
                notification
            });
        } else if content.turn_complete {
            notifications.push(ClientNotification::typed(notification_kind::TURN_COMPLETE));
        }

        match notifications.len() {
            0 => UpstreamEvent::Ignored,
            1 => UpstreamEvent::Notify(notifications.remove(0)),
            _ => UpstreamEvent::NotifyAll(notifications),
        }
    }
}

fn encode(message: &ClientMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!("Failed to serialize Gemini message: {}", e);
            None
        }
    }
}

impl WireCodec for GeminiCodec {
    fn provider(&self) -> RealtimeProvider {
        RealtimeProvider::Gemini
    }

    fn to_upstream(&self, input: &MediaInput) -> Option<UpstreamEnvelope> {
        match input {
            MediaInput::VideoFrame { data } => {
                Self::media_chunk(VIDEO_FRAME_MIME_TYPE.to_string(), data)
            }
            MediaInput::AudioChunk { data, mime_type } => {
                Self::media_chunk(normalize_mime_type(mime_type), data)
            }
            MediaInput::Text { text } => {
                if text.trim().is_empty() {
                    return None;
                }
                encode(&ClientMessage::ClientContent(ClientContent {
                    turns: vec![Content::user_text(text)],
                    turn_complete: true,
                }))
                .map(UpstreamEnvelope::single)
            }
        }
    }

    fn decode(&self, raw: &str) -> UpstreamEvent {
        let message = match serde_json::from_str::<ServerMessage>(raw) {
            Ok(message) => message,
            Err(e) => {
                debug!("Failed to parse Gemini server message: {}", e);
                return UpstreamEvent::Ignored;
            }
        };

        if message.setup_complete.is_some() {
            return UpstreamEvent::SetupComplete;
        }

        if let Some(error) = message.error {
            // Every Gemini error ends the socket; unmatched ones are transient
            let reason = classify_error_event(error.status.as_deref(), &error.message)
                .unwrap_or_else(|| match &error.status {
                    Some(status) => {
                        TerminationReason::transient(format!("{status}: {}", error.message))
                    }
                    None => TerminationReason::transient(error.message.clone()),
                });
            return UpstreamEvent::Failed(reason);
        }

        if let Some(go_away) = message.go_away {
            return UpstreamEvent::SessionEnding {
                time_left: go_away.time_left,
            };
        }

        match message.server_content {
            Some(content) => Self::decode_content(content),
            None => UpstreamEvent::Ignored,
        }
    }
}
