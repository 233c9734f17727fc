//! Wire codec for the OpenAI Realtime protocol.

use tracing::{debug, trace, warn};

use super::config::{Modality, OPENAI_TRANSCRIPTION_MODEL};
use super::messages::{
    ClientEvent, ConversationItem, InputAudioTranscription, ServerEvent, SessionConfig,
    TurnDetection,
};
use crate::core::realtime::RealtimeProvider;
use crate::core::realtime::base::{
    ClientNotification, MediaInput, UpstreamEnvelope, UpstreamEvent, WireCodec,
    notification_kind,
};
use crate::core::realtime::classify::classify_error_event;
use crate::core::realtime::media::strip_data_url;

/// Label sent to the client for provider errors that do not end the session.
pub const PROVIDER_ERROR_LABEL: &str = "The AI provider reported an error";

/// Codec for the event-typed OpenAI Realtime protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAICodec;

impl OpenAICodec {
    /// The `session.update` frame sent right after the socket opens.
    pub fn session_update(&self, instructions: &str) -> Option<String> {
        let event = ClientEvent::SessionUpdate {
            session: SessionConfig {
                modalities: Some(vec![Modality::Text.as_str().to_string()]),
                instructions: Some(instructions.to_string()),
                input_audio_transcription: Some(InputAudioTranscription {
                    model: OPENAI_TRANSCRIPTION_MODEL.to_string(),
                }),
                turn_detection: Some(TurnDetection::ServerVad {
                    threshold: Some(0.5),
                    prefix_padding_ms: Some(300),
                    silence_duration_ms: Some(500),
                }),
            },
        };
        encode(&event)
    }
}

fn encode(event: &ClientEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!("Failed to serialize OpenAI event: {}", e);
            None
        }
    }
}

impl WireCodec for OpenAICodec {
    fn provider(&self) -> RealtimeProvider {
        RealtimeProvider::OpenAI
    }

    fn to_upstream(&self, input: &MediaInput) -> Option<UpstreamEnvelope> {
        match input {
            // The realtime endpoint has no image input.
            MediaInput::VideoFrame { .. } => None,
            MediaInput::AudioChunk { data, .. } => encode(&ClientEvent::InputAudioBufferAppend {
                audio: strip_data_url(data).to_string(),
            })
            .map(UpstreamEnvelope::single),
            MediaInput::Text { text } => {
                if text.trim().is_empty() {
                    return None;
                }
                let item = encode(&ClientEvent::ConversationItemCreate {
                    item: ConversationItem::user_text(text),
                })?;
                let response = encode(&ClientEvent::ResponseCreate)?;
                Some(UpstreamEnvelope::from_frames(vec![item, response]))
            }
        }
    }

    fn decode(&self, raw: &str) -> UpstreamEvent {
        let event = match serde_json::from_str::<ServerEvent>(raw) {
            Ok(event) => event,
            Err(e) => {
                debug!("Failed to parse OpenAI server event: {}", e);
                return UpstreamEvent::Ignored;
            }
        };

        match event {
            ServerEvent::SessionCreated { session } => {
                debug!("OpenAI Realtime session created: {}", session.id);
                UpstreamEvent::Ignored
            }
            ServerEvent::SessionUpdated { session } => {
                debug!("OpenAI Realtime session updated: {}", session.id);
                UpstreamEvent::SetupComplete
            }
            ServerEvent::Error { error } => {
                match classify_error_event(error.code.as_deref(), &error.message) {
                    Some(reason) => UpstreamEvent::Failed(reason),
                    None => {
                        warn!(
                            error_type = %error.error_type,
                            code = ?error.code,
                            "OpenAI Realtime error: {}",
                            error.message
                        );
                        UpstreamEvent::Notify(ClientNotification::error(PROVIDER_ERROR_LABEL))
                    }
                }
            }
            ServerEvent::SpeechStarted { audio_start_ms } => {
                trace!("Speech started at {}ms", audio_start_ms);
                UpstreamEvent::Notify(ClientNotification::typed(notification_kind::SPEECH_STARTED))
            }
            ServerEvent::SpeechStopped { audio_end_ms } => {
                trace!("Speech stopped at {}ms", audio_end_ms);
                UpstreamEvent::Notify(ClientNotification::typed(notification_kind::SPEECH_STOPPED))
            }
            ServerEvent::TranscriptionCompleted { transcript } => notify_text(
                notification_kind::USER_TRANSCRIPT,
                transcript.trim().to_string(),
            ),
            ServerEvent::TextDelta { delta } | ServerEvent::AudioTranscriptDelta { delta } => {
                notify_text(notification_kind::PARTIAL, delta)
            }
            ServerEvent::TextDone { text } => notify_text(notification_kind::COMPLETE, text),
            ServerEvent::AudioTranscriptDone { transcript } => {
                notify_text(notification_kind::COMPLETE, transcript)
            }
            ServerEvent::ResponseDone { response } => {
                debug!("Response done: {} ({})", response.id, response.status);
                UpstreamEvent::Notify(ClientNotification::typed(notification_kind::RESPONSE_DONE))
            }
            ServerEvent::Unknown => UpstreamEvent::Ignored,
        }
    }
}

fn notify_text(kind: &str, text: String) -> UpstreamEvent {
    if text.is_empty() {
        UpstreamEvent::Ignored
    } else {
        UpstreamEvent::Notify(ClientNotification::typed_text(kind, text))
    }
}
