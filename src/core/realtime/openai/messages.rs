//! OpenAI Realtime API WebSocket message types.
//!
//! Only the events the relay produces or reacts to are modeled. Everything
//! else the server sends decodes as [`ServerEvent::Unknown`].
//!
//! # Protocol Overview
//!
//! Client events (sent to server):
//! - session.update - Configure modalities, instructions, transcription, VAD
//! - input_audio_buffer.append - Append audio to buffer
//! - conversation.item.create - Add a user text item
//! - response.create - Ask for a response to the new item
//!
//! Server events (received from server):
//! - session.created / session.updated
//! - input_audio_buffer.speech_started / speech_stopped
//! - conversation.item.input_audio_transcription.completed
//! - response.text.delta / response.text.done
//! - response.audio_transcript.delta / response.audio_transcript.done
//! - response.done
//! - error

use serde::{Deserialize, Serialize};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration sent in `session.update`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Response modalities (text, audio)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Input audio transcription configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,

    /// Turn detection configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    /// Transcription model (e.g., "whisper-1")
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationItem {
    /// Item type
    #[serde(rename = "type")]
    pub item_type: String,
    /// Item role (user, assistant, system)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<ContentPart>,
}

impl ConversationItem {
    /// A user message carrying one text part.
    pub fn user_text(text: &str) -> Self {
        Self {
            item_type: "message".to_string(),
            role: Some("user".to_string()),
            content: vec![ContentPart {
                content_type: "input_text".to_string(),
                text: Some(text.to_string()),
            }],
        }
    }
}

/// Content part within a conversation item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    /// Content type (input_text, text)
    #[serde(rename = "type")]
    pub content_type: String,
    /// Text content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent to the OpenAI Realtime API.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Append base64 audio to the input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },

    /// Create a conversation item
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    /// Create a response
    #[serde(rename = "response.create")]
    ResponseCreate,
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Server events received from the OpenAI Realtime API.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error { error: ApiError },

    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        session: Session,
    },

    #[serde(rename = "session.updated")]
    SessionUpdated {
        #[serde(default)]
        session: Session,
    },

    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        audio_start_ms: u64,
    },

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        audio_end_ms: u64,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted {
        #[serde(default)]
        transcript: String,
    },

    #[serde(rename = "response.text.delta")]
    TextDelta { delta: String },

    #[serde(rename = "response.text.done")]
    TextDone {
        #[serde(default)]
        text: String,
    },

    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta { delta: String },

    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        #[serde(default)]
        transcript: String,
    },

    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: Response,
    },

    /// Any event the relay does not react to
    #[serde(other)]
    Unknown,
}

// =============================================================================
// Supporting Types
// =============================================================================

/// API error information.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Error message
    #[serde(default)]
    pub message: String,
}

/// Session information.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub modalities: Vec<String>,
}

/// Response information.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
}
