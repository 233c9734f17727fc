//! Gemini Live API WebSocket message types.
//!
//! Client messages are objects with exactly one top-level key (`setup`,
//! `client_content` or `realtime_input`). Server messages use camelCase keys;
//! snake_case aliases are accepted as well.

use serde::{Deserialize, Serialize};

// =============================================================================
// Client Messages (sent to server)
// =============================================================================

/// Client messages sent to the Gemini Live API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientMessage {
    Setup(Setup),
    ClientContent(ClientContent),
    RealtimeInput(RealtimeInput),
}

/// First message on every socket.
#[derive(Debug, Clone, Serialize)]
pub struct Setup {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
}

/// Conversation turns appended to the session.
#[derive(Debug, Clone, Serialize)]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

/// Streaming media.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeInput {
    pub media_chunks: Vec<MediaChunk>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaChunk {
    pub mime_type: String,
    pub data: String,
}

// =============================================================================
// Shared Content Types
// =============================================================================

/// One conversation turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: &str) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

/// A part of a turn. Only text parts matter to the relay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

// =============================================================================
// Server Messages (received from server)
// =============================================================================

/// Server message. At most one field is set in practice.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default, alias = "setup_complete")]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(default, alias = "server_content")]
    pub server_content: Option<ServerContent>,
    #[serde(default, alias = "go_away")]
    pub go_away: Option<GoAway>,
    #[serde(default)]
    pub error: Option<ServerError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default, alias = "model_turn")]
    pub model_turn: Option<Content>,
    #[serde(default, alias = "turn_complete")]
    pub turn_complete: bool,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default, alias = "input_transcription")]
    pub input_transcription: Option<Transcription>,
    #[serde(default, alias = "output_transcription")]
    pub output_transcription: Option<Transcription>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
}

/// Advance notice that the server will close the session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    #[serde(default, alias = "time_left")]
    pub time_left: Option<String>,
}

/// Error object some deployments send before closing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerError {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_setup_serialization() {
        let message = ClientMessage::Setup(Setup {
            model: "models/gemini-2.0-flash-exp".to_string(),
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["TEXT".to_string()],
            }),
        });
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "setup": {
                    "model": "models/gemini-2.0-flash-exp",
                    "generation_config": { "response_modalities": ["TEXT"] }
                }
            })
        );
    }

    #[test]
    fn test_realtime_input_serialization() {
        let message = ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![MediaChunk {
                mime_type: "image/jpeg".to_string(),
                data: "AAAA".to_string(),
            }],
        });
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value["realtime_input"]["media_chunks"][0]["mime_type"],
            "image/jpeg"
        );
    }

    #[test]
    fn test_server_content_deserialization() {
        let message: ServerMessage = serde_json::from_str(
            r#"{"serverContent":{"modelTurn":{"role":"model","parts":[{"text":"Hi"},{"inlineData":{"mimeType":"audio/pcm","data":"AA=="}}]},"turnComplete":true}}"#,
        )
        .unwrap();
        let content = message.server_content.unwrap();
        assert!(content.turn_complete);
        assert_eq!(content.model_turn.unwrap().parts.len(), 2);
    }

    #[test]
    fn test_setup_complete_and_aliases() {
        let message: ServerMessage = serde_json::from_str(r#"{"setupComplete":{}}"#).unwrap();
        assert!(message.setup_complete.is_some());

        let message: ServerMessage =
            serde_json::from_str(r#"{"setup_complete":{},"go_away":{"time_left":"10s"}}"#)
                .unwrap();
        assert!(message.setup_complete.is_some());
        assert_eq!(message.go_away.unwrap().time_left.as_deref(), Some("10s"));
    }
}
