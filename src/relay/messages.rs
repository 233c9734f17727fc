//! Relay WebSocket message types
//!
//! Client frames are JSON objects tagged by `type`. Everything the relay sends
//! back is a [`ClientNotification`](crate::core::realtime::ClientNotification)
//! (`{text?, error?, type?}`).

use serde::{Deserialize, Serialize};

use crate::core::realtime::MediaInput;
use crate::core::realtime::media::estimated_decoded_len;

/// Maximum allowed size for text messages (50 KB)
pub const MAX_TEXT_SIZE: usize = 50 * 1024;

/// Maximum allowed decoded size for a media payload (8 MB)
pub const MAX_MEDIA_SIZE: usize = 8 * 1024 * 1024;

/// Maximum allowed size for a model id
pub const MAX_MODEL_ID_SIZE: usize = 256;

// =============================================================================
// Incoming Messages (Client -> Relay)
// =============================================================================

/// Incoming WebSocket messages from the client
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayIncomingMessage {
    /// One-time model and mode binding
    ModelSelection {
        #[serde(default)]
        model: String,
        /// `audio_only`, or absent for vision plus audio
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<String>,
        /// Explicit provider (`gemini` or `openai`); inferred from the model otherwise
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
    },

    /// Base64 JPEG camera frame
    VideoFrame {
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },

    /// Base64 microphone audio
    AudioChunk {
        data: String,
        #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
    },

    /// User text turn
    Text { text: String },

    /// Any other `type`; ignored
    #[serde(other)]
    Unknown,
}

impl RelayIncomingMessage {
    /// Label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayIncomingMessage::ModelSelection { .. } => "model_selection",
            RelayIncomingMessage::VideoFrame { .. } => "video_frame",
            RelayIncomingMessage::AudioChunk { .. } => "audio_chunk",
            RelayIncomingMessage::Text { .. } => "text",
            RelayIncomingMessage::Unknown => "unknown",
        }
    }

    /// The media carried by this message, if any.
    pub fn into_media(self) -> Option<MediaInput> {
        match self {
            RelayIncomingMessage::VideoFrame { data, .. } => Some(MediaInput::VideoFrame { data }),
            RelayIncomingMessage::AudioChunk {
                data, mime_type, ..
            } => Some(MediaInput::AudioChunk {
                data,
                mime_type: mime_type.unwrap_or_default(),
            }),
            RelayIncomingMessage::Text { text } => Some(MediaInput::Text { text }),
            RelayIncomingMessage::ModelSelection { .. } | RelayIncomingMessage::Unknown => None,
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Error type for message validation failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayValidationError {
    /// Text content exceeds maximum allowed size
    TextTooLarge { size: usize, max: usize },
    /// Media payload exceeds maximum allowed size
    MediaTooLarge { size: usize, max: usize },
    /// Model id exceeds maximum allowed size
    ModelIdTooLarge { size: usize, max: usize },
}

impl std::fmt::Display for RelayValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TextTooLarge { size, max } => {
                write!(f, "Text too large: {} bytes (max: {} bytes)", size, max)
            }
            Self::MediaTooLarge { size, max } => {
                write!(f, "Media too large: {} bytes (max: {} bytes)", size, max)
            }
            Self::ModelIdTooLarge { size, max } => {
                write!(f, "Model id too large: {} bytes (max: {} bytes)", size, max)
            }
        }
    }
}

impl std::error::Error for RelayValidationError {}

impl RelayIncomingMessage {
    /// Validates message field sizes to prevent resource exhaustion.
    pub fn validate_size(&self) -> Result<(), RelayValidationError> {
        match self {
            RelayIncomingMessage::ModelSelection { model, .. } => {
                let size = model.len();
                if size > MAX_MODEL_ID_SIZE {
                    return Err(RelayValidationError::ModelIdTooLarge {
                        size,
                        max: MAX_MODEL_ID_SIZE,
                    });
                }
            }
            RelayIncomingMessage::VideoFrame { data, .. }
            | RelayIncomingMessage::AudioChunk { data, .. } => {
                let size = estimated_decoded_len(data);
                if size > MAX_MEDIA_SIZE {
                    return Err(RelayValidationError::MediaTooLarge {
                        size,
                        max: MAX_MEDIA_SIZE,
                    });
                }
            }
            RelayIncomingMessage::Text { text } => {
                let size = text.len();
                if size > MAX_TEXT_SIZE {
                    return Err(RelayValidationError::TextTooLarge {
                        size,
                        max: MAX_TEXT_SIZE,
                    });
                }
            }
            RelayIncomingMessage::Unknown => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_selection_deserialization() {
        let json = r#"{"type": "model_selection", "model": "gemini-2.0-flash-exp", "mode": "audio_only"}"#;
        let msg: RelayIncomingMessage = serde_json::from_str(json).expect("Should deserialize");
        match msg {
            RelayIncomingMessage::ModelSelection {
                model,
                mode,
                provider,
            } => {
                assert_eq!(model, "gemini-2.0-flash-exp");
                assert_eq!(mode.as_deref(), Some("audio_only"));
                assert!(provider.is_none());
            }
            _ => panic!("Expected ModelSelection variant"),
        }
    }

    #[test]
    fn test_audio_chunk_deserialization() {
        let json = r#"{"type": "audio_chunk", "data": "AAEC", "mimeType": "audio/webm;codecs=opus", "timestamp": 1712345678901}"#;
        let msg: RelayIncomingMessage = serde_json::from_str(json).expect("Should deserialize");
        assert_eq!(
            msg.into_media(),
            Some(MediaInput::AudioChunk {
                data: "AAEC".to_string(),
                mime_type: "audio/webm;codecs=opus".to_string(),
            })
        );
    }

    #[test]
    fn test_video_frame_deserialization() {
        let json = r#"{"type": "video_frame", "data": "/9j/4AAQ", "timestamp": 12.5}"#;
        let msg: RelayIncomingMessage = serde_json::from_str(json).expect("Should deserialize");
        assert_eq!(msg.kind(), "video_frame");
        assert_eq!(
            msg.into_media(),
            Some(MediaInput::VideoFrame {
                data: "/9j/4AAQ".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_type_is_tolerated() {
        let msg: RelayIncomingMessage =
            serde_json::from_str(r#"{"type": "ping"}"#).expect("Should deserialize");
        assert_eq!(msg, RelayIncomingMessage::Unknown);
        assert!(msg.into_media().is_none());
    }

    #[test]
    fn test_malformed_messages_fail() {
        assert!(serde_json::from_str::<RelayIncomingMessage>("not json").is_err());
        assert!(serde_json::from_str::<RelayIncomingMessage>(r#"{"data": "AAEC"}"#).is_err());
        assert!(
            serde_json::from_str::<RelayIncomingMessage>(r#"{"type": "video_frame"}"#).is_err()
        );
    }

    #[test]
    fn test_validation_text_exceeds_limit() {
        let msg = RelayIncomingMessage::Text {
            text: "a".repeat(MAX_TEXT_SIZE + 1),
        };
        let err = msg.validate_size().unwrap_err();
        assert!(matches!(err, RelayValidationError::TextTooLarge { .. }));
        assert!(err.to_string().starts_with("Text too large"));
    }

    #[test]
    fn test_validation_text_within_limit() {
        let msg = RelayIncomingMessage::Text {
            text: "a".repeat(MAX_TEXT_SIZE),
        };
        assert!(msg.validate_size().is_ok());
    }

    #[test]
    fn test_validation_media_exceeds_limit() {
        // 12 MB of base64 decodes to 9 MB.
        let msg = RelayIncomingMessage::AudioChunk {
            data: "A".repeat(12 * 1024 * 1024),
            mime_type: None,
            timestamp: None,
        };
        assert!(matches!(
            msg.validate_size(),
            Err(RelayValidationError::MediaTooLarge { .. })
        ));
    }
}
