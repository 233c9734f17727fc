//! OpenAI Realtime API configuration types.
//!
//! This module contains configuration types for OpenAI's Realtime API:
//! - Known realtime models (the built-in fallback list)
//! - Output modalities
//! - Endpoint URL construction

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::realtime::base::{RealtimeError, RealtimeResult};

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Beta header value required by the Realtime API.
pub const OPENAI_BETA_HEADER: &str = "realtime=v1";

/// Model used for input audio transcription.
pub const OPENAI_TRANSCRIPTION_MODEL: &str = "whisper-1";

// =============================================================================
// Models
// =============================================================================

/// Known OpenAI Realtime models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpenAIRealtimeModel {
    /// GPT-4o Realtime Preview model
    #[default]
    #[serde(rename = "gpt-4o-realtime-preview")]
    Gpt4oRealtimePreview,
    /// GPT-4o Realtime Preview 2024-12-17
    #[serde(rename = "gpt-4o-realtime-preview-2024-12-17")]
    Gpt4oRealtimePreview20241217,
    /// GPT-4o Mini Realtime Preview
    #[serde(rename = "gpt-4o-mini-realtime-preview")]
    Gpt4oMiniRealtimePreview,
}

impl OpenAIRealtimeModel {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt4oRealtimePreview => "gpt-4o-realtime-preview",
            Self::Gpt4oRealtimePreview20241217 => "gpt-4o-realtime-preview-2024-12-17",
            Self::Gpt4oMiniRealtimePreview => "gpt-4o-mini-realtime-preview",
        }
    }

    /// Built-in fallback order.
    pub fn fallback_order() -> &'static [OpenAIRealtimeModel] {
        &[
            Self::Gpt4oRealtimePreview,
            Self::Gpt4oRealtimePreview20241217,
            Self::Gpt4oMiniRealtimePreview,
        ]
    }

    /// Built-in fallback list as model ids.
    pub fn default_fallbacks() -> Vec<String> {
        Self::fallback_order()
            .iter()
            .map(|model| model.as_str().to_string())
            .collect()
    }
}

impl std::fmt::Display for OpenAIRealtimeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Modalities
// =============================================================================

/// Output modalities for OpenAI Realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Text output only
    Text,
    /// Audio output only
    Audio,
}

impl Modality {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Audio => "audio",
        }
    }
}

// =============================================================================
// Endpoint
// =============================================================================

/// Build the session URL: `<endpoint>?model=<model>`.
pub fn realtime_url(endpoint: &str, model: &str) -> RealtimeResult<Url> {
    let mut url = Url::parse(endpoint).map_err(|e| {
        RealtimeError::InvalidConfiguration(format!("Invalid OpenAI endpoint '{endpoint}': {e}"))
    })?;
    url.query_pairs_mut().append_pair("model", model);
    Ok(url)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_as_str() {
        assert_eq!(
            OpenAIRealtimeModel::Gpt4oRealtimePreview.as_str(),
            "gpt-4o-realtime-preview"
        );
        assert_eq!(
            OpenAIRealtimeModel::Gpt4oMiniRealtimePreview.as_str(),
            "gpt-4o-mini-realtime-preview"
        );
    }

    #[test]
    fn test_default_fallbacks_start_with_default_model() {
        let fallbacks = OpenAIRealtimeModel::default_fallbacks();
        assert_eq!(fallbacks.len(), 3);
        assert_eq!(fallbacks[0], OpenAIRealtimeModel::default().as_str());
    }

    #[test]
    fn test_realtime_url() {
        let url = realtime_url(OPENAI_REALTIME_URL, "gpt-4o-realtime-preview").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview"
        );
    }

    #[test]
    fn test_realtime_url_rejects_garbage() {
        assert!(matches!(
            realtime_url("not a url", "m"),
            Err(RealtimeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_modality_serialization() {
        assert_eq!(serde_json::to_string(&Modality::Text).unwrap(), "\"text\"");
        assert_eq!(Modality::Audio.as_str(), "audio");
    }
}
