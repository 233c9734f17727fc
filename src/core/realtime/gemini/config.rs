//! Gemini Live API configuration types.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::realtime::base::{RealtimeError, RealtimeResult};

/// Gemini Live API WebSocket endpoint.
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Prefix the setup message expects on model ids.
const MODEL_PREFIX: &str = "models/";

// =============================================================================
// Models
// =============================================================================

/// Known Gemini Live models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeminiLiveModel {
    /// Gemini 2.0 Flash Live
    #[default]
    #[serde(rename = "gemini-2.0-flash-live-001")]
    Gemini20FlashLive001,
    /// Gemini Live 2.5 Flash preview
    #[serde(rename = "gemini-live-2.5-flash-preview")]
    GeminiLive25FlashPreview,
    /// Gemini 2.0 Flash experimental
    #[serde(rename = "gemini-2.0-flash-exp")]
    Gemini20FlashExp,
}

impl GeminiLiveModel {
    /// Convert to the API model id (without the `models/` prefix).
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini20FlashLive001 => "gemini-2.0-flash-live-001",
            Self::GeminiLive25FlashPreview => "gemini-live-2.5-flash-preview",
            Self::Gemini20FlashExp => "gemini-2.0-flash-exp",
        }
    }

    /// Built-in fallback order.
    pub fn fallback_order() -> &'static [GeminiLiveModel] {
        &[
            Self::Gemini20FlashLive001,
            Self::GeminiLive25FlashPreview,
            Self::Gemini20FlashExp,
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

impl std::fmt::Display for GeminiLiveModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Model id as the setup message wants it: `models/<id>`.
pub fn qualified_model_name(model: &str) -> String {
    if model.starts_with(MODEL_PREFIX) {
        model.to_string()
    } else {
        format!("{MODEL_PREFIX}{model}")
    }
}

/// Build the session URL: `<endpoint>?key=<api key>`.
pub fn live_url(endpoint: &str, api_key: &str) -> RealtimeResult<Url> {
    let mut url = Url::parse(endpoint).map_err(|e| {
        RealtimeError::InvalidConfiguration(format!("Invalid Gemini endpoint '{endpoint}': {e}"))
    })?;
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url)
}
