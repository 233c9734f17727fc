//! Classification of upstream failures.
//!
//! Providers report failures as close frames, HTTP handshake statuses, or
//! structured error events. Everything funnels into a [`TerminationReason`]
//! that decides the recovery policy. Structured error codes are consulted
//! first; free text (close reasons, error messages) is matched
//! case-insensitively as a fallback.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static QUOTA_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)quota|resource[ _-]?exhausted|billing").expect("valid quota pattern")
});

static RATE_LIMIT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)rate[ _-]?limit|too many requests").expect("valid rate limit pattern")
});

static MODEL_UNSUPPORTED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)not[ _-]?found|not[ _-]?supported|invalid[ _-]?model|unsupported[ _-]?model")
        .expect("valid model pattern")
});

static AUTHENTICATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)api[ _-]?key[ _-]?(not[ _-]?valid|invalid)|invalid[ _-]?api[ _-]?key|unauthenticated|permission[ _-]?denied")
        .expect("valid authentication pattern")
});

/// WebSocket close code for "try again later".
const CLOSE_TRY_AGAIN_LATER: u16 = 1013;
/// Application close code some providers use for rate limiting.
const CLOSE_RATE_LIMITED: u16 = 4429;
const CLOSE_UNAUTHORIZED: u16 = 4401;
const CLOSE_FORBIDDEN: u16 = 4403;

/// Recovery class of a termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationKind {
    /// The model id is not served; try the next candidate
    ModelUnsupported,
    /// Account quota is gone; give up
    QuotaExhausted,
    /// Provider asked us to slow down; retry the same model later
    RateLimited,
    /// Credentials rejected; give up
    AuthenticationFailed,
    /// Anything else; retry the same model shortly
    Transient,
}

impl TerminationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationKind::ModelUnsupported => "model_unsupported",
            TerminationKind::QuotaExhausted => "quota_exhausted",
            TerminationKind::RateLimited => "rate_limited",
            TerminationKind::AuthenticationFailed => "authentication_failed",
            TerminationKind::Transient => "transient",
        }
    }

    /// Stable label shown to the client.
    pub fn user_label(&self) -> &'static str {
        match self {
            TerminationKind::ModelUnsupported => "Model not available",
            TerminationKind::QuotaExhausted => "API quota exhausted. Please try again later.",
            TerminationKind::RateLimited => "Rate limited by the provider. Retrying shortly...",
            TerminationKind::AuthenticationFailed => "Authentication with the provider failed",
            TerminationKind::Transient => "Connection interrupted. Reconnecting...",
        }
    }
}

impl fmt::Display for TerminationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified reason an upstream session ended.
///
/// The detail string is the raw provider text and is only ever logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationReason {
    kind: TerminationKind,
    detail: String,
}

impl TerminationReason {
    pub fn new(kind: TerminationKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn transient(detail: impl Into<String>) -> Self {
        Self::new(TerminationKind::Transient, detail)
    }

    pub fn kind(&self) -> TerminationKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn user_label(&self) -> &'static str {
        self.kind.user_label()
    }

    /// Whether the same model may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            TerminationKind::Transient | TerminationKind::RateLimited
        )
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.detail)
        }
    }
}

/// Classify free text, returning `None` when nothing matches.
pub fn classify_text(text: &str) -> Option<TerminationKind> {
    if text.is_empty() {
        return None;
    }
    if QUOTA_PATTERN.is_match(text) {
        Some(TerminationKind::QuotaExhausted)
    } else if RATE_LIMIT_PATTERN.is_match(text) {
        Some(TerminationKind::RateLimited)
    } else if AUTHENTICATION_PATTERN.is_match(text) {
        Some(TerminationKind::AuthenticationFailed)
    } else if MODEL_UNSUPPORTED_PATTERN.is_match(text) {
        Some(TerminationKind::ModelUnsupported)
    } else {
        None
    }
}

/// Classify a provider close frame.
pub fn classify_close(code: Option<u16>, reason: &str) -> TerminationReason {
    let detail = match code {
        Some(code) => format!("close {code}: {reason}"),
        None => format!("close: {reason}"),
    };

    let kind = match code {
        Some(CLOSE_TRY_AGAIN_LATER) | Some(CLOSE_RATE_LIMITED) => TerminationKind::RateLimited,
        Some(CLOSE_UNAUTHORIZED) | Some(CLOSE_FORBIDDEN) => TerminationKind::AuthenticationFailed,
        _ => classify_text(reason).unwrap_or(TerminationKind::Transient),
    };

    TerminationReason::new(kind, detail)
}

/// Classify a failed WebSocket upgrade by its HTTP status and body.
pub fn classify_http_status(status: u16, body: &str) -> TerminationReason {
    let detail = format!("HTTP {status}: {body}");
    let kind = match status {
        401 | 403 => TerminationKind::AuthenticationFailed,
        404 => TerminationKind::ModelUnsupported,
        429 => classify_text(body)
            .filter(|kind| *kind == TerminationKind::QuotaExhausted)
            .unwrap_or(TerminationKind::RateLimited),
        _ => classify_text(body).unwrap_or(TerminationKind::Transient),
    };
    TerminationReason::new(kind, detail)
}

/// Classify a structured provider error code.
///
/// Returns `None` for codes that do not end the session.
pub fn classify_error_code(code: &str) -> Option<TerminationKind> {
    match code.to_ascii_lowercase().as_str() {
        "model_not_found" | "invalid_model" | "unsupported_model" | "not_found" => {
            Some(TerminationKind::ModelUnsupported)
        }
        "insufficient_quota" | "quota_exceeded" | "resource_exhausted" => {
            Some(TerminationKind::QuotaExhausted)
        }
        "rate_limit_exceeded" | "rate_limited" => Some(TerminationKind::RateLimited),
        "invalid_api_key" | "unauthenticated" | "permission_denied" => {
            Some(TerminationKind::AuthenticationFailed)
        }
        "session_expired" => Some(TerminationKind::Transient),
        _ => None,
    }
}

/// Classify a provider error event: structured code first, then message text.
///
/// Returns `None` when the error is not fatal.
pub fn classify_error_event(code: Option<&str>, message: &str) -> Option<TerminationReason> {
    let detail = match code {
        Some(code) => format!("{code}: {message}"),
        None => message.to_string(),
    };

    code.and_then(classify_error_code)
        .or_else(|| classify_text(message))
        .map(|kind| TerminationReason::new(kind, detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_text_is_case_insensitive() {
        assert_eq!(
            classify_text("RESOURCE_EXHAUSTED"),
            Some(TerminationKind::QuotaExhausted)
        );
        assert_eq!(
            classify_text("You exceeded your current Quota"),
            Some(TerminationKind::QuotaExhausted)
        );
        assert_eq!(
            classify_text("RATE_LIMIT_EXCEEDED"),
            Some(TerminationKind::RateLimited)
        );
        assert_eq!(
            classify_text("models/gemini-x is not found for API version v1beta"),
            Some(TerminationKind::ModelUnsupported)
        );
        assert_eq!(
            classify_text("Model is NOT SUPPORTED for bidiGenerateContent"),
            Some(TerminationKind::ModelUnsupported)
        );
        assert_eq!(
            classify_text("Invalid model requested"),
            Some(TerminationKind::ModelUnsupported)
        );
        assert_eq!(
            classify_text("API key not valid. Please pass a valid API key."),
            Some(TerminationKind::AuthenticationFailed)
        );
        assert_eq!(classify_text("Internal error encountered."), None);
        assert_eq!(classify_text(""), None);
    }

    #[test]
    fn test_classify_close_by_reason() {
        let reason = classify_close(Some(1011), "RESOURCE_EXHAUSTED");
        assert_eq!(reason.kind(), TerminationKind::QuotaExhausted);
        assert!(!reason.is_retryable());

        let reason = classify_close(Some(1008), "models/foo is not found");
        assert_eq!(reason.kind(), TerminationKind::ModelUnsupported);

        let reason = classify_close(Some(1011), "Internal error encountered.");
        assert_eq!(reason.kind(), TerminationKind::Transient);
        assert!(reason.is_retryable());

        let reason = classify_close(None, "");
        assert_eq!(reason.kind(), TerminationKind::Transient);
    }

    #[test]
    fn test_media_format_errors_do_not_trigger_fallback() {
        let reason = classify_close(Some(1007), "Unsupported MIME type: audio/webm");
        assert_eq!(reason.kind(), TerminationKind::Transient);

        let reason = classify_close(Some(1007), "Request contains an invalid argument.");
        assert_eq!(reason.kind(), TerminationKind::Transient);

        assert_eq!(
            classify_text("Unsupported model: gpt-4o-mini-realtime"),
            Some(TerminationKind::ModelUnsupported)
        );
    }

    #[test]
    fn test_classify_close_by_code() {
        assert_eq!(
            classify_close(Some(1013), "").kind(),
            TerminationKind::RateLimited
        );
        assert_eq!(
            classify_close(Some(4429), "slow down").kind(),
            TerminationKind::RateLimited
        );
        assert_eq!(
            classify_close(Some(4401), "").kind(),
            TerminationKind::AuthenticationFailed
        );
    }

    #[test]
    fn test_classify_http_status() {
        assert_eq!(
            classify_http_status(404, "").kind(),
            TerminationKind::ModelUnsupported
        );
        assert_eq!(
            classify_http_status(401, "").kind(),
            TerminationKind::AuthenticationFailed
        );
        assert_eq!(
            classify_http_status(429, "").kind(),
            TerminationKind::RateLimited
        );
        assert_eq!(
            classify_http_status(429, r#"{"error":{"code":"insufficient_quota"}}"#).kind(),
            TerminationKind::QuotaExhausted
        );
        assert_eq!(
            classify_http_status(502, "bad gateway").kind(),
            TerminationKind::Transient
        );
    }

    #[test]
    fn test_structured_code_wins_over_text() {
        // The message mentions a quota but the code says rate limit.
        let reason = classify_error_event(
            Some("rate_limit_exceeded"),
            "Rate limit reached for requests per minute quota",
        )
        .unwrap();
        assert_eq!(reason.kind(), TerminationKind::RateLimited);

        let reason = classify_error_event(Some("insufficient_quota"), "").unwrap();
        assert_eq!(reason.kind(), TerminationKind::QuotaExhausted);

        let reason = classify_error_event(Some("model_not_found"), "").unwrap();
        assert_eq!(reason.kind(), TerminationKind::ModelUnsupported);
    }

    #[test]
    fn test_non_fatal_error_event() {
        assert!(classify_error_event(Some("invalid_value"), "Invalid audio format").is_none());
        assert!(classify_error_event(None, "Something odd happened").is_none());
        assert!(classify_error_event(None, "quota exceeded").is_some());
    }

    #[test]
    fn test_labels_are_stable_and_hide_detail() {
        let reason = classify_close(Some(1011), "RESOURCE_EXHAUSTED: project 1234 billing");
        assert!(!reason.user_label().contains("1234"));
        assert!(reason.to_string().contains("1234"));
        assert_eq!(
            reason.user_label(),
            TerminationKind::QuotaExhausted.user_label()
        );
    }
}
