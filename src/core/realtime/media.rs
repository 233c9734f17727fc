//! Media framing helpers shared by the codecs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// MIME type declared for every camera frame.
pub const VIDEO_FRAME_MIME_TYPE: &str = "image/jpeg";

/// MIME type assumed when the client does not declare one.
pub const DEFAULT_AUDIO_MIME_TYPE: &str = "audio/webm";

/// Normalize a client-declared audio MIME type.
///
/// Parameters are stripped (`audio/webm;codecs=opus` becomes `audio/webm`),
/// whitespace trimmed, and the result lowercased.
pub fn normalize_mime_type(mime_type: &str) -> String {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    if essence.is_empty() {
        DEFAULT_AUDIO_MIME_TYPE.to_string()
    } else {
        essence.to_ascii_lowercase()
    }
}

/// Strip a `data:<mime>;base64,` prefix if the browser left one on.
pub fn strip_data_url(data: &str) -> &str {
    if data.starts_with("data:") {
        match data.find(";base64,") {
            Some(index) => &data[index + ";base64,".len()..],
            None => data,
        }
    } else {
        data
    }
}

/// Decoded size of a base64 payload in bytes, without decoding it.
pub fn estimated_decoded_len(data: &str) -> usize {
    let payload = strip_data_url(data);
    let padding = payload.bytes().rev().take_while(|b| *b == b'=').count();
    (payload.len() / 4 * 3 + (payload.len() % 4) * 3 / 4).saturating_sub(padding)
}

/// Decode a base64 payload, tolerating a data URL prefix.
pub fn decode_payload(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(strip_data_url(data))
}

/// Encode raw bytes as standard base64.
pub fn encode_payload(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mime_type() {
        assert_eq!(normalize_mime_type("audio/webm;codecs=opus"), "audio/webm");
        assert_eq!(normalize_mime_type("audio/webm"), "audio/webm");
        assert_eq!(normalize_mime_type(" Audio/PCM ; rate=16000"), "audio/pcm");
        assert_eq!(normalize_mime_type(""), DEFAULT_AUDIO_MIME_TYPE);
        assert_eq!(normalize_mime_type(";codecs=opus"), DEFAULT_AUDIO_MIME_TYPE);
    }

    #[test]
    fn test_strip_data_url() {
        assert_eq!(strip_data_url("data:image/jpeg;base64,AAEC"), "AAEC");
        assert_eq!(strip_data_url("AAEC"), "AAEC");
        assert_eq!(strip_data_url("data:weird"), "data:weird");
    }

    #[test]
    fn test_payload_bytes_preserved() {
        let bytes: Vec<u8> = (0..=255).collect();
        let encoded = encode_payload(&bytes);
        assert_eq!(decode_payload(&encoded).unwrap(), bytes);
        assert_eq!(
            decode_payload(&format!("data:audio/webm;base64,{encoded}")).unwrap(),
            bytes
        );
    }

    #[test]
    fn test_estimated_decoded_len() {
        for len in [0usize, 1, 2, 3, 4, 5, 100, 1023] {
            let encoded = encode_payload(&vec![7u8; len]);
            assert_eq!(estimated_decoded_len(&encoded), len, "len {len}");
        }
    }
}
