use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub const PAYLOAD_START: &str = "APSTART:";
pub const PAYLOAD_END: &str = ":APEND";

const RUNTIME_ERROR_MARKER: &str = "ERR:Runtime Error";
const ERROR_MARKER: &str = "ERR:";

/// Keep printable ASCII (32..=126) only
///
/// Lossy on purpose: the game's binary header bytes vanish, leaving the text
/// the sentinel search runs on.
pub fn decode(raw: &[u8]) -> String {
    raw.iter()
        .filter(|b| (32..=126).contains(*b))
        .map(|&b| b as char)
        .collect()
}

/// Pull the mod's JSON payload out of a decoded response
///
/// Returns an empty object when the response carries neither a payload nor
/// an error marker.
pub fn extract_payload(text: &str) -> Result<Value> {
    if let Some(start) = text.find(PAYLOAD_START) {
        let rest = &text[start + PAYLOAD_START.len()..];
        if let Some(end) = rest.find(PAYLOAD_END) {
            return serde_json::from_str(&rest[..end])
                .map_err(|e| Error::InvalidPayload(format!("{}: {}", e, &rest[..end])));
        }
    }

    // '?' is the game's substitution glyph for characters it failed to expand
    if text.contains(RUNTIME_ERROR_MARKER) {
        Err(Error::ScriptRuntime(text.replace('?', "")))
    } else if text.contains(ERROR_MARKER) {
        Err(Error::Protocol(text.replace('?', "")))
    } else {
        Ok(Value::Object(Map::new()))
    }
}

/// [`decode`] then [`extract_payload`]
pub fn parse_response(raw: &[u8]) -> Result<Value> {
    extract_payload(&decode(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_drops_binary() {
        let raw = b"\x1a\x00\x00\x00\x03\x00\x00\x00hello\x00\xffworld\n";
        assert_eq!(decode(raw), "helloworld");
    }

    #[test]
    fn test_extract_payload() {
        let text = "O:APSTART:{\"ready\":true}:APEND";
        assert_eq!(extract_payload(text).unwrap(), json!({"ready": true}));
    }

    #[test]
    fn test_extract_is_non_greedy() {
        let text = "APSTART:{\"a\":1}:APEND junk APSTART:{\"b\":2}:APEND";
        assert_eq!(extract_payload(text).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_payload_after_binary_header() {
        let mut raw = vec![0x30, 0, 0, 0, 1, 0, 0, 0];
        raw.extend_from_slice(b"O:APSTART:{\"tech\":[1,2]}:APEND\0");
        assert_eq!(parse_response(&raw).unwrap(), json!({"tech": [1, 2]}));
    }

    #[test]
    fn test_empty_response_is_empty_object() {
        assert_eq!(extract_payload("O:").unwrap(), json!({}));
        assert_eq!(parse_response(&[]).unwrap(), json!({}));
    }

    #[test]
    fn test_error_markers() {
        let err = extract_payload("ERR:Runtime Error: attempt to index ?nil?").unwrap_err();
        match err {
            Error::ScriptRuntime(msg) => assert_eq!(msg, "ERR:Runtime Error: attempt to index nil"),
            other => panic!("expected ScriptRuntime, got {:?}", other),
        }

        let err = extract_payload("ERR:Syntax?").unwrap_err();
        assert!(matches!(err, Error::Protocol(ref m) if m == "ERR:Syntax"));
    }

    #[test]
    fn test_payload_wins_over_error_marker() {
        let text = "ERR:stale APSTART:{}:APEND";
        assert_eq!(extract_payload(text).unwrap(), json!({}));
    }

    #[test]
    fn test_malformed_payload() {
        let err = extract_payload("APSTART:{not json}:APEND").unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(_)));
    }
}
