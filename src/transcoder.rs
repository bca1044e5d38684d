//! Document transcoders
//!
//! A transcoder turns a document value into the bytes and common flags stored on
//! the server, and back.

use serde_json::Value;
use std::fmt;

use crate::error::{KvError, Result};

/// Common flags for JSON documents.
pub const JSON_FLAGS: u32 = 0x0200_0000;
/// Common flags for UTF-8 string documents.
pub const STRING_FLAGS: u32 = 0x0400_0000;

pub trait Transcoder: fmt::Debug + Send + Sync {
    /// Encode a value into bytes and flags.
    fn encode(&self, value: &Value) -> Result<(Vec<u8>, u32)>;
    /// Decode bytes and flags into a value.
    fn decode(&self, bytes: &[u8], flags: u32) -> Result<Value>;
}

/// Stores every value as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTranscoder;

impl Transcoder for JsonTranscoder {
    fn encode(&self, value: &Value) -> Result<(Vec<u8>, u32)> {
        let bytes = serde_json::to_vec(value).map_err(|e| KvError::Encoding(e.to_string()))?;
        Ok((bytes, JSON_FLAGS))
    }

    fn decode(&self, bytes: &[u8], flags: u32) -> Result<Value> {
        match flags & 0xff00_0000 {
            // Legacy documents carry no common flags.
            0 | JSON_FLAGS => {
                serde_json::from_slice(bytes).map_err(|e| KvError::Decoding(e.to_string()))
            }
            STRING_FLAGS => std::str::from_utf8(bytes)
                .map(|s| Value::String(s.to_string()))
                .map_err(|e| KvError::Decoding(e.to_string())),
            other => Err(KvError::Decoding(format!(
                "unexpected content flags {other:#010x} for JSON transcoder"
            ))),
        }
    }
}

/// Stores string values as raw UTF-8. Any other value is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawStringTranscoder;

impl Transcoder for RawStringTranscoder {
    fn encode(&self, value: &Value) -> Result<(Vec<u8>, u32)> {
        match value {
            Value::String(s) => Ok((s.as_bytes().to_vec(), STRING_FLAGS)),
            other => Err(KvError::Encoding(format!(
                "raw string transcoder only supports strings, got {}",
                json_type(other)
            ))),
        }
    }

    fn decode(&self, bytes: &[u8], flags: u32) -> Result<Value> {
        if flags & 0xff00_0000 != STRING_FLAGS {
            return Err(KvError::Decoding(format!(
                "unexpected content flags {flags:#010x} for raw string transcoder"
            )));
        }
        std::str::from_utf8(bytes)
            .map(|s| Value::String(s.to_string()))
            .map_err(|e| KvError::Decoding(e.to_string()))
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_transcoder_reads_legacy_and_string_documents() {
        let t = JsonTranscoder;
        assert_eq!(t.decode(br#"{"a":1}"#, 0).unwrap(), json!({"a": 1}));
        assert_eq!(t.decode(b"plain", STRING_FLAGS).unwrap(), json!("plain"));
        assert!(matches!(
            t.decode(b"\x00", 0x0300_0000),
            Err(KvError::Decoding(_))
        ));
    }

    #[test]
    fn raw_string_transcoder_rejects_non_strings() {
        let t = RawStringTranscoder;
        let (bytes, flags) = t.encode(&json!("hello")).unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(flags, STRING_FLAGS);

        match t.encode(&json!({"a": 1})) {
            Err(KvError::Encoding(msg)) => assert!(msg.contains("object")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
