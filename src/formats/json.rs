//! JSON format.

use serde_json::Value;

use super::ConfigFormat;
use crate::error::ConfigError;

/// UTF-8 JSON, pretty-printed with two-space indentation. A leading
/// byte-order mark is ignored when decoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl ConfigFormat for JsonFormat {
    fn name(&self) -> &str {
        "json"
    }

    fn extensions(&self) -> &[&str] {
        &["json"]
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, ConfigError> {
        let mut bytes = serde_json::to_vec_pretty(value).map_err(|e| ConfigError::format("json", e))?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, ConfigError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        serde_json::from_slice(bytes).map_err(|e| ConfigError::format("json", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pretty_two_space_indent() {
        let bytes = JsonFormat.encode(&json!({"a": {"b": 1}})).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "{\n  \"a\": {\n    \"b\": 1\n  }\n}\n");
    }

    #[test]
    fn test_bom_tolerated() {
        let value = JsonFormat.decode(b"\xEF\xBB\xBF{\"a\": true}").unwrap();
        assert_eq!(value, json!({"a": true}));
    }

    #[test]
    fn test_invalid_json() {
        let err = JsonFormat.decode(b"{nope").unwrap_err();
        assert!(err.to_string().starts_with("json format error"));
    }
}
