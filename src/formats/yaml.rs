//! YAML format.

use serde_json::Value;

use super::ConfigFormat;
use crate::error::ConfigError;

/// YAML documents via `serde_yaml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlFormat;

impl ConfigFormat for YamlFormat {
    fn name(&self) -> &str {
        "yaml"
    }

    fn extensions(&self) -> &[&str] {
        &["yaml", "yml"]
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, ConfigError> {
        serde_yaml::to_string(value)
            .map(String::into_bytes)
            .map_err(|e| ConfigError::format("yaml", e))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, ConfigError> {
        serde_yaml::from_slice(bytes).map_err(|e| ConfigError::format("yaml", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_nested() {
        let value = YamlFormat
            .decode(b"http:\n  port: 8080\n  hosts:\n    - a\n    - b\n")
            .unwrap();
        assert_eq!(value, json!({"http": {"port": 8080, "hosts": ["a", "b"]}}));
    }

    #[test]
    fn test_ambiguous_strings_stay_strings() {
        let doc = json!({"a": "true", "b": "123", "c": "null"});
        let bytes = YamlFormat.encode(&doc).unwrap();
        assert_eq!(YamlFormat.decode(&bytes).unwrap(), doc);
    }
}
