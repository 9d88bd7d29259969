//! Python pickle format.

use serde_json::Value;

use super::ConfigFormat;
use crate::error::ConfigError;

/// Pickle (protocol 3) via `serde-pickle`, for interchange with Python tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct PickleFormat;

impl ConfigFormat for PickleFormat {
    fn name(&self) -> &str {
        "pickle"
    }

    fn extensions(&self) -> &[&str] {
        &["pickle", "pkl"]
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, ConfigError> {
        serde_pickle::to_vec(value, serde_pickle::SerOptions::new())
            .map_err(|e| ConfigError::format("pickle", e))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, ConfigError> {
        serde_pickle::from_slice(bytes, serde_pickle::DeOptions::new())
            .map_err(|e| ConfigError::format("pickle", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_protocol_header() {
        let bytes = PickleFormat.encode(&json!({"a": 1})).unwrap();
        assert_eq!(&bytes[..2], b"\x80\x03");
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(PickleFormat.decode(b"not a pickle").is_err());
    }
}
