//! Binary data field.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use super::{Field, FieldOptions, value_type};
use crate::encryption::Keyring;
use crate::error::FieldError;

/// Text encoding of persisted binary data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BinaryEncoding {
    /// Standard padded base64
    #[default]
    Base64,
    /// Lowercase hex, two digits per byte
    Hex,
}

/// Binary data. The live value is a list of byte values (`0..=255`);
/// strings are accepted and stored as their UTF-8 bytes. Persisted as a
/// single encoded string.
#[derive(Debug, Clone, Default)]
pub struct BytesField {
    options: FieldOptions,
    encoding: BinaryEncoding,
}

impl BytesField {
    /// Creates a base64-persisted bytes field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the persisted encoding.
    #[must_use]
    pub const fn encoding(mut self, encoding: BinaryEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Extracts the bytes of a live value.
    #[must_use]
    pub fn bytes_of(value: &Value) -> Option<Vec<u8>> {
        value
            .as_array()?
            .iter()
            .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect()
    }

    fn encode(&self, bytes: &[u8]) -> String {
        match self.encoding {
            BinaryEncoding::Base64 => STANDARD.encode(bytes),
            BinaryEncoding::Hex => bytes.iter().map(|b| format!("{b:02x}")).collect(),
        }
    }

    fn decode(&self, text: &str) -> Result<Vec<u8>, FieldError> {
        match self.encoding {
            BinaryEncoding::Base64 => STANDARD
                .decode(text)
                .map_err(|e| FieldError::invalid(format!("value is not valid base64: {e}"))),
            BinaryEncoding::Hex => decode_hex(text),
        }
    }
}

fn decode_hex(text: &str) -> Result<Vec<u8>, FieldError> {
    if text.len() % 2 != 0 || !text.is_ascii() {
        return Err(FieldError::invalid("value is not valid hex"));
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .map_err(|_| FieldError::invalid("value is not valid hex"))
        })
        .collect()
}

fn bytes_value(bytes: &[u8]) -> Value {
    Value::Array(bytes.iter().map(|b| Value::from(*b)).collect())
}

impl Field for BytesField {
    field_common!();

    fn type_name(&self) -> &'static str {
        "bytes"
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        match &value {
            Value::String(s) => Ok(bytes_value(s.as_bytes())),
            Value::Array(_) => {
                let bytes = Self::bytes_of(&value).ok_or_else(|| {
                    FieldError::invalid("value must be a list of byte values (0-255)")
                })?;
                if self.options.required && bytes.is_empty() {
                    return Err(FieldError::invalid("value is required"));
                }
                Ok(value)
            }
            other => Err(FieldError::invalid(format!(
                "value must be bytes, not a {}",
                value_type(other)
            ))),
        }
    }

    fn to_basic(&self, _keys: &Keyring, value: &Value) -> Result<Value, FieldError> {
        match Self::bytes_of(value) {
            Some(bytes) => Ok(Value::String(self.encode(&bytes))),
            None => Ok(value.clone()),
        }
    }

    fn from_basic(&self, _keys: &Keyring, value: Value) -> Result<Value, FieldError> {
        match &value {
            Value::String(text) => Ok(bytes_value(&self.decode(text)?)),
            _ => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldBuilder;
    use serde_json::json;

    #[test]
    fn test_bytes_accepts_strings_and_byte_lists() {
        let field = BytesField::new();
        assert_eq!(field.validate(json!("hi")).unwrap(), json!([104, 105]));
        assert_eq!(field.validate(json!([0, 255])).unwrap(), json!([0, 255]));
        assert!(field.validate(json!([256])).is_err());
        assert!(field.validate(json!([-1])).is_err());
        assert!(field.validate(json!(12)).is_err());
        assert!(BytesField::new().required().validate(json!([])).is_err());
    }

    #[test]
    fn test_bytes_base64_persisted() {
        let keys = Keyring::new();
        let field = BytesField::new();
        let live = json!([0, 1, 254, 255]);
        let basic = field.to_basic(&keys, &live).unwrap();
        assert_eq!(basic, json!("AAH+/w=="));
        assert_eq!(field.from_basic(&keys, basic).unwrap(), live);
        assert!(field.from_basic(&keys, json!("not base64!")).is_err());
    }

    #[test]
    fn test_bytes_hex_persisted() {
        let keys = Keyring::new();
        let field = BytesField::new().encoding(BinaryEncoding::Hex);
        let live = json!([0, 171, 255]);
        let basic = field.to_basic(&keys, &live).unwrap();
        assert_eq!(basic, json!("00abff"));
        assert_eq!(field.from_basic(&keys, json!("00ABff")).unwrap(), live);
        assert!(field.from_basic(&keys, json!("abc")).is_err());
        assert!(field.from_basic(&keys, json!("zz")).is_err());
    }
}
