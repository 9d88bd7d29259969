//! Dict field.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::{Field, FieldOptions, Shape, value_type};
use crate::encryption::Keyring;
use crate::error::FieldError;

/// A free-form mapping, optionally with typed keys and values.
///
/// A required dict must be non-empty.
#[derive(Debug, Clone, Default)]
pub struct DictField {
    options: FieldOptions,
    key_field: Option<Arc<dyn Field>>,
    value_field: Option<Arc<dyn Field>>,
}

impl DictField {
    /// Creates an untyped dict field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates every key with `field`. Keys must stay strings.
    #[must_use]
    pub fn keys(mut self, field: impl Field) -> Self {
        self.key_field = Some(Arc::new(field));
        self
    }

    /// Validates every value with `field`.
    #[must_use]
    pub fn values(mut self, field: impl Field) -> Self {
        self.value_field = Some(Arc::new(field));
        self
    }

    fn map_values(
        &self,
        value: &Value,
        f: impl Fn(&dyn Field, &Value) -> Result<Value, FieldError>,
    ) -> Result<Value, FieldError> {
        match (&self.value_field, value) {
            (Some(field), Value::Object(map)) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), f(field.as_ref(), v)?)))
                .collect::<Result<Map<_, _>, FieldError>>()
                .map(Value::Object),
            _ => Ok(value.clone()),
        }
    }
}

impl Field for DictField {
    field_common!();

    fn type_name(&self) -> &'static str {
        "dict"
    }

    fn shape(&self) -> Shape {
        Shape::Mapping
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        let Value::Object(map) = value else {
            return Err(FieldError::invalid(format!(
                "value must be a dict, not a {}",
                value_type(&value)
            )));
        };
        if self.options.required && map.is_empty() {
            return Err(FieldError::invalid("value is required"));
        }

        let mut out = Map::with_capacity(map.len());
        for (key, item) in map {
            let key = match &self.key_field {
                Some(field) => match field.validate(Value::String(key.clone()))? {
                    Value::String(s) => s,
                    other => {
                        return Err(FieldError::invalid(format!(
                            "dict key {key:?} must remain a string, not a {}",
                            value_type(&other)
                        )));
                    }
                },
                None => key,
            };
            let item = match &self.value_field {
                Some(field) => field.validate(item).map_err(|e| match e {
                    FieldError::Invalid(msg) => FieldError::Invalid(format!("key {key:?}: {msg}")),
                    other => other,
                })?,
                None => item,
            };
            out.insert(key, item);
        }
        Ok(Value::Object(out))
    }

    fn to_basic(&self, keys: &Keyring, value: &Value) -> Result<Value, FieldError> {
        self.map_values(value, |field, v| field.to_basic(keys, v))
    }

    fn from_basic(&self, keys: &Keyring, value: Value) -> Result<Value, FieldError> {
        self.map_values(&value, |field, v| field.from_basic(keys, v.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldBuilder, IntField, StringField};
    use serde_json::json;

    #[test]
    fn test_untyped_dict() {
        let field = DictField::new();
        let value = json!({"b": 1, "a": [true]});
        assert_eq!(field.validate(value.clone()).unwrap(), value);
        assert!(field.validate(json!([1])).is_err());
    }

    #[test]
    fn test_typed_values() {
        let field = DictField::new().values(IntField::new().min(0));
        assert_eq!(
            field.validate(json!({"x": "3"})).unwrap(),
            json!({"x": 3})
        );
        let err = field.validate(json!({"y": -1})).unwrap_err().to_string();
        assert_eq!(err, "key \"y\": value must be >= 0");
    }

    #[test]
    fn test_typed_keys() {
        let field = DictField::new().keys(StringField::new().choices(["a", "b"]));
        assert!(field.validate(json!({"a": 1})).is_ok());
        assert!(field.validate(json!({"c": 1})).is_err());
    }

    #[test]
    fn test_required_dict_non_empty() {
        assert!(DictField::new().required().validate(json!({})).is_err());
    }
}
