//! Boolean field.

use serde_json::Value;

use super::{Field, FieldOptions, value_type};
use crate::error::FieldError;

/// Strings accepted as `true` (case-insensitive).
pub const TRUE_VALUES: &[&str] = &["t", "true", "1", "on", "yes", "y"];

/// Strings accepted as `false` (case-insensitive).
pub const FALSE_VALUES: &[&str] = &["f", "false", "0", "off", "no", "n"];

/// A boolean. Accepts booleans, numbers (non-zero is `true`) and the
/// strings in [`TRUE_VALUES`] and [`FALSE_VALUES`].
#[derive(Debug, Clone, Default)]
pub struct BoolField {
    options: FieldOptions,
}

impl BoolField {
    /// Creates a boolean field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Parses a boolean string, ignoring case and surrounding whitespace.
#[must_use]
pub fn parse_bool(raw: &str) -> Option<bool> {
    let lowered = raw.trim().to_lowercase();
    if TRUE_VALUES.contains(&lowered.as_str()) {
        Some(true)
    } else if FALSE_VALUES.contains(&lowered.as_str()) {
        Some(false)
    } else {
        None
    }
}

impl Field for BoolField {
    field_common!();

    fn type_name(&self) -> &'static str {
        "bool"
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        let b = match &value {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => parse_bool(s).ok_or_else(|| {
                FieldError::invalid(format!("value is not a valid bool: {s:?}"))
            })?,
            other => {
                return Err(FieldError::invalid(format!(
                    "value must be a bool, not a {}",
                    value_type(other)
                )));
            }
        };
        Ok(Value::Bool(b))
    }
}

/// A boolean that switches its schema level on or off. While it is
/// `false`, validation of the fields and sections next to it is skipped,
/// so required values in a disabled section do not block loading or
/// saving.
#[derive(Debug, Clone, Default)]
pub struct FeatureFlagField {
    options: FieldOptions,
}

impl FeatureFlagField {
    /// Creates a feature flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Field for FeatureFlagField {
    field_common!();

    fn type_name(&self) -> &'static str {
        "bool"
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        BoolField::new().check(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_bool_strings() {
        let field = BoolField::new();
        for raw in ["t", "TRUE", " yes ", "On", "1", "y"] {
            assert_eq!(field.validate(json!(raw)).unwrap(), json!(true), "{raw}");
        }
        for raw in ["f", "False", "no", "OFF", "0", "n"] {
            assert_eq!(field.validate(json!(raw)).unwrap(), json!(false), "{raw}");
        }
        assert!(field.validate(json!("maybe")).is_err());
    }

    #[test]
    fn test_bool_numbers_and_types() {
        let field = BoolField::new();
        assert_eq!(field.validate(json!(2)).unwrap(), json!(true));
        assert_eq!(field.validate(json!(0)).unwrap(), json!(false));
        assert!(field.validate(json!([true])).is_err());
    }

    #[test]
    fn test_feature_flag_validates_like_bool() {
        let field = FeatureFlagField::new();
        assert_eq!(field.validate(json!("off")).unwrap(), json!(false));
        assert_eq!(field.validate(json!(1)).unwrap(), json!(true));
        assert!(field.validate(json!("maybe")).is_err());
    }

    proptest! {
        #[test]
        fn test_parse_bool_case_insensitive(idx in 0usize..6, upper in any::<bool>()) {
            let raw = if upper { TRUE_VALUES[idx].to_uppercase() } else { TRUE_VALUES[idx].to_string() };
            prop_assert_eq!(parse_bool(&raw), Some(true));
            let raw = if upper { FALSE_VALUES[idx].to_uppercase() } else { FALSE_VALUES[idx].to_string() };
            prop_assert_eq!(parse_bool(&raw), Some(false));
        }

        #[test]
        fn test_parse_bool_rejects_other_words(word in "[g-mp-sx-z]{2,8}") {
            prop_assert_eq!(parse_bool(&word), None);
        }
    }
}
