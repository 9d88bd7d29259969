//! List field.

use std::sync::Arc;

use serde_json::Value;

use super::{Field, FieldOptions, Shape, value_type};
use crate::encryption::Keyring;
use crate::error::FieldError;
use crate::schema::Schema;

/// What a list holds.
#[derive(Debug, Clone)]
pub enum ListItem {
    /// Values validated by a field
    Field(Arc<dyn Field>),
    /// Nested configs of a schema
    Schema(Arc<Schema>),
}

/// A list of values, optionally typed by an item field or schema.
///
/// The live value is a [`ListProxy`](crate::config::ListProxy), which
/// validates each item as the list is mutated. A required list must be
/// non-empty.
#[derive(Debug, Clone, Default)]
pub struct ListField {
    options: FieldOptions,
    item: Option<ListItem>,
}

impl ListField {
    /// Creates a list of arbitrary values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a list whose items are validated by `field`.
    #[must_use]
    pub fn of(field: impl Field) -> Self {
        Self {
            options: FieldOptions::default(),
            item: Some(ListItem::Field(Arc::new(field))),
        }
    }

    /// Creates a list whose items are configs of `schema`.
    #[must_use]
    pub fn of_schema(schema: Schema) -> Self {
        Self {
            options: FieldOptions::default(),
            item: Some(ListItem::Schema(Arc::new(schema))),
        }
    }

    /// The item type, if any.
    #[must_use]
    pub const fn item(&self) -> Option<&ListItem> {
        self.item.as_ref()
    }

    /// Validates one item of a field-typed list.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Invalid`] if the item field rejects `value`.
    pub fn check_item(&self, value: Value) -> Result<Value, FieldError> {
        match &self.item {
            Some(ListItem::Field(field)) => field.validate(value),
            Some(ListItem::Schema(_)) if !value.is_object() => Err(FieldError::invalid(format!(
                "list item must be a dict, not a {}",
                value_type(&value)
            ))),
            _ => Ok(value),
        }
    }
}

impl Field for ListField {
    field_common!();

    fn type_name(&self) -> &'static str {
        "list"
    }

    fn shape(&self) -> Shape {
        Shape::Sequence
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        let Value::Array(items) = value else {
            return Err(FieldError::invalid(format!(
                "value must be a list, not a {}",
                value_type(&value)
            )));
        };
        if self.options.required && items.is_empty() {
            return Err(FieldError::invalid("value is required"));
        }
        items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| {
                self.check_item(item).map_err(|e| match e {
                    FieldError::Invalid(msg) => FieldError::Invalid(format!("item {idx}: {msg}")),
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    fn to_basic(&self, keys: &Keyring, value: &Value) -> Result<Value, FieldError> {
        match (&self.item, value) {
            (Some(ListItem::Field(field)), Value::Array(items)) => items
                .iter()
                .map(|item| field.to_basic(keys, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            _ => Ok(value.clone()),
        }
    }

    fn from_basic(&self, keys: &Keyring, value: Value) -> Result<Value, FieldError> {
        match (&self.item, value) {
            (Some(ListItem::Field(field)), Value::Array(items)) => items
                .into_iter()
                .map(|item| field.from_basic(keys, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (_, value) => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldBuilder, IntField, PortField};
    use serde_json::json;

    #[test]
    fn test_untyped_list() {
        let field = ListField::new();
        assert_eq!(field.validate(json!([1, "a"])).unwrap(), json!([1, "a"]));
        assert!(field.validate(json!("a")).is_err());
    }

    #[test]
    fn test_typed_list_validates_items() {
        let field = ListField::of(IntField::new());
        assert_eq!(field.validate(json!(["1", 2])).unwrap(), json!([1, 2]));
        let err = field.validate(json!([1, "x"])).unwrap_err().to_string();
        assert!(err.starts_with("item 1:"), "{err}");
    }

    #[test]
    fn test_required_list_non_empty() {
        let field = ListField::of(PortField::new()).required();
        assert_eq!(
            field.validate(json!([])).unwrap_err().to_string(),
            "value is required"
        );
    }

    #[test]
    fn test_schema_list_requires_dicts() {
        let field = ListField::of_schema(Schema::new());
        assert!(field.validate(json!([{}])).is_ok());
        assert!(field.validate(json!([1])).is_err());
    }
}
