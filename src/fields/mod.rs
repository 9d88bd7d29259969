//! Field definitions.
//!
//! A field is a stateless validator and normalizer for one value slot in
//! a schema. Live values are stored by the [`Config`](crate::config::Config),
//! never by the field. Every field kind implements [`Field`]; the builder
//! methods shared by all kinds come from [`FieldBuilder`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::encryption::Keyring;
use crate::error::FieldError;

/// Implements the accessor methods every field kind shares.
macro_rules! field_common {
    () => {
        fn options(&self) -> &$crate::fields::FieldOptions {
            &self.options
        }

        fn options_mut(&mut self) -> &mut $crate::fields::FieldOptions {
            &mut self.options
        }

        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }
    };
}

mod boolean;
mod bytes;
mod dict;
mod file;
mod list;
mod net;
mod number;
mod secure;
mod string;
mod virtual_field;

pub use boolean::{BoolField, FeatureFlagField, parse_bool};
pub use bytes::{BinaryEncoding, BytesField};
pub use dict::DictField;
pub use file::{Exists, FilenameField, IncludeField};
pub use list::{ListField, ListItem};
pub use net::{HostnameField, IPv4AddressField, IPv4NetworkField, UrlField};
pub use number::{FloatField, IntField, PortField};
pub use secure::{ChallengeField, DigestAlgorithm, DigestValue, SecureField};
pub use string::{ApplicationModeField, Case, LogLevelField, StringField, Strip};
pub use virtual_field::{VirtualField, VirtualGetter, VirtualSetter};

// ============================================================================
// Options
// ============================================================================

/// Custom validator run after the field's own checks.
pub type FieldValidator = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// Factory producing a default value on every read.
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// A field's default value.
#[derive(Clone, Default)]
pub enum DefaultValue {
    /// No default; unset reads return `null`
    #[default]
    None,
    /// A fixed value
    Static(Value),
    /// Computed on every read
    Factory(DefaultFactory),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Static(v) => f.debug_tuple("Static").field(v).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Options shared by every field kind.
#[derive(Clone, Default)]
pub struct FieldOptions {
    /// Default value for unset reads
    pub default: DefaultValue,
    /// Reject `null` (and, for strings and containers, empty values)
    pub required: bool,
    /// Mask the value in [`Config::to_tree`](crate::config::Config::to_tree) when a mask is given
    pub sensitive: bool,
    /// Friendly display name used in error messages
    pub name: Option<String>,
    /// Help text, used for generated command-line arguments
    pub help: Option<String>,
    /// Environment variable that overrides the default when set
    pub env: Option<String>,
    /// Custom validator
    pub validator: Option<FieldValidator>,
}

impl fmt::Debug for FieldOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldOptions")
            .field("default", &self.default)
            .field("required", &self.required)
            .field("sensitive", &self.sensitive)
            .field("name", &self.name)
            .field("env", &self.env)
            .field("validator", &self.validator.as_ref().map(|_| ".."))
            .finish_non_exhaustive()
    }
}

/// How configs and the command line treat a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// A single primitive value; settable from the command line
    Scalar,
    /// A list, held in a [`ListProxy`](crate::config::ListProxy)
    Sequence,
    /// A free-form mapping
    Mapping,
    /// Computed from other fields; never stored
    Virtual,
    /// Names another document to merge at load time
    Include,
    /// Structured value with no command-line form
    Opaque,
}

// ============================================================================
// Field Trait
// ============================================================================

/// A typed validator for one value slot.
pub trait Field: Any + fmt::Debug + Send + Sync {
    /// Shared options.
    fn options(&self) -> &FieldOptions;

    /// Shared options, mutably (used by [`FieldBuilder`]).
    fn options_mut(&mut self) -> &mut FieldOptions;

    /// Downcasting hook.
    fn as_any(&self) -> &dyn Any;

    /// Short type label, e.g. `"int"`, used in help text.
    fn type_name(&self) -> &'static str;

    /// Kind-specific normalization and checks. Never called with `null`.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Invalid`] when the value is rejected.
    fn check(&self, value: Value) -> Result<Value, FieldError>;

    /// How configs and the command line treat this field.
    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    /// Converts a live value to its persisted form.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] if the value cannot be converted.
    fn to_basic(&self, _keys: &Keyring, value: &Value) -> Result<Value, FieldError> {
        Ok(value.clone())
    }

    /// Converts a persisted value to its live form, before validation.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] if the value cannot be converted.
    fn from_basic(&self, _keys: &Keyring, value: Value) -> Result<Value, FieldError> {
        Ok(value)
    }

    /// Extra fields registered next to this one when it is inserted under `key`.
    fn companions(&self, _key: &str) -> Vec<(String, Arc<dyn Field>)> {
        Vec::new()
    }

    /// Validates `value`: required check, [`Field::check`], then the custom validator.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Invalid`] when any stage rejects the value.
    fn validate(&self, value: Value) -> Result<Value, FieldError> {
        if value.is_null() {
            if self.options().required {
                return Err(FieldError::invalid("value is required"));
            }
            return Ok(Value::Null);
        }
        let value = self.check(value)?;
        match &self.options().validator {
            Some(validator) => validator(value).map_err(FieldError::Invalid),
            None => Ok(value),
        }
    }

    /// Returns the default value, computed on every call for factories.
    ///
    /// A non-empty environment variable configured with
    /// [`FieldBuilder::env`] takes precedence and is validated.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Invalid`] if the environment value is rejected.
    fn default_value(&self) -> Result<Value, FieldError> {
        if let Some(raw) = self.env_value() {
            return self.validate(Value::String(raw));
        }
        Ok(match &self.options().default {
            DefaultValue::None => Value::Null,
            DefaultValue::Static(value) => value.clone(),
            DefaultValue::Factory(factory) => factory(),
        })
    }

    /// Display name for messages: the custom name, else `path`.
    fn friendly_name(&self, path: &str) -> String {
        self.options()
            .name
            .clone()
            .unwrap_or_else(|| path.to_string())
    }

    /// Value of the configured environment variable, if set and non-empty.
    fn env_value(&self) -> Option<String> {
        self.options()
            .env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|raw| !raw.is_empty())
    }
}

/// Builder methods available on every field kind.
pub trait FieldBuilder: Field + Sized {
    /// Sets a fixed default value.
    #[must_use]
    fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.options_mut().default = DefaultValue::Static(value.into());
        self
    }

    /// Sets a default computed on every read.
    #[must_use]
    fn with_default_fn(mut self, factory: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.options_mut().default = DefaultValue::Factory(Arc::new(factory));
        self
    }

    /// Marks the field as required.
    #[must_use]
    fn required(mut self) -> Self {
        self.options_mut().required = true;
        self
    }

    /// Marks the field as sensitive.
    #[must_use]
    fn sensitive(mut self) -> Self {
        self.options_mut().sensitive = true;
        self
    }

    /// Sets the friendly display name.
    #[must_use]
    fn named(mut self, name: impl Into<String>) -> Self {
        self.options_mut().name = Some(name.into());
        self
    }

    /// Sets help text.
    #[must_use]
    fn help(mut self, text: impl Into<String>) -> Self {
        self.options_mut().help = Some(text.into());
        self
    }

    /// Reads the default from an environment variable when it is set.
    #[must_use]
    fn env(mut self, var: impl Into<String>) -> Self {
        self.options_mut().env = Some(var.into());
        self
    }

    /// Adds a custom validator, run after the field's own checks.
    #[must_use]
    fn validator(
        mut self,
        validator: impl Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        self.options_mut().validator = Some(Arc::new(validator));
        self
    }
}

impl<T: Field + Sized> FieldBuilder for T {}

// ============================================================================
// Any Field
// ============================================================================

/// Accepts any value.
#[derive(Debug, Clone, Default)]
pub struct AnyField {
    options: FieldOptions,
}

impl AnyField {
    /// Creates an unconstrained field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Field for AnyField {
    field_common!();

    fn type_name(&self) -> &'static str {
        "any"
    }

    fn shape(&self) -> Shape {
        Shape::Opaque
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        Ok(value)
    }
}

/// Short label of a value's type, for error messages.
pub(crate) fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}
