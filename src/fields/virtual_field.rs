//! Virtual field: a computed value with an optional setter.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::{Field, FieldOptions, Shape};
use crate::config::Config;
use crate::error::{ConfigError, FieldError};

/// Computes a virtual value from the config that holds the field.
pub type VirtualGetter = Arc<dyn Fn(&Config) -> Result<Value, ConfigError> + Send + Sync>;

/// Applies a value written to a virtual field to the config that holds it.
pub type VirtualSetter = Arc<dyn Fn(&mut Config, Value) -> Result<(), ConfigError> + Send + Sync>;

/// A value computed from other fields. Never stored; excluded from
/// [`Config::to_tree`] unless virtual fields are requested. Without a
/// setter the field is read-only.
#[derive(Clone)]
pub struct VirtualField {
    options: FieldOptions,
    getter: VirtualGetter,
    setter: Option<VirtualSetter>,
}

impl fmt::Debug for VirtualField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualField")
            .field("options", &self.options)
            .field("readonly", &self.setter.is_none())
            .finish_non_exhaustive()
    }
}

impl VirtualField {
    /// Creates a read-only virtual field.
    pub fn new(
        getter: impl Fn(&Config) -> Result<Value, ConfigError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            options: FieldOptions::default(),
            getter: Arc::new(getter),
            setter: None,
        }
    }

    /// Adds a setter.
    #[must_use]
    pub fn with_setter(
        mut self,
        setter: impl Fn(&mut Config, Value) -> Result<(), ConfigError> + Send + Sync + 'static,
    ) -> Self {
        self.setter = Some(Arc::new(setter));
        self
    }

    /// Computes the value for `config`.
    ///
    /// # Errors
    ///
    /// Propagates the getter's error.
    pub fn get(&self, config: &Config) -> Result<Value, ConfigError> {
        (self.getter)(config)
    }

    /// The setter, if the field is writable.
    #[must_use]
    pub fn setter(&self) -> Option<VirtualSetter> {
        self.setter.clone()
    }
}

impl Field for VirtualField {
    field_common!();

    fn type_name(&self) -> &'static str {
        "virtual"
    }

    fn shape(&self) -> Shape {
        Shape::Virtual
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        if self.setter.is_none() {
            return Err(FieldError::invalid("field is readonly"));
        }
        Ok(value)
    }
}
