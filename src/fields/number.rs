//! Numeric fields.

use serde_json::{Number, Value};

use super::{Field, FieldOptions, value_type};
use crate::error::FieldError;

/// An integer, optionally bounded.
///
/// Accepts integers, floats without a fractional part, and numeric strings.
/// Booleans are rejected.
#[derive(Debug, Clone, Default)]
pub struct IntField {
    options: FieldOptions,
    min: Option<i64>,
    max: Option<i64>,
}

impl IntField {
    /// Creates an unbounded integer field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inclusive lower bound.
    #[must_use]
    pub const fn min(mut self, min: i64) -> Self {
        self.min = Some(min);
        self
    }

    /// Inclusive upper bound.
    #[must_use]
    pub const fn max(mut self, max: i64) -> Self {
        self.max = Some(max);
        self
    }

    fn parse(value: &Value) -> Result<i64, FieldError> {
        let invalid = || FieldError::invalid(format!("value is not a valid int: {value}"));
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(integral))
                .ok_or_else(invalid),
            Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid()),
            other => Err(FieldError::invalid(format!(
                "value must be an int, not a {}",
                value_type(other)
            ))),
        }
    }
}

impl Field for IntField {
    field_common!();

    fn type_name(&self) -> &'static str {
        "int"
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        let n = Self::parse(&value)?;
        check_bounds(n, self.min, self.max)?;
        Ok(Value::from(n))
    }
}

/// A floating point number, optionally bounded.
#[derive(Debug, Clone, Default)]
pub struct FloatField {
    options: FieldOptions,
    min: Option<f64>,
    max: Option<f64>,
}

impl FloatField {
    /// Creates an unbounded float field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inclusive lower bound.
    #[must_use]
    pub const fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Inclusive upper bound.
    #[must_use]
    pub const fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }
}

impl Field for FloatField {
    field_common!();

    fn type_name(&self) -> &'static str {
        "float"
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        let f = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            other => {
                return Err(FieldError::invalid(format!(
                    "value must be a float, not a {}",
                    value_type(other)
                )));
            }
        };
        let f = f
            .filter(|f| f.is_finite())
            .ok_or_else(|| FieldError::invalid(format!("value is not a valid float: {value}")))?;
        check_bounds(f, self.min, self.max)?;
        Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| FieldError::invalid(format!("value is not a valid float: {value}")))
    }
}

/// A TCP/UDP port number in `[1, 65535]`.
#[derive(Debug, Clone)]
pub struct PortField {
    inner: IntField,
}

impl Default for PortField {
    fn default() -> Self {
        Self {
            inner: IntField::new().min(1).max(65535),
        }
    }
}

impl PortField {
    /// Creates a port field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Field for PortField {
    fn options(&self) -> &FieldOptions {
        &self.inner.options
    }

    fn options_mut(&mut self) -> &mut FieldOptions {
        &mut self.inner.options
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn type_name(&self) -> &'static str {
        "port"
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        self.inner.check(value)
    }
}

/// Converts a float with no fractional part, within the exactly representable range.
#[allow(clippy::cast_possible_truncation)]
fn integral(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f.abs() < 9.0e15).then(|| f as i64)
}

fn check_bounds<T>(value: T, min: Option<T>, max: Option<T>) -> Result<(), FieldError>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if let Some(min) = min
        && value < min
    {
        return Err(FieldError::invalid(format!("value must be >= {min}")));
    }
    if let Some(max) = max
        && value > max
    {
        return Err(FieldError::invalid(format!("value must be <= {max}")));
    }
    Ok(())
}
