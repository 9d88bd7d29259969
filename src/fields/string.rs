//! String fields.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;

use super::{Field, FieldOptions, VirtualField, value_type};
use crate::error::FieldError;

static MODE_NAME: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new("^[a-zA-Z0-9_]+$").ok());

/// Case transformation applied before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    /// Lowercase the value
    Lower,
    /// Uppercase the value
    Upper,
}

/// Strip transformation applied before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strip {
    /// Strip leading and trailing whitespace
    Whitespace,
    /// Strip any of these characters from both ends
    Chars(String),
}

/// A string, optionally transformed and constrained.
#[derive(Debug, Clone, Default)]
pub struct StringField {
    options: FieldOptions,
    min_len: Option<usize>,
    max_len: Option<usize>,
    regex: Option<Regex>,
    choices: Option<Vec<String>>,
    case: Option<Case>,
    strip: Option<Strip>,
}

impl StringField {
    /// Creates an unconstrained string field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum length in characters.
    #[must_use]
    pub const fn min_len(mut self, len: usize) -> Self {
        self.min_len = Some(len);
        self
    }

    /// Maximum length in characters.
    #[must_use]
    pub const fn max_len(mut self, len: usize) -> Self {
        self.max_len = Some(len);
        self
    }

    /// Pattern the value must match, anchored at the start of the value.
    #[must_use]
    pub fn regex(mut self, regex: Regex) -> Self {
        self.regex = Some(regex);
        self
    }

    /// Restricts the value to one of `choices`.
    #[must_use]
    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// Transforms the value's case before validation.
    #[must_use]
    pub const fn transform_case(mut self, case: Case) -> Self {
        self.case = Some(case);
        self
    }

    /// Strips the value before validation.
    #[must_use]
    pub fn strip(mut self, strip: Strip) -> Self {
        self.strip = Some(strip);
        self
    }

    /// The configured choices, if any.
    #[must_use]
    pub fn choice_list(&self) -> Option<&[String]> {
        self.choices.as_deref()
    }

    fn check_str(&self, raw: &str) -> Result<String, FieldError> {
        let mut value = match &self.strip {
            Some(Strip::Whitespace) => raw.trim().to_string(),
            Some(Strip::Chars(chars)) => raw.trim_matches(|c| chars.contains(c)).to_string(),
            None => raw.to_string(),
        };

        if self.options.required && value.is_empty() {
            return Err(FieldError::invalid("value is required"));
        }

        match self.case {
            Some(Case::Lower) => value = value.to_lowercase(),
            Some(Case::Upper) => value = value.to_uppercase(),
            None => {}
        }

        let len = value.chars().count();
        if let Some(min) = self.min_len
            && len < min
        {
            return Err(FieldError::invalid(format!(
                "value must be at least {min} characters"
            )));
        }
        if let Some(max) = self.max_len
            && len > max
        {
            return Err(FieldError::invalid(format!(
                "value must not be more than {max} characters"
            )));
        }

        if let Some(regex) = &self.regex
            && !regex.find(&value).is_some_and(|m| m.start() == 0)
        {
            return Err(FieldError::invalid(format!(
                "value does not match pattern {}",
                regex.as_str()
            )));
        }

        if let Some(choices) = &self.choices
            && !choices.contains(&value)
        {
            return Err(FieldError::invalid(format!(
                "value is not a valid choice: must be one of: {}",
                choices.join(", ")
            )));
        }

        Ok(value)
    }
}

impl Field for StringField {
    field_common!();

    fn type_name(&self) -> &'static str {
        "string"
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        match value {
            Value::String(s) => self.check_str(&s).map(Value::String),
            other => Err(FieldError::invalid(format!(
                "value must be a string, not a {}",
                value_type(&other)
            ))),
        }
    }
}

// ============================================================================
// Log Level
// ============================================================================

/// A log level name: `debug`, `info`, `warning`, `error` or `critical`.
///
/// Input is stripped and lowercased.
#[derive(Debug, Clone)]
pub struct LogLevelField {
    inner: StringField,
}

impl Default for LogLevelField {
    fn default() -> Self {
        Self::with_levels(["debug", "info", "warning", "error", "critical"])
    }
}

impl LogLevelField {
    /// Creates a field accepting the standard levels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a field accepting custom level names.
    #[must_use]
    pub fn with_levels<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: StringField::new()
                .choices(levels)
                .transform_case(Case::Lower)
                .strip(Strip::Whitespace),
        }
    }
}

impl Field for LogLevelField {
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
        "level"
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        self.inner.check(value)
    }
}

// ============================================================================
// Application Mode
// ============================================================================

/// The application's operating mode.
///
/// When inserted into a schema, a read-only boolean virtual field named
/// `is_<mode>_mode` is registered next to it for every mode.
#[derive(Debug, Clone)]
pub struct ApplicationModeField {
    inner: StringField,
    modes: Vec<String>,
    helpers: bool,
}

impl Default for ApplicationModeField {
    fn default() -> Self {
        Self {
            inner: Self::string_field(["development", "production"]),
            modes: vec!["development".to_string(), "production".to_string()],
            helpers: true,
        }
    }
}

impl ApplicationModeField {
    /// Creates a field with the `development` and `production` modes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a field with custom modes.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Invalid`] if a mode name contains characters
    /// other than ASCII letters, digits and `_`.
    pub fn with_modes<I, S>(modes: I) -> Result<Self, FieldError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let modes: Vec<String> = modes.into_iter().map(Into::into).collect();
        if let Some(bad) = modes
            .iter()
            .find(|m| !MODE_NAME.as_ref().is_some_and(|re| re.is_match(m)))
        {
            return Err(FieldError::invalid(format!("invalid mode name: {bad}")));
        }
        Ok(Self {
            inner: Self::string_field(modes.clone()),
            modes,
            helpers: true,
        })
    }

    /// Skips registering the `is_<mode>_mode` helper fields.
    #[must_use]
    pub const fn without_helpers(mut self) -> Self {
        self.helpers = false;
        self
    }

    fn string_field<I, S>(modes: I) -> StringField
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StringField::new()
            .choices(modes)
            .transform_case(Case::Lower)
            .strip(Strip::Whitespace)
    }
}

impl Field for ApplicationModeField {
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
        "mode"
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        self.inner.check(value)
    }

    fn companions(&self, key: &str) -> Vec<(String, Arc<dyn Field>)> {
        if !self.helpers {
            return Vec::new();
        }
        self.modes
            .iter()
            .map(|mode| {
                let key = key.to_string();
                let mode = mode.clone();
                let name = format!("is_{mode}_mode");
                let helper = VirtualField::new(move |cfg| {
                    Ok(Value::Bool(cfg.get(&key)?.as_str() == Some(mode.as_str())))
                });
                (name, Arc::new(helper) as Arc<dyn Field>)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldBuilder;
    use serde_json::json;

    #[test]
    fn test_string_accepts_string() {
        let field = StringField::new();
        assert_eq!(field.validate(json!("hello")).unwrap(), json!("hello"));
    }

    #[test]
    fn test_string_rejects_non_string() {
        let err = StringField::new().validate(json!(12)).unwrap_err();
        assert_eq!(err.to_string(), "value must be a string, not a int");
    }

    #[test]
    fn test_choices_listed_in_error() {
        let field = StringField::new().choices(["red", "green", "blue"]);
        assert_eq!(field.validate(json!("green")).unwrap(), json!("green"));
        let err = field.validate(json!("purple")).unwrap_err().to_string();
        assert!(err.contains("red, green, blue"), "{err}");
    }

    #[test]
    fn test_long_choice_list_not_truncated() {
        let choices: Vec<String> = (0..20).map(|i| format!("c{i}")).collect();
        let field = StringField::new().choices(choices.clone());
        let err = field.validate(json!("nope")).unwrap_err().to_string();
        assert!(err.ends_with(&choices.join(", ")), "{err}");
    }

    #[test]
    fn test_transform_then_choices() {
        let field = StringField::new()
            .choices(["prod"])
            .transform_case(Case::Lower)
            .strip(Strip::Whitespace);
        assert_eq!(field.validate(json!("  PROD ")).unwrap(), json!("prod"));

        let upper = StringField::new().transform_case(Case::Upper);
        assert_eq!(upper.validate(json!("abc")).unwrap(), json!("ABC"));
    }

    #[test]
    fn test_strip_chars() {
        let field = StringField::new().strip(Strip::Chars("/".to_string()));
        assert_eq!(field.validate(json!("/api/")).unwrap(), json!("api"));
    }

    #[test]
    fn test_length_limits() {
        let field = StringField::new().min_len(2).max_len(4);
        assert!(field.validate(json!("a")).is_err());
        assert!(field.validate(json!("abcde")).is_err());
        assert_eq!(field.validate(json!("abc")).unwrap(), json!("abc"));
    }

    #[test]
    fn test_regex_anchored_at_start() {
        let field = StringField::new().regex(Regex::new(r"\d+").unwrap());
        assert!(field.validate(json!("123abc")).is_ok());
        let err = field.validate(json!("abc123")).unwrap_err();
        assert!(err.to_string().contains(r"\d+"));
    }

    #[test]
    fn test_required_rejects_empty() {
        let field = StringField::new().required().strip(Strip::Whitespace);
        assert_eq!(
            field.validate(json!("   ")).unwrap_err().to_string(),
            "value is required"
        );
    }

    #[test]
    fn test_log_level() {
        let field = LogLevelField::new();
        assert_eq!(field.validate(json!(" WARNING ")).unwrap(), json!("warning"));
        let err = field.validate(json!("verbose")).unwrap_err().to_string();
        assert!(err.contains("debug, info, warning, error, critical"));
    }

    #[test]
    fn test_application_mode_helpers() {
        let field = ApplicationModeField::new();
        let names: Vec<String> = field
            .companions("mode")
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, ["is_development_mode", "is_production_mode"]);
        assert!(field.without_helpers().companions("mode").is_empty());
    }

    #[test]
    fn test_application_mode_rejects_bad_names() {
        assert!(ApplicationModeField::with_modes(["dev", "pre-prod"]).is_err());
        assert!(ApplicationModeField::with_modes(["dev", "staging_2"]).is_ok());
    }
}
