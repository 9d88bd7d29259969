//! Live configuration values.
//!
//! A [`Config`] is an instance of a [`Schema`]: it stores validated values
//! for the schema's fields and one nested `Config` per nested schema.
//! Values are addressed by dotted paths (`"http.ssl.enabled"`).
//!
//! Loading and saving live in [`loader`]; list values are held in a
//! [`ListProxy`] that validates every mutation.

mod list;
mod loader;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::encryption::Keyring;
use crate::error::{ConfigError, FieldError};
use crate::fields::{ChallengeField, FeatureFlagField, Field, ListField, Shape, VirtualField};
use crate::schema::{ConfigValidator, Node, Schema};

pub use list::ListProxy;

/// Default maximum nesting depth for include directives.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 16;

/// Environment variable overriding [`DEFAULT_MAX_INCLUDE_DEPTH`].
pub const MAX_INCLUDE_DEPTH_ENV: &str = "SCHEMACONF_MAX_INCLUDE_DEPTH";

/// A stored field value.
#[derive(Debug, Clone)]
enum Slot {
    Value(Value),
    List(ListProxy),
}

impl Slot {
    /// Whether the slot holds a value that was set, not just a default
    /// materialized for list access.
    const fn is_set(&self) -> bool {
        match self {
            Self::Value(_) => true,
            Self::List(proxy) => proxy.is_modified(),
        }
    }
}

/// A live instance of a [`Schema`].
///
/// Cloning copies the whole tree onto a forked [`Keyring`], so key file
/// changes on the clone do not reach the original.
pub struct Config {
    schema: Arc<Schema>,
    path: String,
    values: IndexMap<String, Slot>,
    sections: IndexMap<String, Self>,
    keyring: Arc<Keyring>,
    validators: Vec<ConfigValidator>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let keyring = Arc::new(self.keyring.fork());
        let mut copy = Self {
            schema: Arc::clone(&self.schema),
            path: String::new(),
            values: self.values.clone(),
            sections: self.sections.clone(),
            keyring: Arc::clone(&keyring),
            validators: self.validators.clone(),
        };
        copy.adopt(self.path.clone(), &keyring);
        copy
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("values", &self.values)
            .field("sections", &self.sections)
            .finish_non_exhaustive()
    }
}

/// Joins a path prefix and a key with a dot.
pub(crate) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Attaches a field's path and friendly name to a field error.
pub(crate) fn field_error(path: String, field: &dyn Field, err: FieldError) -> ConfigError {
    match err {
        FieldError::Invalid(message) => ConfigError::Validation {
            name: field.friendly_name(&path),
            path,
            message,
        },
        FieldError::Crypto(source) => ConfigError::Crypto { path, source },
    }
}

/// Replaces a sensitive value with `mask`. A one-character mask is
/// repeated to the length of a string value.
fn mask_value(mask: &str, value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) if mask.chars().count() == 1 => Value::String(mask.repeat(s.chars().count())),
        _ => Value::String(mask.to_string()),
    }
}

/// How a snapshot renders values.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Snapshot<'a> {
    /// Persisted form (secure values encrypted) instead of live values
    pub basic: bool,
    /// Replacement for sensitive values
    pub mask: Option<&'a str>,
    /// Include virtual fields
    pub include_virtual: bool,
}

impl Snapshot<'_> {
    const LIVE: Self = Self {
        basic: false,
        mask: None,
        include_virtual: false,
    };
}

impl Config {
    /// Creates an empty config for `schema`, with its own keyring.
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::bound(schema, String::new(), Arc::new(Keyring::new()))
    }

    pub(crate) fn bound(schema: Arc<Schema>, path: String, keyring: Arc<Keyring>) -> Self {
        let sections = schema
            .nodes()
            .filter_map(|(key, node)| match node {
                Node::Schema(child) => Some((
                    key.to_string(),
                    Self::bound(Arc::clone(child), join_path(&path, key), Arc::clone(&keyring)),
                )),
                Node::Field(_) => None,
            })
            .collect();
        Self {
            schema,
            path,
            values: IndexMap::new(),
            sections,
            keyring,
            validators: Vec::new(),
        }
    }

    /// Adds a config-level validator, run after the schema validators.
    #[must_use]
    pub fn with_validator(
        mut self,
        validator: impl Fn(&Self) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// The schema this config instantiates.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Dotted path of this config within its tree (empty for the root).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The keyring shared by this config tree.
    #[must_use]
    pub const fn keyring(&self) -> &Arc<Keyring> {
        &self.keyring
    }

    /// Uses `path` as the key file for every secure field in this tree.
    pub fn set_key_file(&self, path: impl Into<std::path::PathBuf>) {
        self.keyring.set_key_file(path);
    }

    fn full_path(&self, key: &str) -> String {
        join_path(&self.path, key)
    }

    /// Rebinds this config (and everything below it) to a new position and keyring.
    pub(crate) fn adopt(&mut self, path: String, keyring: &Arc<Keyring>) {
        self.keyring = Arc::clone(keyring);
        for (key, section) in &mut self.sections {
            section.adopt(join_path(&path, key), keyring);
        }
        for (key, slot) in &mut self.values {
            if let Slot::List(proxy) = slot {
                proxy.adopt(join_path(&path, key), keyring);
            }
        }
        self.path = path;
    }

    // ========================================================================
    // Path Resolution
    // ========================================================================

    fn locate<'p>(&self, path: &'p str) -> Result<(&Self, &'p str), ConfigError> {
        let mut config = self;
        let mut rest = path;
        while let Some((head, tail)) = rest.split_once('.') {
            config = match config.schema.node(head) {
                Some(Node::Schema(_)) => config.sections.get(head),
                Some(Node::Field(_)) => None,
                None => return Err(config.schema.unknown(&self.full_path(path), head)),
            }
            .ok_or_else(|| ConfigError::UnknownPath {
                path: self.full_path(path),
                suggestion: None,
            })?;
            rest = tail;
        }
        Ok((config, rest))
    }

    fn locate_mut<'p>(&mut self, path: &'p str) -> Result<(&mut Self, &'p str), ConfigError> {
        let full = self.full_path(path);
        let mut config = self;
        let mut rest = path;
        while let Some((head, tail)) = rest.split_once('.') {
            match config.schema.node(head) {
                Some(Node::Schema(_)) => {}
                Some(Node::Field(_)) => {
                    return Err(ConfigError::UnknownPath {
                        path: full,
                        suggestion: None,
                    });
                }
                None => return Err(config.schema.unknown(&full, head)),
            }
            config = config
                .sections
                .get_mut(head)
                .ok_or_else(|| ConfigError::UnknownPath {
                    path: full.clone(),
                    suggestion: None,
                })?;
            rest = tail;
        }
        Ok((config, rest))
    }

    fn node(&self, key: &str) -> Result<Node, ConfigError> {
        self.schema
            .node(key)
            .cloned()
            .ok_or_else(|| self.schema.unknown(&self.full_path(key), key))
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Reads the value at `path`.
    ///
    /// Unset fields return their default; sections return a snapshot of
    /// their values; virtual fields call their getter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPath`] if nothing is defined at `path`,
    /// or the error of a failing default or getter.
    pub fn get(&self, path: &str) -> Result<Value, ConfigError> {
        let (owner, key) = self.locate(path)?;
        owner.get_local(key)
    }

    /// Reads the value at `path` and deserializes it into `T`.
    ///
    /// # Errors
    ///
    /// Returns the [`Config::get`] error, or [`ConfigError::Validation`] if
    /// the value does not deserialize into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConfigError> {
        let value = self.get(path)?;
        serde_json::from_value(value).map_err(|e| {
            let path = self.full_path(path);
            ConfigError::Validation {
                name: path.clone(),
                path,
                message: format!("cannot convert value: {e}"),
            }
        })
    }

    fn get_local(&self, key: &str) -> Result<Value, ConfigError> {
        match self.node(key)? {
            Node::Schema(_) => self.section_local(key)?.as_value(),
            Node::Field(field) => {
                if field.shape() == Shape::Virtual
                    && let Some(virtual_field) = field.as_any().downcast_ref::<VirtualField>()
                {
                    return virtual_field.get(self);
                }
                match self.values.get(key) {
                    Some(Slot::Value(value)) => Ok(value.clone()),
                    Some(Slot::List(proxy)) => proxy.snapshot(Snapshot::LIVE),
                    None => field
                        .default_value()
                        .map_err(|e| field_error(self.full_path(key), field.as_ref(), e)),
                }
            }
        }
    }

    /// Whether a value at `path` was set explicitly or by a load.
    ///
    /// For a section, whether anything below it was set. Unknown paths
    /// return `false`.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        let Ok((owner, key)) = self.locate(path) else {
            return false;
        };
        owner.values.get(key).is_some_and(Slot::is_set)
            || owner.sections.get(key).is_some_and(Self::is_touched)
    }

    fn is_touched(&self) -> bool {
        self.values.values().any(Slot::is_set) || self.sections.values().any(Self::is_touched)
    }

    /// The nested config at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPath`] if `path` is not a section.
    pub fn section(&self, path: &str) -> Result<&Self, ConfigError> {
        let (owner, key) = self.locate(path)?;
        owner.section_local(key)
    }

    /// The nested config at `path`, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPath`] if `path` is not a section.
    pub fn section_mut(&mut self, path: &str) -> Result<&mut Self, ConfigError> {
        let full = self.full_path(path);
        let (owner, key) = self.locate_mut(path)?;
        owner
            .sections
            .get_mut(key)
            .ok_or(ConfigError::UnknownPath {
                path: full,
                suggestion: None,
            })
    }

    fn section_local(&self, key: &str) -> Result<&Self, ConfigError> {
        self.sections.get(key).ok_or_else(|| ConfigError::UnknownPath {
            path: self.full_path(key),
            suggestion: None,
        })
    }

    /// The live list at `path`, created from the field's default if unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPath`] if `path` is unknown, or
    /// [`ConfigError::SchemaConflict`] if the field there is not a list.
    pub fn list_mut(&mut self, path: &str) -> Result<&mut ListProxy, ConfigError> {
        let (owner, key) = self.locate_mut(path)?;
        owner.list_local(key)
    }

    fn list_local(&mut self, key: &str) -> Result<&mut ListProxy, ConfigError> {
        let field = match self.node(key)? {
            Node::Field(field) if field.as_any().is::<ListField>() => field,
            _ => {
                return Err(ConfigError::SchemaConflict {
                    path: self.full_path(key),
                    message: "not a list field".to_string(),
                });
            }
        };
        if !matches!(self.values.get(key), Some(Slot::List(_))) {
            let (initial, explicit) = match self.values.get(key) {
                Some(Slot::Value(value)) => (value.clone(), true),
                _ => (
                    field
                        .default_value()
                        .map_err(|e| field_error(self.full_path(key), field.as_ref(), e))?,
                    false,
                ),
            };
            let mut proxy = self.build_list(key, &field, initial)?;
            proxy.set_modified(explicit);
            self.values.insert(key.to_string(), Slot::List(proxy));
        }
        match self.values.get_mut(key) {
            Some(Slot::List(proxy)) => Ok(proxy),
            _ => Err(ConfigError::SchemaConflict {
                path: key.to_string(),
                message: "not a list field".to_string(),
            }),
        }
    }

    fn build_list(&self, key: &str, field: &Arc<dyn Field>, value: Value) -> Result<ListProxy, ConfigError> {
        let path = self.full_path(key);
        let list = field
            .as_any()
            .downcast_ref::<ListField>()
            .ok_or_else(|| ConfigError::SchemaConflict {
                path: path.clone(),
                message: "not a list field".to_string(),
            })?;
        let mut proxy = ListProxy::new(list.item().cloned(), path.clone(), Arc::clone(&self.keyring));
        if value.is_null() {
            return Ok(proxy);
        }
        let Value::Array(items) = list
            .validate(value)
            .map_err(|e| field_error(path, field.as_ref(), e))?
        else {
            return Ok(proxy);
        };
        proxy.extend(items)?;
        Ok(proxy)
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Validates `value` with the field at `path` and stores the result.
    ///
    /// Setting a section with a mapping resets the section and loads the
    /// mapping into it. Setting a virtual field calls its setter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the value is rejected, or
    /// [`ConfigError::UnknownPath`] if nothing is defined at `path`.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<Value, ConfigError> {
        let (owner, key) = self.locate_mut(path)?;
        owner.set_local(key, value.into())
    }

    pub(crate) fn set_local(&mut self, key: &str, value: Value) -> Result<Value, ConfigError> {
        let field = match self.node(key)? {
            Node::Schema(child) => {
                let path = self.full_path(key);
                if !value.is_object() {
                    return Err(ConfigError::Validation {
                        name: path.clone(),
                        path,
                        message: format!("value must be a dict, not a {}", crate::fields::value_type(&value)),
                    });
                }
                let mut section = Self::bound(child, path, Arc::clone(&self.keyring));
                section.load_tree(&value)?;
                let snapshot = section.as_value()?;
                self.sections.insert(key.to_string(), section);
                return Ok(snapshot);
            }
            Node::Field(field) => field,
        };

        match field.shape() {
            Shape::Virtual => {
                let value = field
                    .validate(value)
                    .map_err(|e| field_error(self.full_path(key), field.as_ref(), e))?;
                if let Some(setter) = field
                    .as_any()
                    .downcast_ref::<VirtualField>()
                    .and_then(VirtualField::setter)
                {
                    setter(self, value.clone())?;
                }
                Ok(value)
            }
            Shape::Sequence if !value.is_null() => {
                let mut proxy = self.build_list(key, &field, value)?;
                proxy.set_modified(true);
                let snapshot = proxy.snapshot(Snapshot::LIVE)?;
                self.values.insert(key.to_string(), Slot::List(proxy));
                Ok(snapshot)
            }
            _ => {
                let value = field
                    .validate(value)
                    .map_err(|e| field_error(self.full_path(key), field.as_ref(), e))?;
                self.values.insert(key.to_string(), Slot::Value(value.clone()));
                Ok(value)
            }
        }
    }

    /// Forgets the value at `path` so its default applies again. For a
    /// section, forgets everything below it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPath`] if nothing is defined at `path`.
    pub fn reset(&mut self, path: &str) -> Result<(), ConfigError> {
        let (owner, key) = self.locate_mut(path)?;
        match owner.node(key)? {
            Node::Schema(child) => {
                let section = Self::bound(child, owner.full_path(key), Arc::clone(&owner.keyring));
                owner.sections.insert(key.to_string(), section);
            }
            Node::Field(_) => {
                owner.values.shift_remove(key);
            }
        }
        Ok(())
    }

    /// Sets each `(path, value)` pair not listed in `ignore`. Pairs with a
    /// `null` value are skipped, so unset command-line options keep the
    /// loaded values.
    ///
    /// # Errors
    ///
    /// Returns the first [`Config::set`] error.
    pub fn cmdline_args_override<I, K, V>(&mut self, args: I, ignore: &[&str]) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (path, value) in args {
            let path = path.as_ref();
            let value = value.into();
            if value.is_null() || ignore.contains(&path) {
                continue;
            }
            tracing::debug!(path, "applying command-line override");
            self.set(path, value)?;
        }
        Ok(())
    }

    /// Checks `plaintext` against the digest stored in the challenge field at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SchemaConflict`] if the field is not a
    /// challenge field, or [`ConfigError::Validation`] if the stored value
    /// is malformed.
    pub fn challenge(&self, path: &str, plaintext: &str) -> Result<bool, ConfigError> {
        let (owner, key) = self.locate(path)?;
        let Node::Field(field) = owner.node(key)? else {
            return Err(ConfigError::SchemaConflict {
                path: self.full_path(path),
                message: "not a challenge field".to_string(),
            });
        };
        let challenge = field
            .as_any()
            .downcast_ref::<ChallengeField>()
            .ok_or_else(|| ConfigError::SchemaConflict {
                path: self.full_path(path),
                message: "not a challenge field".to_string(),
            })?;
        let stored = owner.get_local(key)?;
        challenge
            .verify(&stored, plaintext)
            .map_err(|e| field_error(self.full_path(path), field.as_ref(), e))
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Plain nested snapshot in schema order, in persisted form.
    ///
    /// Secure values are encrypted. With `sensitive_mask`, sensitive fields
    /// are masked instead. Virtual fields are included only when
    /// `include_virtual` is set. Unset fields without a default are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Crypto`] if a secure value cannot be encrypted.
    pub fn to_tree(&self, sensitive_mask: Option<&str>, include_virtual: bool) -> Result<Value, ConfigError> {
        self.snapshot(Snapshot {
            basic: true,
            mask: sensitive_mask,
            include_virtual,
        })
    }

    /// Plain nested snapshot of live values (secure values as plaintext).
    ///
    /// # Errors
    ///
    /// Returns the error of a failing default.
    pub fn as_value(&self) -> Result<Value, ConfigError> {
        self.snapshot(Snapshot::LIVE)
    }

    pub(crate) fn snapshot(&self, mode: Snapshot<'_>) -> Result<Value, ConfigError> {
        let mut out = Map::new();
        for (key, node) in self.schema.nodes() {
            let field = match node {
                Node::Schema(_) => {
                    if let Some(section) = self.sections.get(key) {
                        out.insert(key.to_string(), section.snapshot(mode)?);
                    }
                    continue;
                }
                Node::Field(field) => field,
            };
            let value = match field.shape() {
                Shape::Virtual if !mode.include_virtual => continue,
                Shape::Include if mode.basic => continue,
                Shape::Virtual => self.get_local(key)?,
                _ => match self.values.get(key) {
                    Some(Slot::List(proxy)) if field.options().sensitive && mode.mask.is_some() => {
                        proxy.snapshot(Snapshot::LIVE)?
                    }
                    Some(Slot::List(proxy)) => {
                        out.insert(key.to_string(), proxy.snapshot(mode)?);
                        continue;
                    }
                    Some(Slot::Value(value)) => value.clone(),
                    None => {
                        let value = self.get_local(key)?;
                        if value.is_null() {
                            continue;
                        }
                        value
                    }
                },
            };
            let value = match mode.mask {
                Some(mask) if field.options().sensitive => mask_value(mask, &value),
                _ if mode.basic && !value.is_null() => field
                    .to_basic(&self.keyring, &value)
                    .map_err(|e| field_error(self.full_path(key), field.as_ref(), e))?,
                _ => value,
            };
            out.insert(key.to_string(), value);
        }
        Ok(Value::Object(out))
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Validates the whole config, stopping at the first problem.
    ///
    /// Checks required fields, list items, then schema and config validators.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Validation`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        self.collect_errors(&mut errors, true);
        errors.into_iter().next().map_or(Ok(()), Err)
    }

    /// Collects every validation problem instead of stopping at the first.
    #[must_use]
    pub fn validation_errors(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        self.collect_errors(&mut errors, false);
        errors
    }

    pub(crate) fn collect_errors(&self, errors: &mut Vec<ConfigError>, fail_fast: bool) {
        macro_rules! bail_if_done {
            () => {
                if fail_fast && !errors.is_empty() {
                    return;
                }
            };
        }

        if self.is_disabled() {
            return;
        }

        for (key, node) in self.schema.nodes() {
            match node {
                Node::Schema(_) => {
                    if let Some(section) = self.sections.get(key) {
                        section.collect_errors(errors, fail_fast);
                    }
                }
                Node::Field(field) if field.shape() == Shape::Virtual => {}
                Node::Field(field) => {
                    if let Err(err) = self.check_slot(key, field) {
                        errors.push(err);
                    } else if let Some(Slot::List(proxy)) = self.values.get(key) {
                        proxy.collect_errors(errors, fail_fast);
                    }
                }
            }
            bail_if_done!();
        }

        for validator in self.schema.validators().iter().chain(&self.validators) {
            if let Err(message) = validator(self) {
                let name = if self.path.is_empty() {
                    "config".to_string()
                } else {
                    self.path.clone()
                };
                errors.push(ConfigError::Validation {
                    path: self.path.clone(),
                    name,
                    message,
                });
            }
            bail_if_done!();
        }
    }

    /// Whether a feature flag at this level is switched off.
    fn is_disabled(&self) -> bool {
        self.schema.nodes().any(|(key, node)| {
            matches!(node, Node::Field(field) if field.as_any().is::<FeatureFlagField>())
                && matches!(self.get_local(key), Ok(Value::Bool(false)))
        })
    }

        fn check_slot(&self, key: &str, field: &Arc<dyn Field>) -> Result<(), ConfigError> {
        let wrap = |e| field_error(self.full_path(key), field.as_ref(), e);
        let value = match self.values.get(key) {
            Some(Slot::Value(value)) => value.clone(),
            Some(Slot::List(proxy)) => {
                if field.options().required && proxy.is_empty() {
                    return Err(wrap(FieldError::invalid("value is required")));
                }
                return Ok(());
            }
            None => field.default_value().map_err(wrap)?,
        };
        if value.is_null() {
            field.validate(Value::Null).map_err(wrap)?;
        }
        Ok(())
    }
}
