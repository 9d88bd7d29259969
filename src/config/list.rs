//! Live list values.

use std::sync::Arc;

use serde_json::Value;

use super::{Config, Snapshot, field_error, mask_value};
use crate::encryption::Keyring;
use crate::error::ConfigError;
use crate::fields::ListItem;

#[derive(Debug, Clone)]
enum Entry {
    Value(Value),
    Config(Config),
}

/// The live value of a list field.
///
/// Every mutation validates the new item with the list's item field; items
/// of a schema-typed list are nested [`Config`]s addressed as `path[idx]`.
/// Required fields inside items are only checked by [`Config::validate`].
/// A clone keeps the list's keyring; cloning the owning [`Config`] moves it
/// to the forked one.
#[derive(Debug)]
pub struct ListProxy {
    item: Option<ListItem>,
    path: String,
    keyring: Arc<Keyring>,
    items: Vec<Entry>,
    modified: bool,
}

impl Clone for ListProxy {
    fn clone(&self) -> Self {
        let mut copy = Self {
            item: self.item.clone(),
            path: self.path.clone(),
            keyring: Arc::clone(&self.keyring),
            items: self.items.clone(),
            modified: self.modified,
        };
        copy.reindex();
        copy
    }
}

impl ListProxy {
    pub(crate) const fn new(item: Option<ListItem>, path: String, keyring: Arc<Keyring>) -> Self {
        Self {
            item,
            path,
            keyring,
            items: Vec::new(),
            modified: false,
        }
    }

    /// Whether the list was changed since it was built from a default.
    pub(crate) const fn is_modified(&self) -> bool {
        self.modified
    }

    pub(crate) const fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    fn item_path(&self, idx: usize) -> String {
        format!("{}[{idx}]", self.path)
    }

    fn out_of_range(&self, idx: usize) -> ConfigError {
        ConfigError::UnknownPath {
            path: self.item_path(idx),
            suggestion: None,
        }
    }

    fn prepare(&self, idx: usize, value: Value) -> Result<Entry, ConfigError> {
        match &self.item {
            Some(ListItem::Schema(schema)) => {
                let mut config =
                    Config::bound(Arc::clone(schema), self.item_path(idx), Arc::clone(&self.keyring));
                config.load_tree(&value)?;
                Ok(Entry::Config(config))
            }
            Some(ListItem::Field(field)) => field
                .validate(value)
                .map(Entry::Value)
                .map_err(|e| field_error(self.item_path(idx), field.as_ref(), e)),
            None => Ok(Entry::Value(value)),
        }
    }

    fn reindex(&mut self) {
        let keyring = &self.keyring;
        let path = &self.path;
        for (idx, entry) in self.items.iter_mut().enumerate() {
            if let Entry::Config(config) = entry {
                config.adopt(format!("{path}[{idx}]"), keyring);
            }
        }
    }

    pub(crate) fn adopt(&mut self, path: String, keyring: &Arc<Keyring>) {
        self.path = path;
        self.keyring = Arc::clone(keyring);
        self.reindex();
    }

    /// Appends a validated item.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the item is rejected.
    pub fn push(&mut self, value: impl Into<Value>) -> Result<(), ConfigError> {
        let entry = self.prepare(self.items.len(), value.into())?;
        self.items.push(entry);
        self.modified = true;
        Ok(())
    }

    /// Appends an existing config. A config of the item schema is moved in
    /// as is; any other config is copied through its values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SchemaConflict`] if the list does not hold
    /// configs, or the error of loading the copied values.
    pub fn push_config(&mut self, mut config: Config) -> Result<(), ConfigError> {
        let Some(ListItem::Schema(schema)) = &self.item else {
            return Err(ConfigError::SchemaConflict {
                path: self.path.clone(),
                message: "list items are not configs".to_string(),
            });
        };
        if Arc::ptr_eq(schema, &config.schema) {
            config.adopt(self.item_path(self.items.len()), &self.keyring);
            self.items.push(Entry::Config(config));
            self.modified = true;
            Ok(())
        } else {
            let value = config.as_value()?;
            self.push(value)
        }
    }

    /// Inserts a validated item at `idx`, shifting later items.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPath`] if `idx > len`, or
    /// [`ConfigError::Validation`] if the item is rejected.
    pub fn insert(&mut self, idx: usize, value: impl Into<Value>) -> Result<(), ConfigError> {
        if idx > self.items.len() {
            return Err(self.out_of_range(idx));
        }
        let entry = self.prepare(idx, value.into())?;
        self.items.insert(idx, entry);
        self.reindex();
        self.modified = true;
        Ok(())
    }

    /// Replaces the item at `idx`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPath`] if `idx` is out of range, or
    /// [`ConfigError::Validation`] if the item is rejected.
    pub fn set(&mut self, idx: usize, value: impl Into<Value>) -> Result<(), ConfigError> {
        if idx >= self.items.len() {
            return Err(self.out_of_range(idx));
        }
        self.items[idx] = self.prepare(idx, value.into())?;
        self.modified = true;
        Ok(())
    }

    /// Removes and returns the item at `idx`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPath`] if `idx` is out of range.
    pub fn remove(&mut self, idx: usize) -> Result<Value, ConfigError> {
        if idx >= self.items.len() {
            return Err(self.out_of_range(idx));
        }
        let removed = match self.items.remove(idx) {
            Entry::Value(value) => value,
            Entry::Config(config) => config.as_value()?,
        };
        self.reindex();
        self.modified = true;
        Ok(removed)
    }

    /// Removes every item.
    pub fn clear(&mut self) {
        self.items.clear();
        self.modified = true;
    }

    /// Appends every value in order, stopping at the first rejected one.
    ///
    /// # Errors
    ///
    /// Returns the first [`ListProxy::push`] error.
    pub fn extend<I, V>(&mut self, values: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        values.into_iter().try_for_each(|value| self.push(value))
    }

    /// The value of the item at `idx`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPath`] if `idx` is out of range.
    pub fn get(&self, idx: usize) -> Result<Value, ConfigError> {
        match self.items.get(idx) {
            Some(Entry::Value(value)) => Ok(value.clone()),
            Some(Entry::Config(config)) => config.as_value(),
            None => Err(self.out_of_range(idx)),
        }
    }

    /// The config at `idx` of a schema-typed list.
    #[must_use]
    pub fn item(&self, idx: usize) -> Option<&Config> {
        match self.items.get(idx) {
            Some(Entry::Config(config)) => Some(config),
            _ => None,
        }
    }

    /// The config at `idx` of a schema-typed list, mutably. Counts as a
    /// change to the list.
    pub fn item_mut(&mut self, idx: usize) -> Option<&mut Config> {
        match self.items.get_mut(idx) {
            Some(Entry::Config(config)) => {
                self.modified = true;
                Some(config)
            }
            _ => None,
        }
    }

    /// Creates an empty config of the item schema, ready for
    /// [`ListProxy::push_config`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SchemaConflict`] if the list does not hold configs.
    pub fn new_item(&self) -> Result<Config, ConfigError> {
        match &self.item {
            Some(ListItem::Schema(schema)) => Ok(Config::bound(
                Arc::clone(schema),
                self.item_path(self.items.len()),
                Arc::clone(&self.keyring),
            )),
            _ => Err(ConfigError::SchemaConflict {
                path: self.path.clone(),
                message: "list items are not configs".to_string(),
            }),
        }
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Validates every item config, stopping at the first problem.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Validation`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        self.collect_errors(&mut errors, true);
        errors.into_iter().next().map_or(Ok(()), Err)
    }

    pub(crate) fn collect_errors(&self, errors: &mut Vec<ConfigError>, fail_fast: bool) {
        for entry in &self.items {
            if let Entry::Config(config) = entry {
                config.collect_errors(errors, fail_fast);
                if fail_fast && !errors.is_empty() {
                    return;
                }
            }
        }
    }

    pub(crate) fn snapshot(&self, mode: Snapshot<'_>) -> Result<Value, ConfigError> {
        self.items
            .iter()
            .enumerate()
            .map(|(idx, entry)| match (entry, &self.item) {
                (Entry::Config(config), _) => config.snapshot(mode),
                (Entry::Value(value), Some(ListItem::Field(field))) => match mode.mask {
                    Some(mask) if field.options().sensitive => Ok(mask_value(mask, value)),
                    _ if mode.basic && !value.is_null() => field
                        .to_basic(&self.keyring, value)
                        .map_err(|e| field_error(self.item_path(idx), field.as_ref(), e)),
                    _ => Ok(value.clone()),
                },
                (Entry::Value(value), _) => Ok(value.clone()),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }
}
