//! Configuration loading and saving.
//!
//! Implements the load pipeline:
//! 1. Read the document and decode it with a [`ConfigFormat`]
//! 2. Resolve include fields, merging included documents level by level
//! 3. Load the tree field by field (persisted values converted back to live ones)
//! 4. Validate the whole config
//!
//! Saving runs the pipeline in reverse and writes atomically through a
//! temporary file in the destination directory.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

use super::{Config, DEFAULT_MAX_INCLUDE_DEPTH, MAX_INCLUDE_DEPTH_ENV, field_error};
use crate::error::ConfigError;
use crate::fields::{IncludeField, Shape, VirtualField};
use crate::formats::{self, ConfigFormat};
use crate::schema::{Node, Schema};

impl Config {
    /// Loads the file at `path`, decoded with the format registered as `format`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownFormat`] for an unknown format name,
    /// otherwise see [`Config::load_with`].
    pub fn load(&mut self, path: impl AsRef<Path>, format: &str) -> Result<(), ConfigError> {
        let format = formats::lookup(format)?;
        self.load_with(path, format.as_ref())
    }

    /// Loads the file at `path`, resolving includes, then validates.
    ///
    /// Values already set stay unless the document overrides them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFile`] if the file does not exist,
    /// [`ConfigError::Format`] if it cannot be decoded, include errors, or
    /// the first validation error.
    pub fn load_with(&mut self, path: impl AsRef<Path>, format: &dyn ConfigFormat) -> Result<(), ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), format = format.name(), "loading config");

        let bytes = read_file(path)?;
        let base_dir = parent_dir(path);
        self.keyring.set_base_dir(base_dir);

        let mut tree = formats::decode_root(format, &bytes)?;
        let root = path.canonicalize().ok();
        IncludeResolver::new(format, root, max_include_depth()).resolve(&self.schema, &mut tree, base_dir)?;

        self.load_tree(&Value::Object(tree))?;
        self.validate()
    }

    /// Loads an in-memory document. Relative includes resolve against the
    /// include field's start directory, else the working directory.
    ///
    /// # Errors
    ///
    /// See [`Config::load_with`].
    pub fn loads(&mut self, bytes: impl AsRef<[u8]>, format: &str) -> Result<(), ConfigError> {
        let format = formats::lookup(format)?;
        self.loads_with(bytes.as_ref(), format.as_ref())
    }

    /// Loads an in-memory document with an explicit format.
    ///
    /// # Errors
    ///
    /// See [`Config::load_with`].
    pub fn loads_with(&mut self, bytes: &[u8], format: &dyn ConfigFormat) -> Result<(), ConfigError> {
        let mut tree = formats::decode_root(format, bytes)?;
        IncludeResolver::new(format, None, max_include_depth()).resolve(&self.schema, &mut tree, None)?;
        self.load_tree(&Value::Object(tree))?;
        self.validate()
    }

    /// Loads a raw value tree without checking required fields.
    ///
    /// Persisted values (such as encrypted secure values) are converted to
    /// their live form. Keys whose field reads its value from a set
    /// environment variable are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPath`] for keys the schema does not
    /// define, or the first field error.
    pub fn load_tree(&mut self, tree: &Value) -> Result<(), ConfigError> {
        let Value::Object(map) = tree else {
            let name = if self.path.is_empty() {
                "config".to_string()
            } else {
                self.path.clone()
            };
            return Err(ConfigError::Validation {
                path: self.path.clone(),
                name,
                message: format!("value must be a dict, not a {}", crate::fields::value_type(tree)),
            });
        };

        for (key, value) in map {
            match self.schema.node(key).cloned() {
                None => return Err(self.schema.unknown(&self.full_path(key), key)),
                Some(Node::Schema(_)) => {
                    if value.is_null() {
                        continue;
                    }
                    let full = self.full_path(key);
                    self.sections
                        .get_mut(key)
                        .ok_or(ConfigError::UnknownPath {
                            path: full,
                            suggestion: None,
                        })?
                        .load_tree(value)?;
                }
                Some(Node::Field(field)) => {
                    if field.env_value().is_some() {
                        debug!(path = %self.full_path(key), "environment overrides document value");
                        continue;
                    }
                    if field.shape() == Shape::Virtual
                        && field
                            .as_any()
                            .downcast_ref::<VirtualField>()
                            .and_then(VirtualField::setter)
                            .is_none()
                    {
                        trace!(path = %self.full_path(key), "ignoring read-only virtual field");
                        continue;
                    }
                    let value = field
                        .from_basic(&self.keyring, value.clone())
                        .map_err(|e| field_error(self.full_path(key), field.as_ref(), e))?;
                    self.set_local(key, value)?;
                }
            }
        }
        Ok(())
    }

    /// Validates, then writes the config to `path` in the format registered as `format`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownFormat`] for an unknown format name,
    /// otherwise see [`Config::save_with`].
    pub fn save(&self, path: impl AsRef<Path>, format: &str) -> Result<(), ConfigError> {
        let format = formats::lookup(format)?;
        self.save_with(path, format.as_ref())
    }

    /// Validates, then atomically writes the config to `path`.
    ///
    /// # Errors
    ///
    /// Returns the first validation error, [`ConfigError::Crypto`] if a
    /// secure value cannot be encrypted, or [`ConfigError::Io`].
    pub fn save_with(&self, path: impl AsRef<Path>, format: &dyn ConfigFormat) -> Result<(), ConfigError> {
        let path = path.as_ref();
        self.keyring.set_base_dir(parent_dir(path));
        let bytes = self.dumps_with(format)?;

        let dir = parent_dir(path).unwrap_or_else(|| Path::new("."));
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = NamedTempFile::new_in(dir).map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
        file.persist(path).map_err(|e| io_err(e.error))?;

        debug!(path = %path.display(), format = format.name(), bytes = bytes.len(), "saved config");
        Ok(())
    }

    /// Validates, then encodes the config with the format registered as `format`.
    ///
    /// # Errors
    ///
    /// See [`Config::dumps_with`].
    pub fn dumps(&self, format: &str) -> Result<Vec<u8>, ConfigError> {
        let format = formats::lookup(format)?;
        self.dumps_with(format.as_ref())
    }

    /// Validates, then encodes the persisted tree with `format`.
    ///
    /// # Errors
    ///
    /// Returns the first validation error, [`ConfigError::Crypto`] or
    /// [`ConfigError::Format`].
    pub fn dumps_with(&self, format: &dyn ConfigFormat) -> Result<Vec<u8>, ConfigError> {
        self.validate()?;
        let tree = self.to_tree(None, false)?;
        format.encode(&tree)
    }
}

// ============================================================================
// Include Resolution
// ============================================================================

/// Resolves include fields in a decoded document.
struct IncludeResolver<'f> {
    format: &'f dyn ConfigFormat,
    root: Option<PathBuf>,
    max_depth: usize,
    resolution_stack: Vec<PathBuf>,
    cache: HashMap<PathBuf, Map<String, Value>>,
}

impl<'f> IncludeResolver<'f> {
    fn new(format: &'f dyn ConfigFormat, root: Option<PathBuf>, max_depth: usize) -> Self {
        Self {
            format,
            root,
            max_depth,
            resolution_stack: Vec::new(),
            cache: HashMap::new(),
        }
    }

    /// Resolves includes at every level of `schema` present in `tree`.
    ///
    /// Nested levels are resolved first, so an included document is merged
    /// into a level whose own includes are already expanded. Included
    /// values override the including document's values.
    fn resolve(
        &mut self,
        schema: &Schema,
        tree: &mut Map<String, Value>,
        base_dir: Option<&Path>,
    ) -> Result<(), ConfigError> {
        for (key, node) in schema.nodes() {
            if let Node::Schema(child) = node
                && let Some(Value::Object(sub)) = tree.get_mut(key)
            {
                self.resolve(child, sub, base_dir)?;
            }
        }

        for (key, node) in schema.nodes() {
            let Node::Field(field) = node else {
                continue;
            };
            let Some(include) = field.as_any().downcast_ref::<IncludeField>() else {
                continue;
            };
            let Some(raw) = tree.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()) else {
                continue;
            };
            let resolved = include.resolve_path(raw, base_dir);
            let path = resolved
                .canonicalize()
                .map_err(|_| ConfigError::MissingFile { path: resolved })?;

            // Cycle detection
            if self.root.as_ref() == Some(&path) || self.resolution_stack.contains(&path) {
                let mut cycle: Vec<PathBuf> = self
                    .root
                    .iter()
                    .chain(&self.resolution_stack)
                    .cloned()
                    .collect();
                cycle.push(path);
                return Err(ConfigError::CircularInclude { cycle });
            }

            // Depth check
            let depth = self.resolution_stack.len() + 1;
            if depth > self.max_depth {
                return Err(ConfigError::IncludeDepth {
                    depth,
                    max: self.max_depth,
                });
            }

            debug!(path = %path.display(), depth, "resolving include");
            let mut included = self.load_cached(&path)?;

            self.resolution_stack.push(path.clone());
            let result = self.resolve(schema, &mut included, path.parent());
            self.resolution_stack.pop();
            result?;

            deep_merge(tree, included);
            tree.insert(key.to_string(), Value::String(path.display().to_string()));
        }

        Ok(())
    }

    /// Loads and decodes a file with caching.
    fn load_cached(&mut self, path: &Path) -> Result<Map<String, Value>, ConfigError> {
        if let Some(cached) = self.cache.get(path) {
            return Ok(cached.clone());
        }
        let bytes = read_file(path)?;
        let tree = formats::decode_root(self.format, &bytes)?;
        self.cache.insert(path.to_path_buf(), tree.clone());
        Ok(tree)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn read_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::MissingFile {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

fn max_include_depth() -> usize {
    env_or(MAX_INCLUDE_DEPTH_ENV, DEFAULT_MAX_INCLUDE_DEPTH)
}

/// Parses an environment variable with a default value.
pub(crate) fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Deep merges `overrides` into `base`.
///
/// For mappings: recursively merge keys.
/// For other types: override replaces base.
fn deep_merge(base: &mut Map<String, Value>, overrides: Map<String, Value>) {
    for (key, value) in overrides {
        match value {
            Value::Object(override_map) if base.get(&key).is_some_and(Value::is_object) => {
                if let Some(Value::Object(base_map)) = base.get_mut(&key) {
                    deep_merge(base_map, override_map);
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}
