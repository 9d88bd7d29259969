//! Filename and include fields.

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::{Field, FieldOptions, Shape, value_type};
use crate::error::FieldError;

/// Existence policy for [`FilenameField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Exists {
    /// No check
    #[default]
    Any,
    /// Path must not exist
    Absent,
    /// Path must exist (file or directory)
    Present,
    /// Path must be an existing file
    File,
    /// Path must be an existing directory
    Dir,
    /// Path's parent must be an existing, writable directory
    WritableParent,
}

/// Expands a leading `~` to the home directory.
pub(crate) fn expand_user(raw: &str) -> PathBuf {
    let rest = match raw.strip_prefix('~') {
        Some("") => Some(""),
        Some(rest) if rest.starts_with(['/', '\\']) => Some(&rest[1..]),
        _ => None,
    };
    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(raw),
    }
}

/// A path on disk.
///
/// With a `startdir`, relative paths are resolved against it and stored as
/// absolute paths; otherwise they are checked relative to the working
/// directory and stored as given.
#[derive(Debug, Clone, Default)]
pub struct FilenameField {
    options: FieldOptions,
    exists: Exists,
    startdir: Option<PathBuf>,
}

impl FilenameField {
    /// Creates a filename field without an existence check.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the existence policy.
    #[must_use]
    pub const fn exists(mut self, exists: Exists) -> Self {
        self.exists = exists;
        self
    }

    /// Resolves relative paths against `dir`.
    #[must_use]
    pub fn startdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.startdir = Some(dir.into());
        self
    }

    fn resolve(&self, raw: &str) -> PathBuf {
        let path = expand_user(raw);
        match &self.startdir {
            Some(dir) if path.is_relative() => std::path::absolute(dir.join(&path))
                .unwrap_or_else(|_| dir.join(&path)),
            _ => path,
        }
    }

    fn check_path(&self, path: &Path) -> Result<(), FieldError> {
        let shown = path.display();
        let exists = path.exists();
        let verb = if exists { "already exists" } else { "does not exist" };
        match self.exists {
            Exists::Any => Ok(()),
            Exists::Present if !exists => Err(FieldError::invalid(format!(
                "file or directory does not exist: {shown}"
            ))),
            Exists::Absent if exists => Err(FieldError::invalid(format!(
                "file or directory already exists: {shown}"
            ))),
            Exists::Dir if !path.is_dir() => {
                Err(FieldError::invalid(format!("directory {verb}: {shown}")))
            }
            Exists::File if !path.is_file() => {
                Err(FieldError::invalid(format!("file {verb}: {shown}")))
            }
            Exists::WritableParent => {
                let parent = match path.parent() {
                    Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                    _ => PathBuf::from("."),
                };
                let writable = std::fs::metadata(&parent)
                    .is_ok_and(|m| m.is_dir() && !m.permissions().readonly());
                if writable {
                    Ok(())
                } else {
                    Err(FieldError::invalid(format!(
                        "parent directory is missing or not writable: {}",
                        parent.display()
                    )))
                }
            }
            _ => Ok(()),
        }
    }

    fn check_value(&self, value: Value) -> Result<Value, FieldError> {
        let raw = match value {
            Value::String(s) => s,
            other => {
                return Err(FieldError::invalid(format!(
                    "value must be a string, not a {}",
                    value_type(&other)
                )));
            }
        };
        if raw.is_empty() {
            if self.options.required {
                return Err(FieldError::invalid("value is required"));
            }
            return Ok(Value::String(raw));
        }
        let path = self.resolve(&raw);
        self.check_path(&path)?;
        Ok(Value::String(path.to_string_lossy().into_owned()))
    }
}

impl Field for FilenameField {
    field_common!();

    fn type_name(&self) -> &'static str {
        "path"
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        self.check_value(value)
    }
}

// ============================================================================
// Include
// ============================================================================

/// Names another document, in the same format, whose values are merged into
/// the schema level where this field is defined when loading.
///
/// Relative paths resolve against `startdir` when set, else against the
/// directory of the including document.
#[derive(Debug, Clone)]
pub struct IncludeField {
    inner: FilenameField,
}

impl Default for IncludeField {
    fn default() -> Self {
        Self {
            inner: FilenameField::new().exists(Exists::File),
        }
    }
}

impl IncludeField {
    /// Creates an include field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves relative include paths against `dir`.
    #[must_use]
    pub fn startdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.inner = self.inner.startdir(dir);
        self
    }

    /// Resolves an include path as written in a document located in `base_dir`.
    #[must_use]
    pub fn resolve_path(&self, raw: &str, base_dir: Option<&Path>) -> PathBuf {
        let path = expand_user(raw);
        if path.is_absolute() {
            return path;
        }
        self.inner
            .startdir
            .as_deref()
            .or(base_dir)
            .map_or(path.clone(), |dir| dir.join(&path))
    }
}

impl Field for IncludeField {
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
        "include"
    }

    fn shape(&self) -> Shape {
        Shape::Include
    }

    fn check(&self, value: Value) -> Result<Value, FieldError> {
        self.inner.check_value(value)
    }
}
