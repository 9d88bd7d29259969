//! Document formats.
//!
//! A [`ConfigFormat`] converts between bytes and a plain value tree.
//! Built-in formats are looked up by name with [`lookup`]; a
//! [`FormatRegistry`] also accepts custom formats and guesses a format
//! from a file extension.

mod bson;
mod json;
mod pickle;
mod xml;
mod yaml;

use std::path::Path;
use std::sync::{Arc, LazyLock};

use serde_json::{Map, Value};

use crate::error::ConfigError;

pub use self::bson::BsonFormat;
pub use self::json::JsonFormat;
pub use self::pickle::PickleFormat;
pub use self::xml::XmlFormat;
pub use self::yaml::YamlFormat;

/// Bidirectional codec between bytes and a value tree.
pub trait ConfigFormat: Send + Sync {
    /// Registry name, e.g. `"json"`.
    fn name(&self) -> &str;

    /// File extensions (without the dot) this format claims.
    fn extensions(&self) -> &[&str] {
        &[]
    }

    /// Encodes a value tree.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Format`] if the tree cannot be represented.
    fn encode(&self, value: &Value) -> Result<Vec<u8>, ConfigError>;

    /// Decodes bytes into a value tree.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Format`] if the bytes are not a valid document.
    fn decode(&self, bytes: &[u8]) -> Result<Value, ConfigError>;
}

/// Decodes a document whose root must be a mapping. An empty document
/// decodes to an empty mapping.
pub(crate) fn decode_root(
    format: &dyn ConfigFormat,
    bytes: &[u8],
) -> Result<Map<String, Value>, ConfigError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match format.decode(bytes)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ConfigError::format(
            format.name(),
            format!(
                "document root must be a mapping, not a {}",
                crate::fields::value_type(&other)
            ),
        )),
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Named collection of formats.
#[derive(Clone)]
pub struct FormatRegistry {
    formats: Vec<Arc<dyn ConfigFormat>>,
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.formats.iter().map(|format| format.name()))
            .finish()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatRegistry {
    /// Creates a registry holding the built-in formats.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry
            .register(Arc::new(JsonFormat))
            .register(Arc::new(YamlFormat))
            .register(Arc::new(XmlFormat))
            .register(Arc::new(BsonFormat))
            .register(Arc::new(PickleFormat));
        registry
    }

    /// Creates a registry with no formats.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            formats: Vec::new(),
        }
    }

    /// Registers `format`, replacing a format of the same name.
    pub fn register(&mut self, format: Arc<dyn ConfigFormat>) -> &mut Self {
        self.formats.retain(|f| f.name() != format.name());
        self.formats.push(format);
        self
    }

    /// Looks up a format by name or extension, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownFormat`] if nothing matches.
    pub fn get(&self, name: &str) -> Result<Arc<dyn ConfigFormat>, ConfigError> {
        let wanted = name.trim_start_matches('.').to_ascii_lowercase();
        self.formats
            .iter()
            .find(|f| f.name() == wanted)
            .or_else(|| {
                self.formats
                    .iter()
                    .find(|f| f.extensions().iter().any(|ext| *ext == wanted))
            })
            .cloned()
            .ok_or_else(|| ConfigError::UnknownFormat {
                name: name.to_string(),
            })
    }

    /// Guesses a format from the extension of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownFormat`] if the path has no known extension.
    pub fn for_path(&self, path: &Path) -> Result<Arc<dyn ConfigFormat>, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::UnknownFormat {
                name: path.display().to_string(),
            })?;
        self.get(ext)
    }

    /// Registered format names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.formats.iter().map(|f| f.name())
    }
}

static BUILTIN: LazyLock<FormatRegistry> = LazyLock::new(FormatRegistry::new);

/// Looks up a built-in format by name or extension.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownFormat`] if no built-in format matches.
pub fn lookup(name: &str) -> Result<Arc<dyn ConfigFormat>, ConfigError> {
    BUILTIN.get(name)
}

/// Guesses a built-in format from the extension of `path`.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownFormat`] if the path has no known extension.
pub fn for_path(path: &Path) -> Result<Arc<dyn ConfigFormat>, ConfigError> {
    BUILTIN.for_path(path)
}
