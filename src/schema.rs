//! Schema definitions.
//!
//! A [`Schema`] is an ordered registry of named fields and nested schemas.
//! It is built with explicit calls ([`Schema::insert`], [`Schema::define`],
//! [`Schema::child`]) and then shared by every [`Config`] created from it.
//! Insertion order is preserved at every level and drives serialization
//! and iteration order.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::config::{Config, join_path};
use crate::error::ConfigError;
use crate::fields::Field;

/// Validator run against a fully populated config.
pub type ConfigValidator = Arc<dyn Fn(&Config) -> Result<(), String> + Send + Sync>;

/// An entry in a schema: a field or a nested schema.
#[derive(Debug, Clone)]
pub enum Node {
    /// A field definition
    Field(Arc<dyn Field>),
    /// A nested schema
    Schema(Arc<Schema>),
}

/// Ordered template of fields and nested schemas.
#[derive(Clone, Default)]
pub struct Schema {
    nodes: IndexMap<String, Node>,
    validators: Vec<ConfigValidator>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("nodes", &self.nodes)
            .field("validators", &self.validators.len())
            .finish()
    }
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if key.is_empty() || key.contains('.') {
        return Err(ConfigError::SchemaConflict {
            path: key.to_string(),
            message: "keys must be non-empty and must not contain '.'".to_string(),
        });
    }
    Ok(())
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `field` under `key`, replacing any field already there.
    ///
    /// Companion fields declared by the field are registered after it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SchemaConflict`] if `key` is invalid or names
    /// a nested schema.
    pub fn insert(&mut self, key: &str, field: impl Field) -> Result<&mut Self, ConfigError> {
        self.insert_arc(key, Arc::new(field))
    }

    /// Registers a shared field under `key`.
    ///
    /// # Errors
    ///
    /// See [`Schema::insert`].
    pub fn insert_arc(&mut self, key: &str, field: Arc<dyn Field>) -> Result<&mut Self, ConfigError> {
        check_key(key)?;
        if let Some(Node::Schema(_)) = self.nodes.get(key) {
            return Err(ConfigError::SchemaConflict {
                path: key.to_string(),
                message: "a nested schema already exists at this key".to_string(),
            });
        }
        let companions = field.companions(key);
        self.nodes.insert(key.to_string(), Node::Field(field));
        for (name, companion) in companions {
            self.insert_arc(&name, companion)?;
        }
        Ok(self)
    }

    /// Registers `field` at a dotted `path`, creating intermediate schemas.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SchemaConflict`] if a segment conflicts with
    /// an existing definition.
    pub fn define(&mut self, path: &str, field: impl Field) -> Result<&mut Self, ConfigError> {
        let (parent, key) = path.rsplit_once('.').map_or(("", path), |(p, k)| (p, k));
        let mut target = self;
        if !parent.is_empty() {
            for segment in parent.split('.') {
                target = target.child(segment)?;
            }
        }
        target.insert(key, field).map_err(|e| match e {
            ConfigError::SchemaConflict { message, .. } => ConfigError::SchemaConflict {
                path: path.to_string(),
                message,
            },
            other => other,
        })
    }

    /// Returns the nested schema at `key`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SchemaConflict`] if a field is registered at `key`.
    pub fn child(&mut self, key: &str) -> Result<&mut Self, ConfigError> {
        check_key(key)?;
        let node = self
            .nodes
            .entry(key.to_string())
            .or_insert_with(|| Node::Schema(Arc::new(Self::new())));
        match node {
            Node::Schema(schema) => Ok(Arc::make_mut(schema)),
            Node::Field(_) => Err(ConfigError::SchemaConflict {
                path: key.to_string(),
                message: "a field already exists at this key".to_string(),
            }),
        }
    }

    /// Attaches an existing schema as a nested schema at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SchemaConflict`] if a field is registered at `key`.
    pub fn insert_schema(&mut self, key: &str, schema: Self) -> Result<&mut Self, ConfigError> {
        check_key(key)?;
        if let Some(Node::Field(_)) = self.nodes.get(key) {
            return Err(ConfigError::SchemaConflict {
                path: key.to_string(),
                message: "a field already exists at this key".to_string(),
            });
        }
        self.nodes
            .insert(key.to_string(), Node::Schema(Arc::new(schema)));
        Ok(self)
    }

    /// Adds a validator run with the populated config after load.
    pub fn validator(
        &mut self,
        validator: impl Fn(&Config) -> Result<(), String> + Send + Sync + 'static,
    ) -> &mut Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Resolves a dotted path to a node.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPath`] if any segment is missing.
    pub fn get(&self, path: &str) -> Result<&Node, ConfigError> {
        let mut schema = self;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let node = schema
                .nodes
                .get(segment)
                .ok_or_else(|| schema.unknown(path, segment))?;
            if segments.peek().is_none() {
                return Ok(node);
            }
            match node {
                Node::Schema(child) => schema = child,
                Node::Field(_) => {
                    return Err(ConfigError::UnknownPath {
                        path: path.to_string(),
                        suggestion: None,
                    });
                }
            }
        }
        Err(ConfigError::UnknownPath {
            path: path.to_string(),
            suggestion: None,
        })
    }

    /// Resolves a dotted path to a field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPath`] if the path is missing or names a schema.
    pub fn field(&self, path: &str) -> Result<&Arc<dyn Field>, ConfigError> {
        match self.get(path)? {
            Node::Field(field) => Ok(field),
            Node::Schema(_) => Err(ConfigError::UnknownPath {
                path: path.to_string(),
                suggestion: None,
            }),
        }
    }

    /// Resolves a dotted path to a field of concrete type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPath`] if the path is missing or the
    /// field is of another type.
    pub fn field_as<T: Field>(&self, path: &str) -> Result<&T, ConfigError> {
        self.field(path)?
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| ConfigError::UnknownPath {
                path: path.to_string(),
                suggestion: None,
            })
    }

    /// Direct children in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.nodes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Node registered directly under `key`.
    #[must_use]
    pub fn node(&self, key: &str) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Lazy depth-first iterator over `(full_path, field)` pairs.
    #[must_use]
    pub fn fields(&self) -> Fields<'_> {
        Fields {
            stack: vec![(String::new(), self.nodes.iter())],
        }
    }

    /// Number of direct children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the schema has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn validators(&self) -> &[ConfigValidator] {
        &self.validators
    }

    /// Creates a config bound to this schema.
    #[must_use]
    pub fn instantiate(&self) -> Config {
        Config::new(Arc::new(self.clone()))
    }

    /// Creates a config and loads `values` into it, then validates it.
    ///
    /// # Errors
    ///
    /// Returns any load or validation error.
    pub fn instantiate_with(&self, values: &Value) -> Result<Config, ConfigError> {
        let mut config = self.instantiate();
        config.load_tree(values)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn unknown(&self, path: &str, segment: &str) -> ConfigError {
        let suggestion = self
            .nodes
            .keys()
            .map(|k| (k, strsim::damerau_levenshtein(segment, k)))
            .filter(|(_, dist)| *dist <= 2)
            .min_by_key(|(_, dist)| *dist)
            .map(|(k, _)| k.clone());
        ConfigError::UnknownPath {
            path: path.to_string(),
            suggestion,
        }
    }
}

/// Depth-first iterator returned by [`Schema::fields`].
pub struct Fields<'a> {
    stack: Vec<(String, indexmap::map::Iter<'a, String, Node>)>,
}

impl<'a> Iterator for Fields<'a> {
    type Item = (String, &'a Arc<dyn Field>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (prefix, iter) = self.stack.last_mut()?;
            match iter.next() {
                Some((key, Node::Field(field))) => return Some((join_path(prefix, key), field)),
                Some((key, Node::Schema(schema))) => {
                    let path = join_path(prefix, key);
                    self.stack.push((path, schema.nodes.iter()));
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{BoolField, FieldBuilder, IntField, PortField, StringField};
    use serde_json::json;

    fn http_schema() -> Schema {
        let mut schema = Schema::new();
        schema.insert("mode", StringField::new()).unwrap();
        schema.define("http.port", PortField::new().with_default(8080)).unwrap();
        schema.define("http.ssl.enabled", BoolField::new()).unwrap();
        schema.define("http.host", StringField::new()).unwrap();
        schema.insert("debug", BoolField::new()).unwrap();
        schema
    }

    #[test]
    fn test_fields_depth_first_in_order() {
        let schema = http_schema();
        let paths: Vec<String> = schema.fields().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            ["mode", "http.port", "http.ssl.enabled", "http.host", "debug"]
        );
    }

    #[test]
    fn test_child_is_idempotent() {
        let mut schema = Schema::new();
        schema.child("db").unwrap().insert("port", PortField::new()).unwrap();
        schema.child("db").unwrap().insert("host", StringField::new()).unwrap();
        assert!(schema.field("db.port").is_ok());
        assert!(schema.field("db.host").is_ok());
        assert_eq!(schema.len(), 1);
    }

    #[test]
    fn test_replace_field_silently() {
        let mut schema = Schema::new();
        schema.insert("x", StringField::new()).unwrap();
        schema.insert("x", IntField::new()).unwrap();
        assert_eq!(schema.field("x").unwrap().type_name(), "int");
        assert_eq!(schema.len(), 1);
    }

    #[test]
    fn test_field_over_schema_conflicts() {
        let mut schema = http_schema();
        let err = schema.insert("http", IntField::new()).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaConflict { .. }));

        let err = schema.child("mode").unwrap_err();
        assert!(matches!(err, ConfigError::SchemaConflict { .. }));

        let err = schema.define("mode.inner", IntField::new()).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaConflict { .. }));
    }

    #[test]
    fn test_invalid_keys() {
        let mut schema = Schema::new();
        assert!(schema.insert("a.b", IntField::new()).is_err());
        assert!(schema.insert("", IntField::new()).is_err());
    }

    #[test]
    fn test_lookup_errors() {
        let schema = http_schema();
        let err = schema.get("http.prot").unwrap_err();
        match err {
            ConfigError::UnknownPath { path, suggestion } => {
                assert_eq!(path, "http.prot");
                assert_eq!(suggestion.as_deref(), Some("port"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(schema.get("mode.x").is_err());
        assert!(schema.field("http").is_err());
        assert!(matches!(schema.get("http").unwrap(), Node::Schema(_)));
    }

    #[test]
    fn test_field_as_downcasts() {
        let schema = http_schema();
        assert!(schema.field_as::<PortField>("http.port").is_ok());
        assert!(schema.field_as::<IntField>("http.port").is_err());
    }

    #[test]
    fn test_instantiate_with_values() {
        let schema = http_schema();
        let config = schema
            .instantiate_with(&json!({"http": {"port": "9000"}}))
            .unwrap();
        assert_eq!(config.get("http.port").unwrap(), json!(9000));
    }
}
