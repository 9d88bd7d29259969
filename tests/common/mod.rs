//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use schemaconf::Schema;
use schemaconf::fields::{
    BoolField, ChallengeField, DictField, FieldBuilder, FloatField, HostnameField,
    IPv4AddressField, IPv4NetworkField, IncludeField, IntField, ListField, LogLevelField,
    PortField, SecureField, StringField, UrlField,
};
use serde_json::Value;

/// Every format name shipped with the crate, paired with a file extension.
pub const FORMATS: [(&str, &str); 5] = [
    ("json", "json"),
    ("yaml", "yml"),
    ("xml", "xml"),
    ("bson", "bson"),
    ("pickle", "pkl"),
];

/// A service schema touching every field kind that persists a value.
#[allow(clippy::missing_panics_doc)]
pub fn service_schema() -> Schema {
    let mut schema = Schema::new();
    schema.insert("include", IncludeField::new()).unwrap();
    schema
        .insert("name", StringField::new().with_default("svc"))
        .unwrap();
    schema.insert("workers", IntField::new().min(1)).unwrap();
    schema.insert("ratio", FloatField::new().min(0.0).max(1.0)).unwrap();
    schema.insert("ratio_wide", FloatField::new()).unwrap();
    schema.insert("debug", BoolField::new().with_default(false)).unwrap();
    schema.insert("log_level", LogLevelField::new()).unwrap();
    schema.insert("tags", ListField::of(StringField::new())).unwrap();
    schema.insert("labels", DictField::new().values(StringField::new())).unwrap();
    schema.define("http.host", HostnameField::new()).unwrap();
    schema
        .define("http.port", PortField::new().with_default(8080))
        .unwrap();
    schema.define("http.bind", IPv4AddressField::new()).unwrap();
    schema.define("http.allow", IPv4NetworkField::new()).unwrap();
    schema.define("http.upstream", UrlField::new()).unwrap();
    schema.define("db.password", SecureField::new()).unwrap();
    schema.define("db.admin", ChallengeField::new()).unwrap();
    schema
}

/// Writes `bytes` to `dir/name` and returns the full path.
#[allow(clippy::missing_panics_doc)]
pub fn write(dir: &Path, name: &str, bytes: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Writes `value` as pretty JSON to `dir/name`.
#[allow(clippy::missing_panics_doc)]
pub fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    write(dir, name, serde_json::to_vec_pretty(value).unwrap())
}
