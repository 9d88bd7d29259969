mod common;

use common::service_schema;
use schemaconf::fields::{
    FeatureFlagField, FieldBuilder, IntField, ListField, PortField, StringField, UrlField,
};
use schemaconf::{ConfigError, Schema};
use serde_json::json;

fn webhook_schema() -> Schema {
    let mut hook = Schema::new();
    hook.insert("url", UrlField::new().required()).unwrap();
    hook.insert("retries", IntField::new().min(0).with_default(3))
        .unwrap();
    let mut schema = Schema::new();
    schema.insert("hooks", ListField::of_schema(hook)).unwrap();
    schema
}

#[test]
fn port_default_and_range() {
    let mut schema = Schema::new();
    schema
        .define("db.port", PortField::new().with_default(27017))
        .unwrap();
    let mut config = schema.instantiate();

    assert_eq!(config.get("db.port").unwrap(), json!(27017));
    let err = config.set("db.port", 70000).unwrap_err();
    assert!(matches!(err, ConfigError::Validation { .. }));
    assert_eq!(config.get("db.port").unwrap(), json!(27017));
}

#[test]
fn webhook_missing_url_fails_on_validate_not_append() {
    let mut config = webhook_schema().instantiate();
    config
        .list_mut("hooks")
        .unwrap()
        .push(json!({"retries": 1}))
        .unwrap();

    let err = config.validate().unwrap_err();
    assert_eq!(err.path(), Some("hooks[0].url"));

    let dir = tempfile::tempdir().unwrap();
    assert!(config.save(dir.path().join("hooks.json"), "json").is_err());
    assert!(!dir.path().join("hooks.json").exists());
}

#[test]
fn webhook_items_are_configs() {
    let mut config = webhook_schema().instantiate();
    let hooks = config.list_mut("hooks").unwrap();
    let mut item = hooks.new_item().unwrap();
    item.set("url", "https://hooks.example.com/a").unwrap();
    hooks.push_config(item).unwrap();
    hooks.push(json!({"url": "https://hooks.example.com/b", "retries": 0}))
        .unwrap();

    assert_eq!(hooks.len(), 2);
    assert_eq!(hooks.item(0).unwrap().get("retries").unwrap(), json!(3));
    config.validate().unwrap();
    assert_eq!(
        config.get("hooks").unwrap(),
        json!([
            {"url": "https://hooks.example.com/a", "retries": 3},
            {"url": "https://hooks.example.com/b", "retries": 0},
        ])
    );
}

#[test]
fn dotted_paths_and_sections() {
    let mut config = service_schema().instantiate();
    config.set("http", json!({"port": 81, "host": "a.example"})).unwrap();
    assert_eq!(config.section("http").unwrap().get("port").unwrap(), json!(81));

    config.section_mut("http").unwrap().set("port", 82).unwrap();
    assert_eq!(config.get("http.port").unwrap(), json!(82));

    config.reset("http.port").unwrap();
    assert_eq!(config.get("http.port").unwrap(), json!(8080));

    match config.get("htp.port").unwrap_err() {
        ConfigError::UnknownPath { suggestion, .. } => {
            assert_eq!(suggestion.as_deref(), Some("http"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn instantiate_with_values() {
    let mut schema = Schema::new();
    schema.insert("name", StringField::new().required()).unwrap();
    let config = schema.instantiate_with(&json!({"name": "x"})).unwrap();
    assert_eq!(config.get_as::<String>("name").unwrap(), "x");
    assert!(schema.instantiate_with(&json!({})).is_err());
}

#[test]
fn command_line_overrides() {
    let schema = service_schema();
    let matches = schemaconf::cli::overrides::command_for(&schema, "svc")
        .unwrap()
        .try_get_matches_from(["svc", "--http-port", "9443", "--workers", "8"])
        .unwrap();
    let overrides = schemaconf::cli::overrides::collect(&schema, &matches);

    let mut config = schema.instantiate();
    config.set("workers", 2).unwrap();
    config
        .cmdline_args_override(overrides, &["workers"])
        .unwrap();
    assert_eq!(config.get("http.port").unwrap(), json!(9443));
    assert_eq!(config.get("workers").unwrap(), json!(2));
}

#[test]
fn disabled_feature_section_saves_and_loads() {
    let mut schema = Schema::new();
    schema
        .define("mail.enabled", FeatureFlagField::new().with_default(false))
        .unwrap();
    schema.define("mail.server", StringField::new().required()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("service.json");

    let config = schema.instantiate();
    config.save(&path, "json").unwrap();
    schema.instantiate().load(&path, "json").unwrap();

    std::fs::write(&path, br#"{"mail": {"enabled": true}}"#).unwrap();
    let err = schema.instantiate().load(&path, "json").unwrap_err();
    assert_eq!(err.path(), Some("mail.server"));
}
