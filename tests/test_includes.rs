mod common;

use common::{service_schema, write_json};
use schemaconf::ConfigError;
use serde_json::json;

#[test]
fn includes_resolve_relative_to_including_file() {
    let dir = tempfile::tempdir().unwrap();
    write_json(dir.path(), "conf.d/base.json", &json!({"workers": 2, "http": {"port": 9000}}));
    write_json(
        dir.path(),
        "conf.d/shared.json",
        &json!({"include": "base.json", "debug": true}),
    );
    let main = write_json(
        dir.path(),
        "main.json",
        &json!({"include": "conf.d/shared.json", "name": "edge", "http": {"host": "edge.local"}}),
    );

    let mut config = service_schema().instantiate();
    config.load(&main, "json").unwrap();

    assert_eq!(config.get("name").unwrap(), json!("edge"));
    assert_eq!(config.get("workers").unwrap(), json!(2));
    assert_eq!(config.get("debug").unwrap(), json!(true));
    assert_eq!(config.get("http.port").unwrap(), json!(9000));
    assert_eq!(config.get("http.host").unwrap(), json!("edge.local"));
}

#[test]
fn include_cycle_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_json(dir.path(), "a.json", &json!({"include": "b.json"}));
    write_json(dir.path(), "b.json", &json!({"include": "c.json"}));
    let c = write_json(dir.path(), "c.json", &json!({"include": "a.json"}));

    let mut config = service_schema().instantiate();
    let err = config.load(&c, "json").unwrap_err();
    let ConfigError::CircularInclude { cycle } = err else {
        panic!("expected a circular include error, got {err}");
    };
    assert_eq!(cycle.first(), cycle.last());
    assert_eq!(cycle.len(), 4);
}

#[test]
fn include_is_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    write_json(dir.path(), "base.json", &json!({"workers": 3}));
    let main = write_json(dir.path(), "main.json", &json!({"include": "base.json"}));

    let mut config = service_schema().instantiate();
    config.load(&main, "json").unwrap();
    let tree = config.to_tree(None, false).unwrap();
    assert!(tree.get("include").is_none());
    assert_eq!(tree["workers"], json!(3));
}

#[test]
fn included_file_in_another_format_uses_the_loading_format() {
    let dir = tempfile::tempdir().unwrap();
    common::write(dir.path(), "base.yml", "workers: 6\n");
    let main = common::write(dir.path(), "main.yml", "include: base.yml\nname: yaml-svc\n");

    let mut config = service_schema().instantiate();
    config.load(&main, "yaml").unwrap();
    assert_eq!(config.get("workers").unwrap(), json!(6));
    assert_eq!(config.get("name").unwrap(), json!("yaml-svc"));
}
