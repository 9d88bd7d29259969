//! Command-line flags generated from a schema.
//!
//! Every scalar field becomes a `--dotted-path` flag, with dots and
//! underscores turned into dashes (`http.ssl_port` → `--http-ssl-port`).
//! Boolean fields also get a `--no-<flag>` switch, and `--<flag>` given
//! without a value means `true`. Values are passed through as strings; the
//! fields convert them when
//! [`Config::cmdline_args_override`](crate::config::Config::cmdline_args_override)
//! applies them.

use std::collections::HashMap;

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::Value;

use crate::error::ConfigError;
use crate::fields::{BoolField, FeatureFlagField, Field, Shape};
use crate::schema::Schema;

/// Flag name for a dotted field path.
#[must_use]
pub fn flag_name(path: &str) -> String {
    path.replace(['.', '_'], "-")
}

fn is_bool(field: &dyn Field) -> bool {
    let any = field.as_any();
    any.is::<BoolField>() || any.is::<FeatureFlagField>()
}

fn negated_id(path: &str) -> String {
    format!("no:{path}")
}

fn args_for(path: &str, field: &dyn Field) -> Vec<Arg> {
    let mut arg = Arg::new(path.to_string())
        .long(flag_name(path))
        .value_name(field.type_name().to_uppercase())
        .action(ArgAction::Set);
    if let Some(help) = &field.options().help {
        arg = arg.help(help.clone());
    }
    if !is_bool(field) {
        return vec![arg];
    }

    let off = Arg::new(negated_id(path))
        .long(format!("no-{}", flag_name(path)))
        .help(format!("Set {path} to false"))
        .action(ArgAction::SetTrue)
        .conflicts_with(path.to_string());
    vec![arg.num_args(0..=1).default_missing_value("true"), off]
}

/// Builds a command with one flag per scalar field of `schema`.
///
/// # Errors
///
/// Returns [`ConfigError::SchemaConflict`] when two fields map to the same
/// flag, such as `a_b` and `a.b`.
pub fn command_for(schema: &Schema, name: impl Into<String>) -> Result<Command, ConfigError> {
    let mut owners: HashMap<String, String> = HashMap::new();
    let mut cmd = Command::new(name.into());
    for (path, field) in schema.fields().filter(|(_, field)| field.shape() == Shape::Scalar) {
        for arg in args_for(&path, field.as_ref()) {
            if let Some(long) = arg.get_long()
                && let Some(owner) = owners.insert(long.to_string(), path.clone())
            {
                return Err(ConfigError::SchemaConflict {
                    path,
                    message: format!("flag --{long} is already used by '{owner}'"),
                });
            }
            cmd = cmd.arg(arg);
        }
    }
    Ok(cmd)
}

/// Collects `(path, value)` pairs for the flags given on the command line.
///
/// Flags that were not given (or only have a default) are left out. A
/// `--no-<flag>` switch yields `"false"`.
#[must_use]
pub fn collect(schema: &Schema, matches: &ArgMatches) -> Vec<(String, Value)> {
    let given = |id: &str| matches.value_source(id) == Some(ValueSource::CommandLine);
    schema
        .fields()
        .filter(|(_, field)| field.shape() == Shape::Scalar)
        .filter_map(|(path, field)| {
            if is_bool(field.as_ref()) && given(&negated_id(&path)) {
                return Some((path, Value::String("false".to_string())));
            }
            if !given(&path) {
                return None;
            }
            let value = matches.try_get_one::<String>(&path).ok().flatten()?;
            Some((path, Value::String(value.clone())))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{BoolField, FieldBuilder, ListField, PortField, StringField};
    use serde_json::json;

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema
            .insert("name", StringField::new().help("Service name"))
            .unwrap();
        schema.define("http.ssl_port", PortField::new().with_default(443)).unwrap();
        schema.define("http.ssl.enabled", BoolField::new()).unwrap();
        schema.insert("tags", ListField::new()).unwrap();
        schema
    }

    #[test]
    fn test_flag_names() {
        assert_eq!(flag_name("http.ssl_port"), "http-ssl-port");
        assert_eq!(flag_name("name"), "name");
    }

    #[test]
    fn test_command_has_scalar_flags_only() {
        let cmd = command_for(&schema(), "svc").unwrap();
        let longs: Vec<&str> = cmd.get_arguments().filter_map(Arg::get_long).collect();
        assert_eq!(
            longs,
            ["name", "http-ssl-port", "http-ssl-enabled", "no-http-ssl-enabled"]
        );
    }

    #[test]
    fn test_colliding_flags_rejected() {
        let mut schema = Schema::new();
        schema.insert("a_b", StringField::new()).unwrap();
        schema.define("a.b", StringField::new()).unwrap();
        let err = command_for(&schema, "svc").unwrap_err();
        assert!(matches!(err, ConfigError::SchemaConflict { .. }));
        assert_eq!(err.path(), Some("a.b"));
        assert!(err.to_string().contains("--a-b"));
    }

    #[test]
    fn test_negated_flag_collision_rejected() {
        let mut schema = Schema::new();
        schema.insert("verbose", BoolField::new()).unwrap();
        schema.insert("no_verbose", StringField::new()).unwrap();
        let err = command_for(&schema, "svc").unwrap_err();
        assert!(err.to_string().contains("--no-verbose"));
    }

    #[test]
    fn test_bool_switches() {
        let schema = schema();
        let parse = |argv: &[&str]| {
            let matches = command_for(&schema, "svc")
                .unwrap()
                .try_get_matches_from(argv)
                .unwrap();
            collect(&schema, &matches)
        };
        assert_eq!(
            parse(&["svc", "--no-http-ssl-enabled"]),
            [("http.ssl.enabled".to_string(), json!("false"))]
        );
        assert_eq!(
            parse(&["svc", "--http-ssl-enabled"]),
            [("http.ssl.enabled".to_string(), json!("true"))]
        );
        assert!(parse(&["svc"]).is_empty());
        assert!(
            command_for(&schema, "svc")
                .unwrap()
                .try_get_matches_from(["svc", "--http-ssl-enabled", "--no-http-ssl-enabled"])
                .is_err()
        );

        let mut config = schema.instantiate();
        config.set("http.ssl.enabled", true).unwrap();
        config
            .cmdline_args_override(parse(&["svc", "--no-http-ssl-enabled"]), &[])
            .unwrap();
        assert_eq!(config.get("http.ssl.enabled").unwrap(), json!(false));
    }

    #[test]
    fn test_collect_and_apply() {
        let schema = schema();
        let matches = command_for(&schema, "svc")
            .unwrap()
            .try_get_matches_from(["svc", "--http-ssl-port", "8443", "--http-ssl-enabled", "yes"])
            .unwrap();
        let overrides = collect(&schema, &matches);
        assert_eq!(
            overrides,
            [
                ("http.ssl_port".to_string(), json!("8443")),
                ("http.ssl.enabled".to_string(), json!("yes")),
            ]
        );

        let mut config = schema.instantiate();
        config.cmdline_args_override(overrides, &[]).unwrap();
        assert_eq!(config.get("http.ssl_port").unwrap(), json!(8443));
        assert_eq!(config.get("http.ssl.enabled").unwrap(), json!(true));
        assert!(!config.contains("name"));
    }
}
