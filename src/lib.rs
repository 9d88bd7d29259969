//! `schemaconf` - declarative configuration schemas
//!
//! A [`Schema`] describes a tree of typed fields. Instantiating it yields a
//! [`Config`] that validates every assignment, masks and encrypts secure
//! values, resolves include directives and reads or writes JSON, YAML, XML,
//! BSON and pickle documents through [`ConfigFormat`] implementations.

pub mod cli;
pub mod config;
pub mod encryption;
pub mod error;
pub mod fields;
pub mod formats;
pub mod observability;
pub mod schema;

pub use config::{Config, ListProxy};
pub use error::{ConfigError, SchemaconfError};
pub use fields::{Field, FieldBuilder};
pub use formats::ConfigFormat;
pub use schema::{Node, Schema};
