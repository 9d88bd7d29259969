//! Command-line support.
//!
//! [`args`] and [`commands`] implement the `schemaconf` binary;
//! [`overrides`] turns a schema into command-line flags for applications
//! that want to override config values from their own command line.

pub mod args;
pub mod commands;
pub mod overrides;
