//! Observability module
//!
//! Logging setup for the `schemaconf` binary. The library itself only
//! emits `tracing` events and never installs a subscriber.

pub mod logging;

pub use logging::{LogFormat, init_logging};
