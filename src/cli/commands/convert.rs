//! `schemaconf convert`: re-encode a document in another format.
//!
//! Conversion works on the raw value tree; no schema is involved, so
//! encrypted values are carried over as they are.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::cli::args::ConvertArgs;
use crate::error::{ConfigError, SchemaconfError};
use crate::formats::{self, ConfigFormat};

fn pick(name: Option<&str>, path: &Path) -> Result<Arc<dyn ConfigFormat>, ConfigError> {
    name.map_or_else(|| formats::for_path(path), formats::lookup)
}

/// Converts `args.input` into `args.output`.
///
/// # Errors
///
/// Returns an error if a format cannot be determined, the input cannot be
/// read or decoded, or the output cannot be encoded or written.
pub fn run(args: &ConvertArgs) -> Result<(), SchemaconfError> {
    let from = pick(args.from.as_deref(), &args.input)?;
    let to = pick(args.to.as_deref(), &args.output)?;

    let bytes = std::fs::read(&args.input).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::MissingFile {
                path: args.input.clone(),
            }
        } else {
            ConfigError::Io {
                path: args.input.clone(),
                source,
            }
        }
    })?;
    let tree = formats::decode_root(from.as_ref(), &bytes)?;
    let encoded = to.encode(&serde_json::Value::Object(tree))?;
    std::fs::write(&args.output, encoded).map_err(|source| ConfigError::Io {
        path: args.output.clone(),
        source,
    })?;

    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        from = from.name(),
        to = to.name(),
        "converted document"
    );
    Ok(())
}
