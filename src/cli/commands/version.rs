//! Version information display
//!
//! Prints the version and the compiled-in ciphers in human or JSON format.

use serde_json::json;

use crate::cli::args::{OutputFormat, VersionArgs};
use crate::encryption::EncryptionMethod;

/// Print version information.
pub fn run(args: &VersionArgs) {
    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");
    let best = EncryptionMethod::Best
        .resolve()
        .map_or_else(|_| "none".to_string(), |c| c.to_string());

    match args.format {
        OutputFormat::Human => {
            println!("{name} {version} (best cipher: {best})");
        }
        OutputFormat::Json => {
            println!("{}", json!({"name": name, "version": version, "best_cipher": best}));
        }
    }
}
