//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod convert;
pub mod keys;
pub mod version;

use crate::cli::args::{Cli, Commands};
use crate::error::SchemaconfError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub fn dispatch(cli: Cli) -> Result<(), SchemaconfError> {
    match cli.command {
        Commands::Convert(args) => convert::run(&args),
        Commands::Keygen(args) => keys::keygen(&args),
        Commands::Encrypt(args) => keys::encrypt(&args),
        Commands::Decrypt(args) => keys::decrypt(&args),
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}
