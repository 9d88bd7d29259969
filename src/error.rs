//! Error types for `schemaconf`
//!
//! Schema, configuration, encryption and format failures, plus the
//! top-level error and exit codes used by the command-line binary.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `schemaconf` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid document, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Encryption error (bad key file, corrupt ciphertext)
    pub const CRYPTO_ERROR: i32 = 4;

    /// Usage error (invalid arguments, unknown format)
    pub const USAGE_ERROR: i32 = 64;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for the `schemaconf` binary.
#[derive(Debug, Error)]
pub enum SchemaconfError {
    /// Configuration loading, saving or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Key file or cipher error
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Invalid command-line usage
    #[error("{0}")]
    Usage(String),

    /// I/O error outside of configuration loading
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SchemaconfError {
    /// Returns the process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(ConfigError::MissingFile { .. } | ConfigError::Io { .. }) | Self::Io(_) => {
                ExitCode::IO_ERROR
            }
            Self::Config(ConfigError::UnknownFormat { .. }) | Self::Usage(_) => {
                ExitCode::USAGE_ERROR
            }
            Self::Config(ConfigError::Crypto { .. }) | Self::Crypto(_) => ExitCode::CRYPTO_ERROR,
            Self::Config(_) => ExitCode::CONFIG_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Schema definition, configuration access and load/save errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field rejected a value
    #[error("{name}: {message}")]
    Validation {
        /// Full dotted path of the field (or config section)
        path: String,
        /// Friendly name: the field's display name, else its full path
        name: String,
        /// Message produced by the field or validator
        message: String,
    },

    /// Incompatible schema definitions at the same path
    #[error("schema conflict at '{path}': {message}")]
    SchemaConflict {
        /// Dotted path of the conflicting definition
        path: String,
        /// Description of the conflict
        message: String,
    },

    /// A dotted path does not name a field or section
    #[error("unknown configuration path '{path}'{}", suggestion.as_ref().map_or_else(String::new, |s| format!(" (did you mean '{s}'?)")))]
    UnknownPath {
        /// The path that was looked up
        path: String,
        /// Closest sibling key, if one is similar enough
        suggestion: Option<String>,
    },

    /// A secure value could not be encrypted or decrypted
    #[error("{path}: {source}")]
    Crypto {
        /// Dotted path of the secure field
        path: String,
        /// Underlying encryption error
        #[source]
        source: CryptoError,
    },

    /// A document could not be encoded or decoded
    #[error("{format} format error: {message}")]
    Format {
        /// Format name
        format: String,
        /// Error message from the codec
        message: String,
    },

    /// No format is registered under the requested name
    #[error("unknown config format '{name}'")]
    UnknownFormat {
        /// Requested format name
        name: String,
    },

    /// Circular include detected
    #[error("circular include detected: {cycle:?}")]
    CircularInclude {
        /// The chain of files that forms the cycle
        cycle: Vec<PathBuf>,
    },

    /// Includes nested deeper than the configured limit
    #[error("include depth {depth} exceeds maximum of {max}")]
    IncludeDepth {
        /// Depth that was reached
        depth: usize,
        /// Configured maximum
        max: usize,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Reading or writing a configuration file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Returns the dotted path this error refers to, if any.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Validation { path, .. }
            | Self::SchemaConflict { path, .. }
            | Self::UnknownPath { path, .. }
            | Self::Crypto { path, .. } => Some(path),
            _ => None,
        }
    }

    pub(crate) fn format(format: &str, message: impl ToString) -> Self {
        Self::Format {
            format: format.to_string(),
            message: message.to_string(),
        }
    }
}

// ============================================================================
// Encryption Errors
// ============================================================================

/// Key file and cipher errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key file exists but does not hold a valid key
    #[error("invalid encryption key file {path}: expected 32 bytes, found {len}")]
    InvalidKey {
        /// Key file path
        path: PathBuf,
        /// Number of bytes found
        len: usize,
    },

    /// Cipher not compiled into this build
    #[error("encryption method '{method}' is not available in this build")]
    Unavailable {
        /// Requested method
        method: String,
    },

    /// Unrecognized method identifier
    #[error("invalid encryption method: {name}")]
    UnknownMethod {
        /// The identifier that was given
        name: String,
    },

    /// Encryption failed
    #[error("encryption failed: {message}")]
    Encrypt {
        /// Cipher error description
        message: String,
    },

    /// Decryption failed (wrong key, truncated or tampered ciphertext)
    #[error("decryption failed: {message}")]
    Decrypt {
        /// Cipher error description
        message: String,
    },

    /// Persisted secure value has the wrong shape
    #[error("malformed secure value: {message}")]
    Malformed {
        /// What was wrong
        message: String,
    },

    /// Key file could not be read or written
    #[error("key file I/O error on {path}: {source}")]
    Io {
        /// Key file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Field Errors
// ============================================================================

/// Error produced by a single field, before the owning config attaches
/// the field's path and friendly name.
#[derive(Debug, Error)]
pub enum FieldError {
    /// The value does not satisfy the field's constraints
    #[error("{0}")]
    Invalid(String),

    /// Encrypting or decrypting a secure value failed
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl FieldError {
    /// Creates an [`FieldError::Invalid`] from any message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
