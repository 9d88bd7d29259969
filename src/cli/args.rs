//! CLI argument definitions
//!
//! All Clap derive structs for `schemaconf` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::encryption::EncryptionMethod;
use crate::observability::LogFormat;

/// Environment variable naming the default key file.
pub const KEY_FILE_ENV: &str = "SCHEMACONF_KEY_FILE";

// ============================================================================
// Root CLI
// ============================================================================

/// Convert config documents and manage encryption keys.
#[derive(Parser, Debug)]
#[command(name = "schemaconf", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "SCHEMACONF_COLOR")]
    pub color: ColorChoice,

    /// Log output format.
    #[arg(long, default_value = "human", global = true)]
    pub log_format: LogFormat,
}

// ============================================================================
// Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a document from one format to another.
    Convert(ConvertArgs),

    /// Generate a new key file.
    Keygen(KeygenArgs),

    /// Encrypt a value and print the persisted form as JSON.
    Encrypt(EncryptArgs),

    /// Decrypt a persisted secure value given as JSON.
    Decrypt(DecryptArgs),

    /// Display version information.
    Version(VersionArgs),
}

/// Arguments for `schemaconf convert`.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input document.
    pub input: PathBuf,

    /// Output document.
    pub output: PathBuf,

    /// Input format (guessed from the input extension when omitted).
    #[arg(long)]
    pub from: Option<String>,

    /// Output format (guessed from the output extension when omitted).
    #[arg(long)]
    pub to: Option<String>,
}

/// Arguments for `schemaconf keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Where to write the key.
    pub path: PathBuf,

    /// Overwrite an existing key file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for `schemaconf encrypt`.
#[derive(Args, Debug)]
pub struct EncryptArgs {
    /// Plaintext to encrypt.
    pub text: String,

    /// Key file (created if missing).
    #[arg(long, env = KEY_FILE_ENV)]
    pub key: Option<PathBuf>,

    /// Encryption method: best, aes or xor.
    #[arg(long, default_value = "best")]
    pub method: EncryptionMethod,
}

/// Arguments for `schemaconf decrypt`.
#[derive(Args, Debug)]
pub struct DecryptArgs {
    /// Secure value as JSON, e.g. `{"method":"aes","ciphertext":"..."}`.
    pub value: String,

    /// Key file.
    #[arg(long, env = KEY_FILE_ENV)]
    pub key: Option<PathBuf>,
}

/// Arguments for `schemaconf version`.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for informational commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Human,
    /// JSON.
    Json,
}
