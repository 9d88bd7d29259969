//! `schemaconf` - configuration file and key management tool

use clap::Parser;

use schemaconf::cli::args::Cli;
use schemaconf::cli::commands;
use schemaconf::error::ExitCode;
use schemaconf::observability::init_logging;

fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        init_logging(cli.log_format, cli.verbose, cli.color);
    }

    match commands::dispatch(cli) {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
