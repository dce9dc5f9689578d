//! Kiln - zero-config build, lint, format and test orchestration for
//! JavaScript and TypeScript packages.
//!
//! Wraps the bundler, transpiler, linter, formatter, test runner and
//! lint-staged behind one CLI, each with a built-in config a project can
//! override.

use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use kiln_lib::Cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging/tracing system
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kiln=debug,kiln_lib=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kiln=info,kiln_lib=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match cli.execute().await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
