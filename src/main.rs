//! Stack Installer - provisions and verifies a self-hosted container stack
//!
//! Reconciles the proxy configuration, certificate stores and secret files in
//! the project directory, cycles the stack through its compose tooling and
//! checks that every hostname serves a certificate from the expected
//! authority.

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::info;

use stack_installer::cli::{self, Command};
use stack_installer::logging::init_logging;
use stack_installer::{AppConfig, Installer, RunOutcome};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let flag = match cli::parse_args(env::args().skip(1))? {
        Command::Help => {
            println!("{}", cli::help_text());
            return Ok(ExitCode::SUCCESS);
        }
        Command::Version => {
            println!("{}", cli::version_line());
            return Ok(ExitCode::SUCCESS);
        }
        Command::Run(flag) => flag,
    };

    // Load configuration first (before logging, so we know log format)
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Held until exit so buffered file logs are flushed
    let _log_guard = init_logging(&config.logging);

    let mode = cli::resolve_mode(flag.as_deref(), config.lenient_mode_flag)
        .context("Invalid command line")?;

    info!("Stack Installer {} starting in {} mode", env!("CARGO_PKG_VERSION"), mode);

    let installer = Installer::new(config);
    let outcome = installer
        .run(mode)
        .await
        .with_context(|| format!("{} run failed", mode))?;

    match &outcome {
        RunOutcome::Updated => println!("Stack updated."),
        RunOutcome::Verified(report) => {
            println!("{}", report.summary());
            println!(
                "Report written to {}",
                installer.config().report_path().display()
            );
        }
    }

    if outcome.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
