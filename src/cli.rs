//! Command line handling
//!
//! The installer takes at most one mode flag. `-h` and `-V` short-circuit
//! everything else, including configuration loading.

use crate::models::{select_mode, DeploymentMode};
use crate::utils::{InstallerError, InstallerResult};

/// What the binary was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Version,
    /// Install or update; holds the raw mode flag, if any
    Run(Option<String>),
}

/// Parse arguments, excluding the program name
pub fn parse_args<I, S>(args: I) -> InstallerResult<Command>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        return Ok(Command::Help);
    }
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        return Ok(Command::Version);
    }
    if args.len() > 1 {
        return Err(InstallerError::Precondition(format!(
            "Expected at most one mode flag, got: {}",
            args.join(" ")
        )));
    }

    Ok(Command::Run(args.into_iter().next()))
}

/// Map the mode flag to a mode
///
/// Strict parsing rejects unknown flags; lenient parsing falls back to staging.
pub fn resolve_mode(flag: Option<&str>, lenient: bool) -> InstallerResult<DeploymentMode> {
    if lenient {
        Ok(select_mode(flag))
    } else {
        DeploymentMode::from_arg(flag)
    }
}

pub fn version_line() -> String {
    format!("Stack Installer {}", env!("CARGO_PKG_VERSION"))
}

pub fn help_text() -> String {
    format!(
        r#"{}

USAGE:
    stack-installer [MODE] [OPTIONS]

MODES:
    (none)              Install against the staging ACME directory and verify
                        that every hostname serves a staging certificate
    --prod              Install against the production ACME directory and
                        verify production certificates
    --update            Skip configuration, only pull and restart the stack

OPTIONS:
    -h, --help          Print this help message
    -V, --version       Print version information

ENVIRONMENT:
    INSTALLER_CONFIG              Path to configuration file
    INSTALLER_PROJECT_DIR         Project directory (default: /opt/stack)
    INSTALLER_DOMAIN              Base domain for derived hostnames
    INSTALLER_ACME_EMAIL          ACME account contact address
    INSTALLER_EXPECTED_IP         Address every hostname must resolve to
    INSTALLER_SKIP_DNS_CHECK      Skip the DNS precondition (true/false)
    INSTALLER_POLL_ATTEMPTS       Readiness attempts per hostname
    INSTALLER_POLL_INTERVAL_SECS  Seconds between readiness attempts
    INSTALLER_VERIFY_CONCURRENCY  Hostnames verified at once
    INSTALLER_STAGING_SIGNATURES  Comma separated staging issuer signatures
    INSTALLER_LENIENT_MODE_FLAG   Treat unknown mode flags as staging
    INSTALLER_LOG_FORMAT          Log format: pretty, json, compact
    INSTALLER_LOG_TARGET          Log target: console, file, both
    INSTALLER_LOG_DIR             Directory for log files
    RUST_LOG                      Log filter (e.g. info, stack_installer=debug)

CONFIGURATION:
    Configuration is read from the first file found:
      1. Path in INSTALLER_CONFIG
      2. ./installer.yaml
      3. ./config/installer.yaml
      4. /etc/stack-installer/installer.yaml
      5. <user config dir>/stack-installer/installer.yaml

    The project directory must already hold the stack's compose file
    (compose.file, default docker-compose.yml).

EXIT STATUS:
    0   every hostname served a certificate from the expected authority,
        or the update completed
    1   a hostname failed verification or a precondition was not met"#,
        version_line()
    )
}
