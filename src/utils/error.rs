//! Error types and handling
//!
//! Fatal errors (filesystem, precondition, configuration, compose) abort the run.
//! Network and TLS errors are produced by the readiness probes and folded into
//! per-hostname verdicts instead of propagating.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Installer error types
#[derive(Debug, Error)]
pub enum InstallerError {
    /// A required directory or file could not be created, read or written
    #[error("Filesystem error at {path:?}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Required prior state is missing (no prior install, DNS not pointing here)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The container orchestrator exited unsuccessfully
    #[error("Compose error: {0}")]
    Compose(String),

    /// HTTP request failed or did not complete
    #[error("Network error: {0}")]
    Network(String),

    /// TLS handshake or certificate parsing failed
    #[error("TLS error: {0}")]
    Tls(String),
}

impl InstallerError {
    /// Build a filesystem error for the given path
    pub fn filesystem(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        InstallerError::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, InstallerError::Network(_) | InstallerError::Tls(_))
    }
}

impl From<reqwest::Error> for InstallerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            InstallerError::Network("request timed out".to_string())
        } else if err.is_connect() {
            InstallerError::Network(format!("connection failed: {}", err))
        } else {
            InstallerError::Network(err.to_string())
        }
    }
}

impl From<serde_norway::Error> for InstallerError {
    fn from(err: serde_norway::Error) -> Self {
        InstallerError::Config(format!("YAML error: {}", err))
    }
}

/// Result type alias for installer operations
pub type InstallerResult<T> = Result<T, InstallerError>;
