//! Per-mode certificate stores
//!
//! A store is created empty and locked to owner read/write exactly once. An
//! existing store is never truncated, deleted or re-permissioned, and ensuring
//! one class's store never touches the other's.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::AppConfig;
use crate::models::CertificateClass;
use crate::utils::{InstallerError, InstallerResult};

/// Result of an idempotent creation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The file did not exist and was created
    Created,
    /// The file already existed and was left untouched
    AlreadyPresent,
}

/// Ensure the store for `class` exists, returning its path and what happened
pub fn ensure_certificate_store(
    config: &AppConfig,
    class: CertificateClass,
) -> InstallerResult<(PathBuf, EnsureOutcome)> {
    let path = config.store_path(class);
    let outcome = ensure_store_file(&path)?;

    match outcome {
        EnsureOutcome::Created => info!(store = %class, path = ?path, "Created certificate store"),
        EnsureOutcome::AlreadyPresent => {
            debug!(store = %class, path = ?path, "Certificate store already present")
        }
    }

    Ok((path, outcome))
}

/// Create `path` empty with mode 0600 unless it already exists
pub fn ensure_store_file(path: &Path) -> InstallerResult<EnsureOutcome> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| InstallerError::filesystem(parent, e))?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    match options.open(path) {
        Ok(file) => {
            // Mode must be exactly 0600 whatever the umask is.
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(fs::Permissions::from_mode(0o600))
                    .map_err(|e| InstallerError::filesystem(path, e))?;
            }
            drop(file);
            Ok(EnsureOutcome::Created)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(EnsureOutcome::AlreadyPresent),
        Err(e) => Err(InstallerError::filesystem(path, e)),
    }
}
