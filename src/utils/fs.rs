//! Filesystem helpers

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::utils::{InstallerError, InstallerResult};

/// Owner read/write only
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// What an always-overwrite write did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Write `contents` to `path` via a sibling temp file and a rename
///
/// Readers observe either the old file or the complete new one. With `mode`
/// set, the temp file is created with those permission bits before any data
/// is written.
pub fn write_atomic(path: &Path, contents: &[u8], mode: Option<u32>) -> InstallerResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| InstallerError::filesystem(&parent, e))?;

    let tmp_path = temp_path_for(path);
    let _ = fs::remove_file(&tmp_path);

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if let Some(mode) = mode {
            options.mode(mode);
        }
    }
    #[cfg(not(unix))]
    let _ = mode;

    let result = (|| -> std::io::Result<()> {
        let mut file = options.open(&tmp_path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = mode {
                file.set_permissions(fs::Permissions::from_mode(mode))?;
            }
        }
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(InstallerError::filesystem(path, e));
    }

    Ok(())
}

/// Overwrite derived (non-secret) content, skipping the write when nothing changed
///
/// Existing content is compared as bytes, so a file that is not valid UTF-8
/// is simply replaced.
pub fn write_if_changed(path: &Path, contents: &str) -> InstallerResult<WriteOutcome> {
    let outcome = match fs::read(path) {
        Ok(existing) if existing == contents.as_bytes() => return Ok(WriteOutcome::Unchanged),
        Ok(_) => WriteOutcome::Updated,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => WriteOutcome::Created,
        Err(e) => return Err(InstallerError::filesystem(path, e)),
    };

    write_atomic(path, contents.as_bytes(), None)?;
    Ok(outcome)
}

/// Restrict an existing file to owner read/write
pub fn restrict_permissions(path: &Path) -> InstallerResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let current = fs::metadata(path)
            .map_err(|e| InstallerError::filesystem(path, e))?
            .permissions()
            .mode();
        if current & 0o777 != PRIVATE_FILE_MODE {
            fs::set_permissions(path, fs::Permissions::from_mode(PRIVATE_FILE_MODE))
                .map_err(|e| InstallerError::filesystem(path, e))?;
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    path.with_file_name(format!(".{}.tmp-{}", file_name, std::process::id()))
}
