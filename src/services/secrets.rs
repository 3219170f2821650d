//! Secret file reconciliation
//!
//! Environment files are additive-only across reruns: an existing value is
//! never regenerated, a missing key is appended with a fresh value, and the
//! order of existing lines is kept. Running reconciliation again with the
//! same manifest leaves the file byte-identical.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::{rngs::OsRng, RngCore};
use tracing::{debug, info};

use crate::models::{SecretGenerator, SecretKeySpec, SecretReconcileOutcome};
use crate::utils::fs::{restrict_permissions, write_atomic, PRIVATE_FILE_MODE};
use crate::utils::{InstallerError, InstallerResult};

/// Generate a fresh value with a cryptographically strong RNG
pub fn generate_secret(generator: SecretGenerator) -> String {
    match generator {
        SecretGenerator::Hex32 => {
            let mut bytes = [0u8; 32];
            OsRng.fill_bytes(&mut bytes);
            hex::encode(bytes)
        }
        SecretGenerator::Base64_48 => {
            let mut bytes = [0u8; 48];
            OsRng.fill_bytes(&mut bytes);
            BASE64.encode(bytes).replace('\n', "")
        }
    }
}

/// Key of a `KEY=VALUE` line, ignoring comments and an optional `export ` prefix
fn line_key(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, _) = trimmed.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Value of a `KEY=VALUE` line with surrounding quotes removed
fn line_value(line: &str) -> &str {
    let value = line.split_once('=').map(|(_, v)| v.trim()).unwrap_or("");
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
}

/// Result of merging required keys into env-file content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedSecrets {
    pub content: String,
    /// Keys that received a generated value
    pub added: Vec<String>,
    /// Keys that already had a value
    pub preserved: Vec<String>,
}

/// Merge required keys into existing env-file content
///
/// A key that is present with an empty value is filled in place, keeping
/// whatever precedes the `=` (an `export ` prefix, spacing). A key with a
/// value is kept.
pub fn merge_secret_content(
    existing: &str,
    required: &[SecretKeySpec],
    generate: &mut dyn FnMut(SecretGenerator) -> String,
) -> MergedSecrets {
    let mut lines: Vec<String> = existing.lines().map(str::to_string).collect();
    let mut added = Vec::new();
    let mut preserved = Vec::new();

    for spec in required {
        let position = lines
            .iter()
            .position(|line| line_key(line) == Some(spec.key.as_str()));

        match position {
            Some(idx) if !line_value(&lines[idx]).is_empty() => {
                preserved.push(spec.key.clone());
            }
            Some(idx) => {
                // line_key matched, so the line has an '='
                let head = lines[idx]
                    .split_once('=')
                    .map(|(head, _)| head)
                    .unwrap_or(spec.key.as_str());
                let filled = format!("{}={}", head, generate(spec.generator));
                lines[idx] = filled;
                added.push(spec.key.clone());
            }
            None => {
                lines.push(format!("{}={}", spec.key, generate(spec.generator)));
                added.push(spec.key.clone());
            }
        }
    }

    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    MergedSecrets {
        content,
        added,
        preserved,
    }
}

/// Reconcile `path` against `required`, writing atomically with mode 0600
pub fn reconcile_secret_set(
    path: &Path,
    required: &[SecretKeySpec],
) -> InstallerResult<SecretReconcileOutcome> {
    let (existing, created) = match fs::read_to_string(path) {
        Ok(content) => (content, false),
        Err(e) if e.kind() == ErrorKind::NotFound => (String::new(), true),
        Err(e) => return Err(InstallerError::filesystem(path, e)),
    };

    let merged = merge_secret_content(&existing, required, &mut generate_secret);

    if created || merged.content != existing {
        write_atomic(path, merged.content.as_bytes(), Some(PRIVATE_FILE_MODE))?;
        info!(
            path = ?path,
            added = merged.added.len(),
            preserved = merged.preserved.len(),
            "Reconciled secrets file"
        );
    } else {
        restrict_permissions(path)?;
        debug!(path = ?path, "Secrets file already complete");
    }

    Ok(SecretReconcileOutcome {
        created,
        added: merged.added,
        preserved: merged.preserved,
    })
}

/// Current non-empty value of `key` in an env file, if any
pub fn read_secret_value(path: &Path, key: &str) -> InstallerResult<Option<String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(InstallerError::filesystem(path, e)),
    };

    Ok(content
        .lines()
        .find(|line| line_key(line) == Some(key))
        .map(line_value)
        .filter(|value| !value.is_empty())
        .map(str::to_string))
}
