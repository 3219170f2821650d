//! Secret key manifests

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How a missing secret value is generated
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SecretGenerator {
    /// 32 random bytes, hex encoded (database-style credentials)
    Hex32,
    /// 48 random bytes, base64 encoded without newlines (token-style secrets)
    #[serde(rename = "base64_48")]
    Base64_48,
}

/// A required key and its generator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretKeySpec {
    pub key: String,
    pub generator: SecretGenerator,
}

impl SecretKeySpec {
    pub fn new(key: impl Into<String>, generator: SecretGenerator) -> Self {
        Self {
            key: key.into(),
            generator,
        }
    }
}

/// One environment file and the keys it must contain, in declaration order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretFileSpec {
    /// Path relative to the project directory
    pub path: PathBuf,
    #[serde(default)]
    pub keys: Vec<SecretKeySpec>,
}

/// What reconciliation did to a secrets file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretReconcileOutcome {
    /// The file did not exist before this run
    pub created: bool,
    /// Keys that received freshly generated values
    pub added: Vec<String>,
    /// Required keys whose existing values were kept
    pub preserved: Vec<String>,
}

impl SecretReconcileOutcome {
    /// True when the file content was left untouched
    pub fn is_noop(&self) -> bool {
        !self.created && self.added.is_empty()
    }
}
