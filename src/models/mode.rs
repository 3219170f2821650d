//! Deployment mode and certificate class

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::utils::InstallerError;

/// Operating mode selected on the command line
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// Generate config against the staging ACME directory (default)
    #[default]
    Staging,
    /// Generate config against the production ACME directory
    Production,
    /// Skip config generation, only re-apply the stack
    Update,
}

/// Class of certificate authority a served certificate is expected to come from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CertificateClass {
    Staging,
    Production,
}

impl DeploymentMode {
    /// Command line flag for this mode, `None` for the default
    pub fn flag(&self) -> Option<&'static str> {
        match self {
            DeploymentMode::Staging => None,
            DeploymentMode::Production => Some("--prod"),
            DeploymentMode::Update => Some("--update"),
        }
    }

    /// Certificate class the mode issues from; Update mode generates nothing
    pub fn certificate_class(&self) -> Option<CertificateClass> {
        match self {
            DeploymentMode::Staging => Some(CertificateClass::Staging),
            DeploymentMode::Production => Some(CertificateClass::Production),
            DeploymentMode::Update => None,
        }
    }

    /// Whether this mode regenerates on-disk configuration
    pub fn generates_config(&self) -> bool {
        self.certificate_class().is_some()
    }

    /// Parse the optional mode flag, rejecting anything unrecognized
    pub fn from_arg(arg: Option<&str>) -> Result<Self, InstallerError> {
        match arg {
            None => Ok(DeploymentMode::Staging),
            Some(flag) => flag.parse(),
        }
    }
}

impl FromStr for DeploymentMode {
    type Err = InstallerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "--staging" => Ok(DeploymentMode::Staging),
            "--prod" => Ok(DeploymentMode::Production),
            "--update" => Ok(DeploymentMode::Update),
            other => Err(InstallerError::Precondition(format!(
                "Unrecognized mode flag '{}' (expected --prod, --update or no flag)",
                other
            ))),
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentMode::Staging => write!(f, "staging"),
            DeploymentMode::Production => write!(f, "production"),
            DeploymentMode::Update => write!(f, "update"),
        }
    }
}

/// Permissive mode selection: any unrecognized flag falls back to Staging
pub fn select_mode(arg: Option<&str>) -> DeploymentMode {
    match arg {
        Some("--prod") => DeploymentMode::Production,
        Some("--update") => DeploymentMode::Update,
        None => DeploymentMode::Staging,
        Some(other) => {
            warn!(flag = other, "Unrecognized mode flag, falling back to staging");
            DeploymentMode::Staging
        }
    }
}

impl CertificateClass {
    /// Name of the certificate store used for this class
    pub fn store_name(&self) -> &'static str {
        match self {
            CertificateClass::Staging => "staging",
            CertificateClass::Production => "production",
        }
    }
}

impl fmt::Display for CertificateClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.store_name())
    }
}
