//! Test fixtures
//!
//! A `TestProject` owns a temporary project directory and a configuration
//! pointing at it. The directory starts with an empty compose file, compose
//! is replaced with a no-op command and polling runs without pauses.

use std::path::{Path, PathBuf};

use stack_installer::config::{AppConfig, ReadinessConfig};
use stack_installer::models::{HostnameRecord, SecretFileSpec, SecretGenerator, SecretKeySpec};
use tempfile::TempDir;

pub const COMPOSE_FILE: &str = "docker-compose.yml";

pub struct TestProject {
    pub dir: TempDir,
    pub config: AppConfig,
}

impl TestProject {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp project dir");
        let mut config = AppConfig {
            project_dir: dir.path().to_path_buf(),
            domain: "example.test".to_string(),
            acme_email: "ops@example.test".to_string(),
            ..AppConfig::default()
        };
        config.compose.binary = PathBuf::from("true");
        config.compose.base_args = Vec::new();
        config.compose.timeout_seconds = 10;
        config.readiness = fast_readiness(5);

        let project = Self { dir, config };
        project.write(COMPOSE_FILE, "services: {}\n");
        project
    }

    /// Remove the operator-supplied compose file
    pub fn without_compose_file(self) -> Self {
        std::fs::remove_file(self.path(COMPOSE_FILE)).expect("remove compose file");
        self
    }

    /// Replace the secret manifest with a single file
    pub fn with_secret_file(mut self, path: &str, keys: &[(&str, SecretGenerator)]) -> Self {
        self.config.secrets = vec![SecretFileSpec {
            path: PathBuf::from(path),
            keys: keys
                .iter()
                .map(|(key, generator)| SecretKeySpec::new(*key, *generator))
                .collect(),
        }];
        self
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative)).expect("read project file")
    }

    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(path, contents).expect("write project file");
    }

    pub fn fqdns(&self) -> Vec<String> {
        self.config
            .hostname_records()
            .into_iter()
            .map(|r: HostnameRecord| r.fqdn)
            .collect()
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Readiness settings with no pause between attempts
pub fn fast_readiness(attempts: u32) -> ReadinessConfig {
    ReadinessConfig {
        attempts,
        interval_secs: 0,
        request_timeout_secs: 2,
        ..ReadinessConfig::default()
    }
}

/// Permission bits of a file
#[cfg(unix)]
pub fn file_mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).expect("stat file").permissions().mode() & 0o777
}

/// Value of `key` in an env file
pub fn env_value(contents: &str, key: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        line.split_once('=')
            .filter(|(k, _)| k.trim() == key)
            .map(|(_, v)| v.to_string())
    })
}
