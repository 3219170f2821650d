//! Container orchestrator driver
//!
//! Runs the compose CLI (`pull`, `up -d`, `down`) as an opaque process with a
//! timeout. Exit code 0 is success; anything else is a fatal `Compose` error.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::utils::{InstallerError, InstallerResult};

/// Output of one orchestrator command
#[derive(Debug, Clone)]
pub struct ComposeOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

/// Drives the compose lifecycle for the project directory
#[derive(Debug, Clone)]
pub struct ComposeDriver {
    binary: PathBuf,
    base_args: Vec<String>,
    compose_file: PathBuf,
    project_dir: PathBuf,
    timeout_seconds: u64,
}

impl ComposeDriver {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            binary: config.compose.binary.clone(),
            base_args: config.compose.base_args.clone(),
            compose_file: config.compose_file_path(),
            project_dir: config.project_dir.clone(),
            timeout_seconds: config.compose.timeout_seconds,
        }
    }

    /// Pull the latest images
    pub async fn pull(&self) -> InstallerResult<ComposeOutput> {
        self.run(&["pull"]).await
    }

    /// Create and start the stack in the background
    pub async fn up(&self) -> InstallerResult<ComposeOutput> {
        self.run(&["up", "-d", "--remove-orphans"]).await
    }

    /// Stop and remove the stack's containers
    pub async fn down(&self) -> InstallerResult<ComposeOutput> {
        self.run(&["down"]).await
    }

    fn args_for(&self, subcommand: &[&str]) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push("-f".to_string());
        args.push(self.compose_file.to_string_lossy().to_string());
        args.push("--project-directory".to_string());
        args.push(self.project_dir.to_string_lossy().to_string());
        args.extend(subcommand.iter().map(|s| s.to_string()));
        args
    }

    /// Execute a compose subcommand with timeout
    async fn run(&self, subcommand: &[&str]) -> InstallerResult<ComposeOutput> {
        let start = Instant::now();
        let args = self.args_for(subcommand);
        let command_str = format!("{} {}", self.binary.display(), args.join(" "));

        info!("Executing: {}", command_str);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .current_dir(&self.project_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| InstallerError::Compose(format!("Failed to spawn '{}': {}", command_str, e)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| InstallerError::Compose("stdout was not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| InstallerError::Compose("stderr was not captured".to_string()))?;

        let timeout_duration = Duration::from_secs(self.timeout_seconds);
        let result = timeout(timeout_duration, async {
            let mut stdout_buf = String::new();
            let mut stderr_buf = String::new();

            let (stdout_result, stderr_result, status) = tokio::join!(
                stdout.read_to_string(&mut stdout_buf),
                stderr.read_to_string(&mut stderr_buf),
                child.wait()
            );
            stdout_result.ok();
            stderr_result.ok();

            status.map(|s| (stdout_buf, stderr_buf, s))
        })
        .await;

        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok((stdout_str, stderr_str, status))) => {
                let output = ComposeOutput {
                    stdout: stdout_str,
                    stderr: stderr_str,
                    exit_code: status.code(),
                    duration_ms,
                };

                if status.success() {
                    info!("Command succeeded in {}ms: {}", duration_ms, command_str);
                    debug!("stdout: {}", output.stdout);
                    Ok(output)
                } else {
                    error!(
                        "Command FAILED: exit_code={:?}, command='{}'",
                        output.exit_code, command_str
                    );
                    error!("stderr:\n{}", output.stderr);
                    Err(InstallerError::Compose(format!(
                        "'{}' exited with {:?}: {}",
                        command_str,
                        output.exit_code,
                        output.stderr.trim()
                    )))
                }
            }
            Ok(Err(e)) => Err(InstallerError::Compose(format!(
                "Failed to wait for '{}': {}",
                command_str, e
            ))),
            Err(_) => {
                error!(
                    "Command TIMEOUT after {}s: command='{}'",
                    self.timeout_seconds, command_str
                );
                let _ = child.kill().await;
                Err(InstallerError::Compose(format!(
                    "'{}' timed out after {} seconds",
                    command_str, self.timeout_seconds
                )))
            }
        }
    }
}
