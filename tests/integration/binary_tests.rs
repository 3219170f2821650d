//! Runs of the compiled installer binary: flags, exit codes and output streams

use std::path::Path;
use std::process::{Command, Output};

use crate::common::*;

/// Run the binary from `cwd` with only PATH and `envs` set
fn run_installer(cwd: &Path, args: &[&str], envs: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_stack-installer"));
    command.args(args).current_dir(cwd).env_clear();
    if let Some(path) = std::env::var_os("PATH") {
        command.env("PATH", path);
    }
    command.envs(envs.iter().copied());
    command.output().expect("run installer binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Config file path and env for a run against `project`
fn project_env(project: &TestProject, config_yaml: &str) -> Vec<(String, String)> {
    project.write("installer.yaml", config_yaml);
    vec![
        (
            "INSTALLER_CONFIG".to_string(),
            project.path("installer.yaml").display().to_string(),
        ),
        (
            "INSTALLER_PROJECT_DIR".to_string(),
            project.dir.path().display().to_string(),
        ),
        ("INSTALLER_SKIP_DNS_CHECK".to_string(), "true".to_string()),
    ]
}

fn as_refs(envs: &[(String, String)]) -> Vec<(&str, &str)> {
    envs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
}

#[test]
fn test_version_flag() {
    let project = TestProject::new();
    let output = run_installer(project.dir.path(), &["--version"], &[]);

    assert!(output.status.success());
    assert!(stdout(&output).starts_with("Stack Installer "));
}

#[test]
fn test_help_flag_wins_over_mode() {
    let project = TestProject::new();
    let output = run_installer(project.dir.path(), &["--prod", "--help"], &[]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("USAGE:"));
}

#[test]
fn test_two_mode_flags_exit_with_failure() {
    let project = TestProject::new();
    let output = run_installer(project.dir.path(), &["--prod", "--update"], &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Expected at most one mode flag"));
}

#[test]
fn test_unknown_flag_is_rejected_by_default() {
    let project = TestProject::new();
    let envs = project_env(&project, "");

    let output = run_installer(project.dir.path(), &["--production"], &as_refs(&envs));

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Invalid command line"));
    assert!(!project.path(".env").exists());
}

#[test]
fn test_lenient_flag_falls_back_to_staging() {
    // Without a compose file the staging run stops at its first precondition
    let project = TestProject::new().without_compose_file();
    let mut envs = project_env(&project, "");
    envs.push(("INSTALLER_LENIENT_MODE_FLAG".to_string(), "true".to_string()));

    let output = run_installer(project.dir.path(), &["--production"], &as_refs(&envs));

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(!err.contains("Invalid command line"));
    assert!(err.contains("staging run failed"));
    assert!(err.contains("Compose file"));
}

#[test]
fn test_update_without_install_exits_with_failure() {
    let project = TestProject::new();
    let envs = project_env(&project, "");

    let output = run_installer(project.dir.path(), &["--update"], &as_refs(&envs));

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("run an install first"));
}

#[cfg(unix)]
#[test]
fn test_update_after_install_exits_with_success() {
    let project = TestProject::new();
    project.write("traefik/traefik.yml", "# rendered earlier\n");
    let envs = project_env(&project, "compose:\n  binary: \"true\"\n  base_args: []\n");

    let output = run_installer(project.dir.path(), &["--update"], &as_refs(&envs));

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "Stack updated.");
}
