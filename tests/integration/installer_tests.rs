//! End-to-end installer runs with a no-op compose command and mock probes

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use stack_installer::config::IssuerConfig;
use stack_installer::models::{CertificateClass, DeploymentMode, ReadinessReport};
use stack_installer::services::{htpasswd_sha1, Installer, ReadinessVerifier, RunOutcome};
use stack_installer::InstallerError;

use crate::common::*;

fn public_ip() -> IpAddr {
    "203.0.113.7".parse().unwrap()
}

fn installer_for(project: &TestProject, issuer: &str) -> Installer {
    let fqdns = project.fqdns();
    let status = fqdns
        .iter()
        .fold(MockStatusProbe::new(), |probe, h| probe.ready_after(h, 2));
    let verifier = ReadinessVerifier::with_probes(
        &project.config.readiness,
        &IssuerConfig::default(),
        Arc::new(status),
        Arc::new(MockIssuerProbe::all(&fqdns, issuer)),
    );

    let mut config = project.config.clone();
    config.dns.expected_ip = Some(public_ip());

    Installer::new(config)
        .with_resolver(Arc::new(StaticResolver::pointing_at(&fqdns, public_ip())))
        .with_verifier(verifier)
}

#[cfg(unix)]
#[tokio::test]
async fn test_staging_install_verifies_and_writes_report() {
    let project = TestProject::new();
    let installer = installer_for(&project, STAGING_ISSUER);

    let outcome = installer.run(DeploymentMode::Staging).await.unwrap();

    assert!(outcome.success());
    let report = outcome.report().unwrap();
    assert_eq!(report.outcomes.len(), 5);
    assert!(report.outcomes.iter().all(|o| o.attempts == 2));

    assert!(project.config.store_path(CertificateClass::Staging).is_file());
    assert!(!project.config.store_path(CertificateClass::Production).exists());
    assert!(project.path("traefik/traefik.yml").is_file());
    assert!(project.path("traefik/dynamic/routes.yml").is_file());
    assert!(env_value(&project.read(".env"), "POSTGRES_PASSWORD").is_some());

    let password = env_value(&project.read(".env"), "DASHBOARD_PASSWORD").unwrap();
    let routes = project.read("traefik/dynamic/routes.yml");
    assert!(routes.contains(&htpasswd_sha1("admin", &password)));

    let saved: ReadinessReport = serde_json::from_str(&project.read("readiness-report.json")).unwrap();
    assert_eq!(saved.run_id, report.run_id);
    assert!(saved.passed());
}

#[cfg(unix)]
#[tokio::test]
async fn test_production_install_with_staging_certificates_fails() {
    let project = TestProject::new();
    let installer = installer_for(&project, STAGING_ISSUER);

    let outcome = installer.run(DeploymentMode::Production).await.unwrap();

    assert!(!outcome.success());
    let report = outcome.report().unwrap();
    assert_eq!(report.failures().len(), 5);
}

#[cfg(unix)]
#[tokio::test]
async fn test_rerun_preserves_secrets() {
    let project = TestProject::new();
    let installer = installer_for(&project, STAGING_ISSUER);

    installer.run(DeploymentMode::Staging).await.unwrap();
    let first = project.read(".env");
    installer.run(DeploymentMode::Staging).await.unwrap();

    assert_eq!(project.read(".env"), first);
}

#[tokio::test]
async fn test_dns_failure_aborts_before_any_mutation() {
    let project = TestProject::new();
    let mut config = project.config.clone();
    config.dns.expected_ip = Some(public_ip());
    let installer = Installer::new(config).with_resolver(Arc::new(StaticResolver::default()));

    let err = installer.run(DeploymentMode::Staging).await.unwrap_err();

    assert!(matches!(err, InstallerError::Precondition(_)));
    assert!(err.to_string().contains("DNS check failed"));
    assert!(!project.path("traefik").exists());
    assert!(!project.path(".env").exists());
    assert!(!project.path("letsencrypt").exists());
}

#[tokio::test]
async fn test_missing_compose_file_aborts_before_any_mutation() {
    let project = TestProject::new().without_compose_file();
    let installer = installer_for(&project, STAGING_ISSUER);

    let err = installer.run(DeploymentMode::Staging).await.unwrap_err();

    assert!(matches!(err, InstallerError::Precondition(_)));
    assert!(err.to_string().contains("docker-compose.yml"));
    assert!(!project.path("traefik").exists());
    assert!(!project.path(".env").exists());
    assert!(!project.path("letsencrypt").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_compose_failure_is_fatal() {
    let mut project = TestProject::new();
    project.config.compose.binary = PathBuf::from("false");
    project.config.dns.enabled = false;
    let installer = installer_for(&project, STAGING_ISSUER);

    let err = installer.run(DeploymentMode::Staging).await.unwrap_err();

    assert!(matches!(err, InstallerError::Compose(_)));
    assert!(err.is_fatal());
    assert!(!project.path("readiness-report.json").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_update_after_install_skips_configuration() {
    let project = TestProject::new();
    let installer = installer_for(&project, STAGING_ISSUER);
    installer.run(DeploymentMode::Staging).await.unwrap();

    project.write("traefik/traefik.yml", "# edited by hand\n");
    let env_before = project.read(".env");

    let outcome = installer.run(DeploymentMode::Update).await.unwrap();

    assert!(matches!(outcome, RunOutcome::Updated));
    assert!(outcome.success());
    assert_eq!(project.read("traefik/traefik.yml"), "# edited by hand\n");
    assert_eq!(project.read(".env"), env_before);
}

#[tokio::test]
async fn test_update_without_install_is_precondition_error() {
    let project = TestProject::new();
    let installer = Installer::new(project.config.clone());

    let err = installer.run(DeploymentMode::Update).await.unwrap_err();
    assert!(matches!(err, InstallerError::Precondition(_)));
}
