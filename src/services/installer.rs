//! Installer run orchestration
//!
//! Install modes: compose-file and DNS preconditions, reconcile on-disk
//! state, cycle the stack, then run a readiness pass expecting the mode's
//! certificate class. Update mode only re-applies the existing stack.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::models::{DeploymentMode, ReadinessReport, SecretReconcileOutcome};
use crate::services::cert_store::{ensure_certificate_store, EnsureOutcome};
use crate::services::compose::ComposeDriver;
use crate::services::dns::{check_dns, Resolver, SystemResolver};
use crate::services::proxy_config::{
    htpasswd_sha1, render_dynamic_config, render_proxy_config, write_derived_config,
    ProxySettings,
};
use crate::services::readiness::ReadinessVerifier;
use crate::services::secrets::{read_secret_value, reconcile_secret_set};
use crate::utils::fs::{write_atomic, WriteOutcome};
use crate::utils::{InstallerError, InstallerResult};

/// What reconciliation did on disk
#[derive(Debug, Clone)]
pub struct ReconcileSummary {
    pub mode: DeploymentMode,
    pub store_path: PathBuf,
    pub store: EnsureOutcome,
    pub proxy_config: WriteOutcome,
    pub dynamic_config: WriteOutcome,
    pub secrets: Vec<(PathBuf, SecretReconcileOutcome)>,
}

/// Bring the project directory in line with `mode`
///
/// Only the mode's own certificate store is ensured; the other class's store
/// is never created or touched. Secrets are reconciled before the dynamic
/// config, which reads the dashboard password from them. Any filesystem
/// error aborts the run.
pub fn reconcile(config: &AppConfig, mode: DeploymentMode) -> InstallerResult<ReconcileSummary> {
    let class = mode.certificate_class().ok_or_else(|| {
        InstallerError::Precondition(format!("{} mode does not generate configuration", mode))
    })?;

    let (store_path, store) = ensure_certificate_store(config, class)?;

    let records = config.hostname_records();
    let settings = ProxySettings::for_mode(config, mode, &records);
    let proxy_config = write_derived_config(&config.proxy_config_path(), &render_proxy_config(&settings)?)?;

    let manifest = config.secret_manifest();
    let mut secrets = Vec::with_capacity(manifest.len());
    for file in &manifest {
        let path = config.project_dir.join(&file.path);
        let outcome = reconcile_secret_set(&path, &file.keys)?;
        secrets.push((path, outcome));
    }

    let dynamic_config = write_derived_config(
        &config.dynamic_config_path(),
        &render_dynamic_config(&records, &config.acme.resolver_name, &dashboard_users(config)?)?,
    )?;

    info!(
        %mode,
        store = ?store,
        proxy_config = ?proxy_config,
        dynamic_config = ?dynamic_config,
        secret_files = secrets.len(),
        "Reconciliation complete"
    );

    Ok(ReconcileSummary {
        mode,
        store_path,
        store,
        proxy_config,
        dynamic_config,
        secrets,
    })
}

/// Basic auth entries for proxy-internal routers, read from the reconciled secrets
fn dashboard_users(config: &AppConfig) -> InstallerResult<Vec<String>> {
    if !config.has_proxy_internal_hostnames() {
        return Ok(Vec::new());
    }

    let auth = &config.dashboard_auth;
    let path = config.dashboard_password_path();
    let password = read_secret_value(&path, &auth.password_key)?.ok_or_else(|| {
        InstallerError::Config(format!(
            "Dashboard password {} missing from {:?}",
            auth.password_key, path
        ))
    })?;

    Ok(vec![htpasswd_sha1(&auth.username, &password)])
}

/// Result of a whole installer run
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Update mode re-applied the stack; nothing to verify
    Updated,
    /// An install mode finished its readiness pass
    Verified(ReadinessReport),
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        match self {
            RunOutcome::Updated => true,
            RunOutcome::Verified(report) => report.passed(),
        }
    }

    pub fn report(&self) -> Option<&ReadinessReport> {
        match self {
            RunOutcome::Updated => None,
            RunOutcome::Verified(report) => Some(report),
        }
    }
}

/// Drives one installer run against a project directory
pub struct Installer {
    config: AppConfig,
    resolver: Arc<dyn Resolver>,
    compose: ComposeDriver,
    verifier: Option<ReadinessVerifier>,
}

impl Installer {
    pub fn new(config: AppConfig) -> Self {
        let compose = ComposeDriver::new(&config);
        Self {
            config,
            resolver: Arc::new(SystemResolver),
            compose,
            verifier: None,
        }
    }

    /// Use a different resolver for the DNS precondition
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Use a prepared verifier instead of the real network probes
    pub fn with_verifier(mut self, verifier: ReadinessVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn run(&self, mode: DeploymentMode) -> InstallerResult<RunOutcome> {
        info!(%mode, project_dir = ?self.config.project_dir, "Starting installer run");

        let class = match mode.certificate_class() {
            Some(class) => class,
            None => return self.update().await,
        };

        self.check_compose_file()?;

        let records = self.config.hostname_records();
        if self.config.dns.enabled {
            check_dns(self.resolver.as_ref(), &records, self.config.dns.expected_ip).await?;
        } else {
            warn!("DNS precondition check disabled");
        }

        reconcile(&self.config, mode)?;

        self.compose.down().await?;
        self.compose.pull().await?;
        self.compose.up().await?;

        let hostnames: Vec<String> = records.into_iter().map(|r| r.fqdn).collect();
        let report = match &self.verifier {
            Some(verifier) => verifier.verify(&hostnames, class).await,
            None => ReadinessVerifier::new(&self.config)?.verify(&hostnames, class).await,
        };

        self.write_report(&report)?;
        Ok(RunOutcome::Verified(report))
    }

    /// Re-apply the existing stack without touching configuration
    async fn update(&self) -> InstallerResult<RunOutcome> {
        self.check_update_preconditions()?;
        self.compose.pull().await?;
        self.compose.up().await?;
        info!("Update complete");
        Ok(RunOutcome::Updated)
    }

    fn check_update_preconditions(&self) -> InstallerResult<()> {
        if !self.config.project_dir.is_dir() {
            return Err(InstallerError::Precondition(format!(
                "Project directory {:?} not found; run an install first",
                self.config.project_dir
            )));
        }

        let proxy_config = self.config.proxy_config_path();
        if !proxy_config.is_file() {
            return Err(InstallerError::Precondition(format!(
                "Proxy configuration {:?} not found; run an install first",
                proxy_config
            )));
        }

        self.check_compose_file()
    }

    /// The compose file is operator-supplied; nothing is mutated without it
    fn check_compose_file(&self) -> InstallerResult<()> {
        let compose_file = self.config.compose_file_path();
        if !compose_file.is_file() {
            return Err(InstallerError::Precondition(format!(
                "Compose file {:?} not found; place the stack's compose file in the project directory",
                compose_file
            )));
        }
        Ok(())
    }

    fn write_report(&self, report: &ReadinessReport) -> InstallerResult<PathBuf> {
        let path = self.config.report_path();
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| InstallerError::Config(format!("Failed to serialize readiness report: {}", e)))?;
        write_atomic(&path, json.as_bytes(), None)?;
        info!(path = ?path, "Wrote readiness report");
        Ok(path)
    }
}
