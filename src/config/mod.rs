//! Configuration management
//!
//! This module provides YAML-based configuration management with support for:
//! - Environment variable overrides
//! - Multiple configuration file locations
//! - Default values for all settings, so an empty file is a valid configuration
//! - Hostname records derived from a single base domain
//! - Secret file manifests with per-key generators

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::{CertificateClass, HostnameRecord, SecretFileSpec, SecretGenerator, SecretKeySpec};
use crate::utils::validation::{validate_env_key, validate_fqdn, validate_service_name};

/// Main installer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Directory holding the stack's compose file, proxy config and secrets
    #[serde(default = "default_project_dir")]
    pub project_dir: PathBuf,
    /// Base domain used to derive hostnames when none are listed
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Contact address registered with the ACME account
    #[serde(default = "default_acme_email")]
    pub acme_email: String,
    /// Explicit hostname records (derived from `domain` when empty)
    #[serde(default)]
    pub hostnames: Vec<HostnameRecord>,
    #[serde(default)]
    pub acme: AcmeConfig,
    #[serde(default)]
    pub issuer: IssuerConfig,
    #[serde(default)]
    pub readiness: ReadinessConfig,
    #[serde(default = "default_secret_files")]
    pub secrets: Vec<SecretFileSpec>,
    #[serde(default)]
    pub compose: ComposeConfig,
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub dashboard_auth: DashboardAuthConfig,
    /// Treat unrecognized mode flags as staging instead of failing
    #[serde(default)]
    pub lenient_mode_flag: bool,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_project_dir() -> PathBuf {
    PathBuf::from("/opt/stack")
}

fn default_domain() -> String {
    "example.com".to_string()
}

fn default_acme_email() -> String {
    "admin@example.com".to_string()
}

fn default_secret_files() -> Vec<SecretFileSpec> {
    vec![SecretFileSpec {
        path: PathBuf::from(".env"),
        keys: vec![
            SecretKeySpec::new("POSTGRES_PASSWORD", SecretGenerator::Hex32),
            SecretKeySpec::new("JWT_SECRET", SecretGenerator::Base64_48),
            SecretKeySpec::new("SECRET_KEY_BASE", SecretGenerator::Base64_48),
            SecretKeySpec::new("VAULT_ENC_KEY", SecretGenerator::Hex32),
            SecretKeySpec::new("DASHBOARD_PASSWORD", SecretGenerator::Hex32),
            SecretKeySpec::new("N8N_ENCRYPTION_KEY", SecretGenerator::Hex32),
        ],
    }]
}

/// ACME / certificate resolver configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcmeConfig {
    /// Directory endpoint used in staging mode
    #[serde(default = "default_staging_directory")]
    pub staging_directory_url: String,
    /// Name of the proxy's certificate resolver
    #[serde(default = "default_resolver_name")]
    pub resolver_name: String,
    /// Host directory holding the certificate stores (relative to project_dir)
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
    /// Where the store directory is mounted inside the proxy container
    #[serde(default = "default_store_mount")]
    pub store_mount: String,
    /// Path of the proxy's static configuration (relative to project_dir)
    #[serde(default = "default_proxy_config_path")]
    pub proxy_config_path: PathBuf,
    /// Path of the proxy's dynamic routing configuration (relative to project_dir)
    #[serde(default = "default_dynamic_config_path")]
    pub dynamic_config_path: PathBuf,
}

fn default_staging_directory() -> String {
    "https://acme-staging-v02.api.letsencrypt.org/directory".to_string()
}

fn default_resolver_name() -> String {
    "letsencrypt".to_string()
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("letsencrypt")
}

fn default_store_mount() -> String {
    "/letsencrypt".to_string()
}

fn default_proxy_config_path() -> PathBuf {
    PathBuf::from("traefik/traefik.yml")
}

fn default_dynamic_config_path() -> PathBuf {
    PathBuf::from("traefik/dynamic/routes.yml")
}

impl Default for AcmeConfig {
    fn default() -> Self {
        Self {
            staging_directory_url: default_staging_directory(),
            resolver_name: default_resolver_name(),
            store_dir: default_store_dir(),
            store_mount: default_store_mount(),
            proxy_config_path: default_proxy_config_path(),
            dynamic_config_path: default_dynamic_config_path(),
        }
    }
}

/// Issuer signatures used to classify served certificates
///
/// The staging signatures identify the CA's test intermediates and are expected
/// to change whenever the CA renames its staging hierarchy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IssuerConfig {
    #[serde(default = "default_staging_signatures")]
    pub staging_signatures: Vec<String>,
    #[serde(default = "default_production_signatures")]
    pub production_signatures: Vec<String>,
}

fn default_staging_signatures() -> Vec<String> {
    vec!["fake le".to_string(), "(staging)".to_string()]
}

fn default_production_signatures() -> Vec<String> {
    vec!["let's encrypt".to_string()]
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            staging_signatures: default_staging_signatures(),
            production_signatures: default_production_signatures(),
        }
    }
}

/// Readiness polling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadinessConfig {
    /// Maximum polling attempts per hostname
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Pause between attempts, in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Per-request timeout, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Port used for the raw TLS issuer check
    #[serde(default = "default_tls_port")]
    pub tls_port: u16,
    /// HTTP status codes that count as "responding"
    #[serde(default = "default_accepted_statuses")]
    pub accepted_statuses: Vec<u16>,
    /// Hostnames verified at the same time (1 = sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Optional deadline for the whole pass, in seconds
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

fn default_attempts() -> u32 {
    60
}

fn default_interval_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_tls_port() -> u16 {
    443
}

fn default_accepted_statuses() -> Vec<u16> {
    vec![200, 301, 302, 401, 403]
}

fn default_concurrency() -> usize {
    1
}

impl ReadinessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            interval_secs: default_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            tls_port: default_tls_port(),
            accepted_statuses: default_accepted_statuses(),
            concurrency: default_concurrency(),
            deadline_secs: None,
        }
    }
}

/// Container orchestrator CLI configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ComposeConfig {
    /// Orchestrator binary
    #[serde(default = "default_compose_binary")]
    pub binary: PathBuf,
    /// Arguments placed before every subcommand
    #[serde(default = "default_compose_base_args")]
    pub base_args: Vec<String>,
    /// Compose file name (relative to project_dir)
    #[serde(default = "default_compose_file")]
    pub file: PathBuf,
    /// Timeout for a single orchestrator command, in seconds
    #[serde(default = "default_compose_timeout")]
    pub timeout_seconds: u64,
}

fn default_compose_binary() -> PathBuf {
    PathBuf::from("docker")
}

fn default_compose_base_args() -> Vec<String> {
    vec!["compose".to_string()]
}

fn default_compose_file() -> PathBuf {
    PathBuf::from("docker-compose.yml")
}

fn default_compose_timeout() -> u64 {
    900 // 15 minutes, image pulls can be slow
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            binary: default_compose_binary(),
            base_args: default_compose_base_args(),
            file: default_compose_file(),
            timeout_seconds: default_compose_timeout(),
        }
    }
}

/// DNS precondition check configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DnsConfig {
    #[serde(default = "default_dns_enabled")]
    pub enabled: bool,
    /// Public address every hostname must resolve to
    #[serde(default)]
    pub expected_ip: Option<std::net::IpAddr>,
}

fn default_dns_enabled() -> bool {
    true
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            enabled: default_dns_enabled(),
            expected_ip: None,
        }
    }
}

/// Basic auth in front of proxy-internal hostnames (the dashboard)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DashboardAuthConfig {
    #[serde(default = "default_dashboard_username")]
    pub username: String,
    /// Secret key holding the dashboard password
    #[serde(default = "default_dashboard_password_key")]
    pub password_key: String,
    /// Secrets file the key is added to when no manifest entry lists it
    #[serde(default = "default_dashboard_secret_file")]
    pub secret_file: PathBuf,
}

fn default_dashboard_username() -> String {
    "admin".to_string()
}

fn default_dashboard_password_key() -> String {
    "DASHBOARD_PASSWORD".to_string()
}

fn default_dashboard_secret_file() -> PathBuf {
    PathBuf::from(".env")
}

impl Default for DashboardAuthConfig {
    fn default() -> Self {
        Self {
            username: default_dashboard_username(),
            password_key: default_dashboard_password_key(),
            secret_file: default_dashboard_secret_file(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Log output target (console or file)
    #[serde(default = "default_log_target")]
    pub target: LogTarget,
    /// Directory for log files (used when target is "file")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Log file name prefix
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    /// Enable daily log rotation
    #[serde(default = "default_log_rotation")]
    pub daily_rotation: bool,
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Log to console (stderr) - default
    #[default]
    Console,
    /// Log to file with optional rotation
    File,
    /// Log to both console and file
    Both,
}

impl LogTarget {
    pub fn writes_console(&self) -> bool {
        matches!(self, LogTarget::Console | LogTarget::Both)
    }

    pub fn writes_file(&self) -> bool {
        matches!(self, LogTarget::File | LogTarget::Both)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_log_target() -> LogTarget {
    LogTarget::Console
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/stack-installer")
}

fn default_log_prefix() -> String {
    "stack-installer".to_string()
}

fn default_log_rotation() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: default_log_target(),
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            daily_rotation: default_log_rotation(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            project_dir: default_project_dir(),
            domain: default_domain(),
            acme_email: default_acme_email(),
            hostnames: Vec::new(),
            acme: AcmeConfig::default(),
            issuer: IssuerConfig::default(),
            readiness: ReadinessConfig::default(),
            secrets: default_secret_files(),
            compose: ComposeConfig::default(),
            dns: DnsConfig::default(),
            dashboard_auth: DashboardAuthConfig::default(),
            lenient_mode_flag: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values
    /// 2. Configuration file (YAML)
    /// 3. Environment variables (prefixed with INSTALLER_)
    pub fn load() -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("INSTALLER_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = match config_path {
            Some(ref path) if path.exists() => Self::from_file(path)?,
            Some(ref path) => {
                eprintln!("[CONFIG] Config file not found: {:?}, using defaults", path);
                AppConfig::default()
            }
            None => AppConfig::default(),
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration file without applying overrides
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        if contents.trim().is_empty() {
            return Ok(AppConfig::default());
        }
        serde_norway::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            // Current directory
            PathBuf::from("installer.yaml"),
            PathBuf::from("config/installer.yaml"),
            // System config directory
            PathBuf::from("/etc/stack-installer/installer.yaml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("stack-installer/installer.yaml"))
                .unwrap_or_default(),
        ];

        paths.into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("INSTALLER_PROJECT_DIR") {
            self.project_dir = PathBuf::from(dir);
        }
        if let Ok(domain) = std::env::var("INSTALLER_DOMAIN") {
            self.domain = domain;
        }
        if let Ok(email) = std::env::var("INSTALLER_ACME_EMAIL") {
            self.acme_email = email;
        }

        // DNS overrides
        if let Ok(ip) = std::env::var("INSTALLER_EXPECTED_IP") {
            if let Ok(addr) = ip.parse() {
                self.dns.expected_ip = Some(addr);
            }
        }
        if let Ok(skip) = std::env::var("INSTALLER_SKIP_DNS_CHECK") {
            self.dns.enabled = !parse_bool(&skip);
        }

        // Readiness overrides
        if let Ok(attempts) = std::env::var("INSTALLER_POLL_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.readiness.attempts = n;
            }
        }
        if let Ok(interval) = std::env::var("INSTALLER_POLL_INTERVAL_SECS") {
            if let Ok(n) = interval.parse() {
                self.readiness.interval_secs = n;
            }
        }
        if let Ok(concurrency) = std::env::var("INSTALLER_VERIFY_CONCURRENCY") {
            if let Ok(n) = concurrency.parse() {
                self.readiness.concurrency = n;
            }
        }
        if let Ok(signatures) = std::env::var("INSTALLER_STAGING_SIGNATURES") {
            self.issuer.staging_signatures = signatures
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(lenient) = std::env::var("INSTALLER_LENIENT_MODE_FLAG") {
            self.lenient_mode_flag = parse_bool(&lenient);
        }

        // Logging overrides
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("INSTALLER_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            };
        }
        if let Ok(target) = std::env::var("INSTALLER_LOG_TARGET") {
            self.logging.target = match target.to_lowercase().as_str() {
                "file" => LogTarget::File,
                "both" => LogTarget::Both,
                _ => LogTarget::Console,
            };
        }
        if let Ok(dir) = std::env::var("INSTALLER_LOG_DIR") {
            self.logging.log_dir = PathBuf::from(dir);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !validate_fqdn(&self.domain) {
            anyhow::bail!("Invalid domain: {:?}", self.domain);
        }

        if !self.acme_email.contains('@') {
            anyhow::bail!("Invalid ACME email: {:?}", self.acme_email);
        }

        for record in &self.hostnames {
            if !validate_fqdn(&record.fqdn) {
                anyhow::bail!("Invalid hostname: {:?}", record.fqdn);
            }
            if !validate_service_name(&record.service) {
                anyhow::bail!(
                    "Invalid upstream service {:?} for hostname {}",
                    record.service,
                    record.fqdn
                );
            }
        }

        let mut names = std::collections::HashSet::new();
        let mut fqdns = std::collections::HashSet::new();
        for record in self.hostname_records() {
            if !names.insert(record.name.clone()) {
                anyhow::bail!("Duplicate hostname name {:?}", record.name);
            }
            if !fqdns.insert(record.fqdn.to_lowercase()) {
                anyhow::bail!("Duplicate hostname {:?}", record.fqdn);
            }
        }

        let auth = &self.dashboard_auth;
        if auth.username.trim().is_empty() || auth.username.contains(':') {
            anyhow::bail!("Invalid dashboard_auth.username: {:?}", auth.username);
        }
        if !validate_env_key(&auth.password_key) {
            anyhow::bail!("Invalid dashboard_auth.password_key: {:?}", auth.password_key);
        }

        if self.readiness.attempts == 0 {
            anyhow::bail!("readiness.attempts must be at least 1");
        }
        if self.readiness.concurrency == 0 {
            anyhow::bail!("readiness.concurrency must be at least 1");
        }
        if self.readiness.accepted_statuses.is_empty() {
            anyhow::bail!("readiness.accepted_statuses cannot be empty");
        }

        if self.issuer.staging_signatures.iter().all(|s| s.trim().is_empty()) {
            anyhow::bail!("issuer.staging_signatures cannot be empty");
        }
        if self.issuer.production_signatures.iter().all(|s| s.trim().is_empty()) {
            anyhow::bail!("issuer.production_signatures cannot be empty");
        }

        for file in &self.secrets {
            let mut seen = std::collections::HashSet::new();
            for spec in &file.keys {
                if !validate_env_key(&spec.key) {
                    anyhow::bail!("Invalid secret key {:?} in {:?}", spec.key, file.path);
                }
                if !seen.insert(spec.key.as_str()) {
                    anyhow::bail!("Duplicate secret key {:?} in {:?}", spec.key, file.path);
                }
            }
        }

        Ok(())
    }

    /// Hostname records to configure and verify
    pub fn hostname_records(&self) -> Vec<HostnameRecord> {
        if self.hostnames.is_empty() {
            HostnameRecord::defaults_for(&self.domain)
        } else {
            self.hostnames.clone()
        }
    }

    /// Whether any hostname routes to a service inside the proxy
    pub fn has_proxy_internal_hostnames(&self) -> bool {
        self.hostname_records().iter().any(HostnameRecord::is_proxy_internal)
    }

    /// Secret files to reconcile
    ///
    /// When the dashboard is routed, its password key is always part of the
    /// manifest: either some file already lists it, or it is added to
    /// `dashboard_auth.secret_file`.
    pub fn secret_manifest(&self) -> Vec<SecretFileSpec> {
        let mut manifest = self.secrets.clone();
        if !self.has_proxy_internal_hostnames() || self.dashboard_password_file().is_some() {
            return manifest;
        }

        let spec = SecretKeySpec::new(self.dashboard_auth.password_key.clone(), SecretGenerator::Hex32);
        match manifest
            .iter_mut()
            .find(|file| file.path == self.dashboard_auth.secret_file)
        {
            Some(file) => file.keys.push(spec),
            None => manifest.push(SecretFileSpec {
                path: self.dashboard_auth.secret_file.clone(),
                keys: vec![spec],
            }),
        }
        manifest
    }

    /// Project-relative secrets file whose manifest lists the dashboard password key
    fn dashboard_password_file(&self) -> Option<&PathBuf> {
        self.secrets
            .iter()
            .find(|file| file.keys.iter().any(|k| k.key == self.dashboard_auth.password_key))
            .map(|file| &file.path)
    }

    /// Host path of the secrets file holding the dashboard password
    pub fn dashboard_password_path(&self) -> PathBuf {
        let relative = self
            .dashboard_password_file()
            .unwrap_or(&self.dashboard_auth.secret_file);
        self.project_dir.join(relative)
    }

    /// Host path of the certificate store for a class
    pub fn store_path(&self, class: CertificateClass) -> PathBuf {
        self.project_dir
            .join(&self.acme.store_dir)
            .join(format!("acme-{}.json", class.store_name()))
    }

    /// In-container path of the certificate store for a class
    pub fn store_mount_path(&self, class: CertificateClass) -> String {
        format!(
            "{}/acme-{}.json",
            self.acme.store_mount.trim_end_matches('/'),
            class.store_name()
        )
    }

    pub fn proxy_config_path(&self) -> PathBuf {
        self.project_dir.join(&self.acme.proxy_config_path)
    }

    pub fn dynamic_config_path(&self) -> PathBuf {
        self.project_dir.join(&self.acme.dynamic_config_path)
    }

    pub fn compose_file_path(&self) -> PathBuf {
        self.project_dir.join(&self.compose.file)
    }

    pub fn report_path(&self) -> PathBuf {
        self.project_dir.join("readiness-report.json")
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
