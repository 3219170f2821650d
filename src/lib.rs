//! Stack Installer Library
//!
//! Reconciles the on-disk configuration of a self-hosted container stack
//! (reverse proxy with automatic TLS, per-mode certificate stores, secret
//! env files) and verifies that every hostname serves a certificate from the
//! expected class of authority.

pub mod cli;
pub mod config;
pub mod logging;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use models::{CertificateClass, DeploymentMode, ReadinessReport, Verdict};
pub use services::{Installer, RunOutcome};
pub use utils::{InstallerError, InstallerResult};
