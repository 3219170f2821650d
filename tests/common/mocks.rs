//! Mock services for testing
//!
//! Provides mock implementations of the network seams (HTTPS status probe,
//! TLS issuer probe, DNS resolver) for isolated testing without a live stack.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;

use async_trait::async_trait;
use stack_installer::services::{IssuerProbe, PeerCertificate, Resolver, StatusProbe};
use stack_installer::{InstallerError, InstallerResult};

pub const STAGING_ISSUER: &str = "C=US, O=(STAGING) Let's Encrypt, CN=(STAGING) Fake LE Intermediate X1";
pub const PRODUCTION_ISSUER: &str = "C=US, O=Let's Encrypt, CN=R3";

/// Status probe whose hostnames start answering after a set number of attempts
#[derive(Default)]
pub struct MockStatusProbe {
    ready_after: HashMap<String, u32>,
    fixed_status: HashMap<String, u16>,
    calls: Mutex<HashMap<String, u32>>,
}

impl MockStatusProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// `hostname` refuses connections until attempt `n`, then answers 200
    pub fn ready_after(mut self, hostname: &str, n: u32) -> Self {
        self.ready_after.insert(hostname.to_string(), n);
        self
    }

    /// `hostname` always answers with `status`
    pub fn with_status(mut self, hostname: &str, status: u16) -> Self {
        self.fixed_status.insert(hostname.to_string(), status);
        self
    }

    pub fn calls(&self, hostname: &str) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(hostname)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl StatusProbe for MockStatusProbe {
    async fn status(&self, hostname: &str) -> InstallerResult<u16> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(hostname.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        if let Some(status) = self.fixed_status.get(hostname) {
            return Ok(*status);
        }

        match self.ready_after.get(hostname) {
            Some(n) if attempt >= *n => Ok(200),
            _ => Err(InstallerError::Network("Connection refused".to_string())),
        }
    }
}

/// Issuer probe answering from a fixed table
#[derive(Default)]
pub struct MockIssuerProbe {
    issuers: HashMap<String, String>,
}

impl MockIssuerProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issuer(mut self, hostname: &str, issuer: &str) -> Self {
        self.issuers.insert(hostname.to_string(), issuer.to_string());
        self
    }

    /// Every hostname in `hostnames` serves a certificate from `issuer`
    pub fn all(hostnames: &[String], issuer: &str) -> Self {
        hostnames
            .iter()
            .fold(Self::new(), |probe, h| probe.with_issuer(h, issuer))
    }
}

#[async_trait]
impl IssuerProbe for MockIssuerProbe {
    async fn leaf_certificate(&self, hostname: &str) -> InstallerResult<PeerCertificate> {
        match self.issuers.get(hostname) {
            Some(issuer) => Ok(PeerCertificate {
                issuer: issuer.clone(),
                fingerprint: "ab".repeat(32),
            }),
            None => Err(InstallerError::Tls("Handshake failed: unexpected EOF".to_string())),
        }
    }
}

/// Resolver answering from a fixed table
#[derive(Default)]
pub struct StaticResolver {
    records: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn pointing_at(hostnames: &[String], addr: IpAddr) -> Self {
        Self {
            records: hostnames.iter().map(|h| (h.clone(), vec![addr])).collect(),
        }
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, hostname: &str) -> std::io::Result<Vec<IpAddr>> {
        self.records.get(hostname).cloned().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such host")
        })
    }
}
