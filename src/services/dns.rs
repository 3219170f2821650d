//! DNS precondition check
//!
//! Before anything is written, every hostname must resolve, and when an
//! expected public address is configured, resolve to it. ACME HTTP challenges
//! cannot succeed otherwise.

use std::net::IpAddr;

use async_trait::async_trait;
use tokio::net::lookup_host;
use tracing::{debug, info, warn};

use crate::models::HostnameRecord;
use crate::utils::{InstallerError, InstallerResult};

/// Resolves hostnames to addresses
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, hostname: &str) -> std::io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the system resolver
#[derive(Debug, Clone, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, hostname: &str) -> std::io::Result<Vec<IpAddr>> {
        let addrs = lookup_host((hostname, 443)).await?;
        Ok(addrs.map(|a| a.ip()).collect())
    }
}

/// Fail with a precondition error naming every hostname that does not point here
pub async fn check_dns(
    resolver: &dyn Resolver,
    hostnames: &[HostnameRecord],
    expected_ip: Option<IpAddr>,
) -> InstallerResult<()> {
    let mut problems = Vec::new();

    for record in hostnames {
        match resolver.resolve(&record.fqdn).await {
            Ok(addrs) if addrs.is_empty() => {
                problems.push(format!("{} has no address records", record.fqdn));
            }
            Ok(addrs) => match expected_ip {
                Some(expected) if !addrs.contains(&expected) => {
                    let found: Vec<String> = addrs.iter().map(|a| a.to_string()).collect();
                    problems.push(format!(
                        "{} resolves to {} instead of {}",
                        record.fqdn,
                        found.join(", "),
                        expected
                    ));
                }
                _ => debug!(hostname = %record.fqdn, addrs = ?addrs, "DNS record ok"),
            },
            Err(e) => problems.push(format!("{} does not resolve: {}", record.fqdn, e)),
        }
    }

    if problems.is_empty() {
        info!(hostnames = hostnames.len(), "DNS precondition satisfied");
        Ok(())
    } else {
        for problem in &problems {
            warn!("{}", problem);
        }
        Err(InstallerError::Precondition(format!(
            "DNS check failed: {}",
            problems.join("; ")
        )))
    }
}
