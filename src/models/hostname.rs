//! Externally reachable hostnames

use serde::{Deserialize, Serialize};

/// One externally reachable service behind the proxy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostnameRecord {
    /// Short label used for router names (e.g. "workflow")
    pub name: String,
    /// Fully-qualified domain name
    pub fqdn: String,
    /// Upstream compose service, or a proxy-internal service such as `api@internal`
    pub service: String,
    /// Backend port on the upstream service
    pub port: u16,
}

impl HostnameRecord {
    pub fn new(
        name: impl Into<String>,
        fqdn: impl Into<String>,
        service: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            fqdn: fqdn.into(),
            service: service.into(),
            port,
        }
    }

    /// Services handled inside the proxy itself have no backend URL
    pub fn is_proxy_internal(&self) -> bool {
        self.service.ends_with("@internal")
    }

    /// Backend URL the proxy forwards to
    pub fn upstream_url(&self) -> Option<String> {
        if self.is_proxy_internal() {
            None
        } else {
            Some(format!("http://{}:{}", self.service, self.port))
        }
    }

    /// The standard five hostnames of the stack for a base domain
    pub fn defaults_for(domain: &str) -> Vec<HostnameRecord> {
        vec![
            HostnameRecord::new("dashboard", format!("traefik.{}", domain), "api@internal", 8080),
            HostnameRecord::new("site", domain, "site", 80),
            HostnameRecord::new("workflow", format!("n8n.{}", domain), "n8n", 5678),
            HostnameRecord::new("api", format!("api.{}", domain), "kong", 8000),
            HostnameRecord::new("studio", format!("studio.{}", domain), "studio", 3000),
        ]
    }
}
