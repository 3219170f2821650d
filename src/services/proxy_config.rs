//! Reverse-proxy configuration rendering
//!
//! Both renderers are pure: the same settings always produce byte-identical
//! YAML, so the files they feed can be overwritten on every install run.

use std::collections::BTreeMap;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Serialize;
use sha1::{Digest, Sha1};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::models::{CertificateClass, DeploymentMode, HostnameRecord};
use crate::utils::fs::{write_if_changed, WriteOutcome};
use crate::utils::{InstallerError, InstallerResult};

const WEB_ENTRYPOINT: &str = "web";
const WEBSECURE_ENTRYPOINT: &str = "websecure";
const DYNAMIC_CONFIG_DIR: &str = "/etc/traefik/dynamic";
const DASHBOARD_AUTH_MIDDLEWARE: &str = "dashboard-auth";

/// Typed inputs for the static proxy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub acme_email: String,
    pub resolver_name: String,
    /// In-container path of the mode's certificate store
    pub storage: String,
    /// Staging directory endpoint, set only in staging mode
    pub ca_server: Option<String>,
    /// Primary domain and additional names requested on the TLS entry point
    pub main_domain: String,
    pub sans: Vec<String>,
}

impl ProxySettings {
    /// Settings for `mode`; anything but Staging uses the production store and directory
    pub fn for_mode(config: &AppConfig, mode: DeploymentMode, domains: &[HostnameRecord]) -> Self {
        let class = match mode {
            DeploymentMode::Staging => CertificateClass::Staging,
            _ => CertificateClass::Production,
        };

        let sans = domains
            .iter()
            .map(|r| r.fqdn.clone())
            .filter(|fqdn| fqdn != &config.domain)
            .collect();

        Self {
            acme_email: config.acme_email.clone(),
            resolver_name: config.acme.resolver_name.clone(),
            storage: config.store_mount_path(class),
            ca_server: (class == CertificateClass::Staging)
                .then(|| config.acme.staging_directory_url.clone()),
            main_domain: config.domain.clone(),
            sans,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StaticConfig {
    global: GlobalSection,
    log: LogSection,
    api: ApiSection,
    entry_points: BTreeMap<String, EntryPoint>,
    providers: Providers,
    certificates_resolvers: BTreeMap<String, CertificatesResolver>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GlobalSection {
    check_new_version: bool,
    send_anonymous_usage: bool,
}

#[derive(Serialize)]
struct LogSection {
    level: String,
}

#[derive(Serialize)]
struct ApiSection {
    dashboard: bool,
}

#[derive(Serialize)]
struct EntryPoint {
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    http: Option<EntryPointHttp>,
}

#[derive(Serialize)]
struct EntryPointHttp {
    #[serde(skip_serializing_if = "Option::is_none")]
    redirections: Option<Redirections>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tls: Option<EntryPointTls>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Redirections {
    entry_point: RedirectTarget,
}

#[derive(Serialize)]
struct RedirectTarget {
    to: String,
    scheme: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EntryPointTls {
    cert_resolver: String,
    domains: Vec<TlsDomain>,
}

#[derive(Serialize)]
struct TlsDomain {
    main: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sans: Vec<String>,
}

#[derive(Serialize)]
struct Providers {
    docker: DockerProvider,
    file: FileProvider,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DockerProvider {
    exposed_by_default: bool,
}

#[derive(Serialize)]
struct FileProvider {
    directory: String,
    watch: bool,
}

#[derive(Serialize)]
struct CertificatesResolver {
    acme: AcmeResolver,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AcmeResolver {
    email: String,
    storage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ca_server: Option<String>,
    http_challenge: HttpChallenge,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HttpChallenge {
    entry_point: String,
}

/// Render the proxy's static configuration
pub fn render_proxy_config(settings: &ProxySettings) -> InstallerResult<String> {
    let mut entry_points = BTreeMap::new();
    entry_points.insert(
        WEB_ENTRYPOINT.to_string(),
        EntryPoint {
            address: ":80".to_string(),
            http: Some(EntryPointHttp {
                redirections: Some(Redirections {
                    entry_point: RedirectTarget {
                        to: WEBSECURE_ENTRYPOINT.to_string(),
                        scheme: "https".to_string(),
                    },
                }),
                tls: None,
            }),
        },
    );
    entry_points.insert(
        WEBSECURE_ENTRYPOINT.to_string(),
        EntryPoint {
            address: ":443".to_string(),
            http: Some(EntryPointHttp {
                redirections: None,
                tls: Some(EntryPointTls {
                    cert_resolver: settings.resolver_name.clone(),
                    domains: vec![TlsDomain {
                        main: settings.main_domain.clone(),
                        sans: settings.sans.clone(),
                    }],
                }),
            }),
        },
    );

    let mut resolvers = BTreeMap::new();
    resolvers.insert(
        settings.resolver_name.clone(),
        CertificatesResolver {
            acme: AcmeResolver {
                email: settings.acme_email.clone(),
                storage: settings.storage.clone(),
                ca_server: settings.ca_server.clone(),
                http_challenge: HttpChallenge {
                    entry_point: WEB_ENTRYPOINT.to_string(),
                },
            },
        },
    );

    let config = StaticConfig {
        global: GlobalSection {
            check_new_version: false,
            send_anonymous_usage: false,
        },
        log: LogSection {
            level: "INFO".to_string(),
        },
        api: ApiSection { dashboard: true },
        entry_points,
        providers: Providers {
            docker: DockerProvider {
                exposed_by_default: false,
            },
            file: FileProvider {
                directory: DYNAMIC_CONFIG_DIR.to_string(),
                watch: true,
            },
        },
        certificates_resolvers: resolvers,
    };

    Ok(serde_norway::to_string(&config)?)
}

#[derive(Serialize)]
struct DynamicConfig {
    http: DynamicHttp,
}

#[derive(Serialize)]
struct DynamicHttp {
    routers: BTreeMap<String, Router>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    services: BTreeMap<String, Service>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    middlewares: BTreeMap<String, Middleware>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Router {
    rule: String,
    entry_points: Vec<String>,
    service: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    middlewares: Vec<String>,
    tls: RouterTls,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Middleware {
    basic_auth: BasicAuth,
}

#[derive(Serialize)]
struct BasicAuth {
    users: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RouterTls {
    cert_resolver: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Service {
    load_balancer: LoadBalancer,
}

#[derive(Serialize)]
struct LoadBalancer {
    servers: Vec<Server>,
}

#[derive(Serialize)]
struct Server {
    url: String,
}

/// `user:{SHA}<base64 sha1>` entry accepted by the proxy's basic auth middleware
pub fn htpasswd_sha1(user: &str, password: &str) -> String {
    format!("{}:{{SHA}}{}", user, BASE64.encode(Sha1::digest(password.as_bytes())))
}

/// Render file-provider routing: one TLS router per hostname, one service per upstream
///
/// Proxy-internal routers (the dashboard) always sit behind basic auth with
/// `dashboard_users`; rendering them without credentials is an error.
pub fn render_dynamic_config(
    hostnames: &[HostnameRecord],
    resolver_name: &str,
    dashboard_users: &[String],
) -> InstallerResult<String> {
    let mut routers: BTreeMap<String, Router> = BTreeMap::new();
    let mut services = BTreeMap::new();
    let mut middlewares = BTreeMap::new();

    for record in hostnames {
        if routers.contains_key(&record.name) {
            return Err(InstallerError::Config(format!(
                "Duplicate hostname record name {:?}",
                record.name
            )));
        }

        let mut router_middlewares = Vec::new();
        let service = match record.upstream_url() {
            Some(url) => {
                services.insert(
                    record.name.clone(),
                    Service {
                        load_balancer: LoadBalancer {
                            servers: vec![Server { url }],
                        },
                    },
                );
                record.name.clone()
            }
            None => {
                if dashboard_users.is_empty() {
                    return Err(InstallerError::Config(format!(
                        "No dashboard credentials for proxy-internal hostname {}",
                        record.fqdn
                    )));
                }
                middlewares.insert(
                    DASHBOARD_AUTH_MIDDLEWARE.to_string(),
                    Middleware {
                        basic_auth: BasicAuth {
                            users: dashboard_users.to_vec(),
                        },
                    },
                );
                router_middlewares.push(DASHBOARD_AUTH_MIDDLEWARE.to_string());
                record.service.clone()
            }
        };

        routers.insert(
            record.name.clone(),
            Router {
                rule: format!("Host(`{}`)", record.fqdn),
                entry_points: vec![WEBSECURE_ENTRYPOINT.to_string()],
                service,
                middlewares: router_middlewares,
                tls: RouterTls {
                    cert_resolver: resolver_name.to_string(),
                },
            },
        );
    }

    let config = DynamicConfig {
        http: DynamicHttp {
            routers,
            services,
            middlewares,
        },
    };

    Ok(serde_norway::to_string(&config)?)
}

/// Write rendered proxy config, replacing whatever is on disk
pub fn write_derived_config(path: &Path, contents: &str) -> InstallerResult<WriteOutcome> {
    let outcome = write_if_changed(path, contents)?;
    match outcome {
        WriteOutcome::Unchanged => debug!(path = ?path, "Proxy config unchanged"),
        _ => info!(path = ?path, outcome = ?outcome, "Wrote proxy config"),
    }
    Ok(outcome)
}
