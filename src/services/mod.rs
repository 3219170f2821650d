//! Reconciliation, verification and orchestration services

pub mod cert_store;
pub mod compose;
pub mod dns;
pub mod installer;
pub mod probe;
pub mod proxy_config;
pub mod readiness;
pub mod secrets;

pub use cert_store::{ensure_certificate_store, EnsureOutcome};
pub use compose::{ComposeDriver, ComposeOutput};
pub use dns::{check_dns, Resolver, SystemResolver};
pub use installer::{reconcile, Installer, ReconcileSummary, RunOutcome};
pub use probe::{
    HttpsStatusProbe, IssuerProbe, PeerCertificate, StatusProbe, TlsIssuerProbe,
};
pub use proxy_config::{
    htpasswd_sha1, render_dynamic_config, render_proxy_config, write_derived_config,
    ProxySettings,
};
pub use readiness::{IssuerClassifier, ProbeState, ReadinessVerifier};
pub use secrets::{
    generate_secret, merge_secret_content, read_secret_value, reconcile_secret_set, MergedSecrets,
};
