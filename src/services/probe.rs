//! Network probes used by the readiness verifier
//!
//! Two seams: an HTTPS status probe (relaxed verification, redirects not
//! followed so 301/302 are observable) and a raw TLS probe that reads the
//! leaf certificate the server presents for a given SNI name.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{aws_lc_rs::default_provider, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use sha2::{Digest, Sha256};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::config::ReadinessConfig;
use crate::utils::{InstallerError, InstallerResult};

/// Returns the HTTP status code served for a hostname
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn status(&self, hostname: &str) -> InstallerResult<u16>;
}

/// Leaf certificate details served for a hostname
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCertificate {
    /// Issuer distinguished name, e.g. `C=US, O=Let's Encrypt, CN=R3`
    pub issuer: String,
    /// SHA-256 of the DER encoding, hex
    pub fingerprint: String,
}

/// Reads the leaf certificate a hostname serves
#[async_trait]
pub trait IssuerProbe: Send + Sync {
    async fn leaf_certificate(&self, hostname: &str) -> InstallerResult<PeerCertificate>;
}

/// HTTPS GET probe built on reqwest
#[derive(Clone)]
pub struct HttpsStatusProbe {
    client: Client,
    scheme: String,
    port: Option<u16>,
}

impl HttpsStatusProbe {
    /// Create a probe that accepts self-signed and staging certificates
    pub fn new(config: &ReadinessConfig) -> InstallerResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| InstallerError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            scheme: "https".to_string(),
            port: None,
        })
    }

    /// Probe a different scheme/port than `https` on 443
    pub fn with_endpoint(mut self, scheme: impl Into<String>, port: Option<u16>) -> Self {
        self.scheme = scheme.into();
        self.port = port;
        self
    }

    fn url_for(&self, hostname: &str) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}/", self.scheme, hostname, port),
            None => format!("{}://{}/", self.scheme, hostname),
        }
    }
}

#[async_trait]
impl StatusProbe for HttpsStatusProbe {
    async fn status(&self, hostname: &str) -> InstallerResult<u16> {
        let url = self.url_for(hostname);
        let response = self.client.get(&url).send().await?;
        Ok(response.status().as_u16())
    }
}

/// Certificate verifier that accepts any chain but still checks handshake signatures
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Raw TLS probe: connects with SNI and reads the peer's leaf certificate
#[derive(Clone)]
pub struct TlsIssuerProbe {
    connector: TlsConnector,
    port: u16,
    timeout: Duration,
}

impl TlsIssuerProbe {
    pub fn new(config: &ReadinessConfig) -> InstallerResult<Self> {
        let provider = Arc::new(default_provider());

        let tls_config = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| InstallerError::Tls(format!("Failed to set TLS protocol versions: {}", e)))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(tls_config)),
            port: config.tls_port,
            timeout: config.request_timeout(),
        })
    }
}

#[async_trait]
impl IssuerProbe for TlsIssuerProbe {
    async fn leaf_certificate(&self, hostname: &str) -> InstallerResult<PeerCertificate> {
        let server_name = ServerName::try_from(hostname.to_string())
            .map_err(|e| InstallerError::Tls(format!("Invalid server name {}: {}", hostname, e)))?;

        let handshake = async {
            let tcp = TcpStream::connect((hostname, self.port))
                .await
                .map_err(|e| InstallerError::Tls(format!("Connection failed: {}", e)))?;
            let stream = self
                .connector
                .connect(server_name, tcp)
                .await
                .map_err(|e| InstallerError::Tls(format!("Handshake failed: {}", e)))?;

            let (_, connection) = stream.get_ref();
            let leaf = connection
                .peer_certificates()
                .and_then(|chain| chain.first())
                .ok_or_else(|| InstallerError::Tls("Server presented no certificate".to_string()))?;

            Ok::<_, InstallerError>(leaf.as_ref().to_vec())
        };

        let der = timeout(self.timeout, handshake)
            .await
            .map_err(|_| InstallerError::Tls(format!("TLS handshake with {} timed out", hostname)))??;

        debug!(hostname, bytes = der.len(), "Read peer certificate");
        parse_leaf_certificate(&der)
    }
}

/// Extract issuer and fingerprint from a DER-encoded certificate
pub fn parse_leaf_certificate(der: &[u8]) -> InstallerResult<PeerCertificate> {
    let (_, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| InstallerError::Tls(format!("Failed to parse X.509 certificate: {}", e)))?;

    Ok(PeerCertificate {
        issuer: cert.issuer().to_string(),
        fingerprint: hex::encode(Sha256::digest(der)),
    })
}
