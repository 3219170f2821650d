//! Readiness verification
//!
//! Each hostname runs its own state machine:
//!
//! ```text
//! Pending -> Polling -(accepted status)-> Responding -> VerifyingIssuer -> Done(verdict)
//!               |
//!               +-(attempt budget exhausted)-> Done(HttpTimeout)
//! ```
//!
//! Network errors while polling count as "not responding yet". TLS and issuer
//! read errors end that hostname with `CertUnreadable` but never stop the pass:
//! every hostname is verified so the operator gets a full report.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{AppConfig, IssuerConfig, ReadinessConfig};
use crate::models::{CertificateClass, HostnameOutcome, ReadinessReport, Verdict};
use crate::services::probe::{HttpsStatusProbe, IssuerProbe, StatusProbe, TlsIssuerProbe};
use crate::utils::InstallerResult;

/// Classifies issuer distinguished names as staging or production
#[derive(Debug, Clone)]
pub struct IssuerClassifier {
    staging_signatures: Vec<String>,
    production_signatures: Vec<String>,
}

impl IssuerClassifier {
    pub fn new(config: &IssuerConfig) -> Self {
        let normalize = |signatures: &[String]| {
            signatures
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };

        Self {
            staging_signatures: normalize(&config.staging_signatures),
            production_signatures: normalize(&config.production_signatures),
        }
    }

    /// Issuer carries one of the staging signatures
    pub fn is_staging(&self, issuer: &str) -> bool {
        let issuer = issuer.to_lowercase();
        self.staging_signatures.iter().any(|s| issuer.contains(s))
    }

    /// Issuer identifies the real CA and is not a staging intermediate
    pub fn is_production(&self, issuer: &str) -> bool {
        let lowered = issuer.to_lowercase();
        !self.is_staging(issuer) && self.production_signatures.iter().any(|s| lowered.contains(s))
    }

    /// Verdict for an issuer string against the expected class
    pub fn classify(&self, issuer: Option<&str>, expected: CertificateClass) -> Verdict {
        let issuer = match issuer.map(str::trim) {
            Some(issuer) if !issuer.is_empty() => issuer,
            _ => return Verdict::CertUnreadable,
        };

        let matches = match expected {
            CertificateClass::Staging => self.is_staging(issuer),
            CertificateClass::Production => self.is_production(issuer),
        };

        if matches {
            Verdict::IssuerMatch
        } else {
            Verdict::IssuerMismatch
        }
    }
}

/// Per-hostname verification state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Pending,
    Polling { attempt: u32 },
    Responding { status: u16 },
    VerifyingIssuer,
    Done(Verdict),
}

/// Polls hostnames over HTTPS and checks the issuer of the certificate they serve
pub struct ReadinessVerifier {
    status_probe: Arc<dyn StatusProbe>,
    issuer_probe: Arc<dyn IssuerProbe>,
    classifier: IssuerClassifier,
    attempts: u32,
    interval: Duration,
    accepted_statuses: Vec<u16>,
    concurrency: usize,
    deadline: Option<Duration>,
}

impl ReadinessVerifier {
    /// Verifier backed by the real HTTPS and TLS probes
    pub fn new(config: &AppConfig) -> InstallerResult<Self> {
        let status_probe = Arc::new(HttpsStatusProbe::new(&config.readiness)?);
        let issuer_probe = Arc::new(TlsIssuerProbe::new(&config.readiness)?);
        Ok(Self::with_probes(
            &config.readiness,
            &config.issuer,
            status_probe,
            issuer_probe,
        ))
    }

    pub fn with_probes(
        readiness: &ReadinessConfig,
        issuer: &IssuerConfig,
        status_probe: Arc<dyn StatusProbe>,
        issuer_probe: Arc<dyn IssuerProbe>,
    ) -> Self {
        Self {
            status_probe,
            issuer_probe,
            classifier: IssuerClassifier::new(issuer),
            attempts: readiness.attempts.max(1),
            interval: readiness.interval(),
            accepted_statuses: readiness.accepted_statuses.clone(),
            concurrency: readiness.concurrency.max(1),
            deadline: readiness.deadline(),
        }
    }

    /// Override the pause between polling attempts
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one hostname's state machine to a terminal verdict
    pub async fn verify_hostname(&self, hostname: &str, expected: CertificateClass) -> HostnameOutcome {
        let mut outcome = HostnameOutcome::pending(hostname);
        let mut state = ProbeState::Pending;

        loop {
            state = match state {
                ProbeState::Pending => ProbeState::Polling { attempt: 1 },

                ProbeState::Polling { attempt } => {
                    outcome.attempts = attempt;
                    match self.status_probe.status(hostname).await {
                        Ok(status) => {
                            outcome.last_status = Some(status);
                            if self.accepted_statuses.contains(&status) {
                                ProbeState::Responding { status }
                            } else {
                                debug!(hostname, attempt, status, "Not ready yet");
                                self.next_poll(attempt).await
                            }
                        }
                        Err(e) => {
                            debug!(hostname, attempt, error = %e, "Not responding yet");
                            outcome.detail = Some(e.to_string());
                            self.next_poll(attempt).await
                        }
                    }
                }

                ProbeState::Responding { status } => {
                    info!(hostname, status, attempts = outcome.attempts, "Hostname is responding");
                    outcome.verdict = Verdict::HttpOk;
                    outcome.detail = None;
                    ProbeState::VerifyingIssuer
                }

                ProbeState::VerifyingIssuer => {
                    let verdict = match self.issuer_probe.leaf_certificate(hostname).await {
                        Ok(cert) => {
                            let verdict = self.classifier.classify(Some(&cert.issuer), expected);
                            if verdict == Verdict::IssuerMismatch {
                                outcome.detail = Some(format!(
                                    "expected a {} certificate",
                                    expected
                                ));
                            }
                            outcome.issuer = Some(cert.issuer).filter(|i| !i.is_empty());
                            outcome.fingerprint = Some(cert.fingerprint);
                            verdict
                        }
                        Err(e) => {
                            outcome.detail = Some(e.to_string());
                            Verdict::CertUnreadable
                        }
                    };
                    ProbeState::Done(verdict)
                }

                ProbeState::Done(verdict) => {
                    outcome.verdict = verdict;
                    break;
                }
            };
        }

        if outcome.verdict.is_success() {
            info!(hostname, verdict = %outcome.verdict, issuer = ?outcome.issuer, "Hostname verified");
        } else {
            warn!(
                hostname,
                verdict = %outcome.verdict,
                issuer = ?outcome.issuer,
                detail = ?outcome.detail,
                "Hostname failed verification"
            );
        }

        outcome
    }

    /// Either the next polling attempt (after the interval) or a timeout verdict
    async fn next_poll(&self, attempt: u32) -> ProbeState {
        if attempt >= self.attempts {
            return ProbeState::Done(Verdict::HttpTimeout);
        }
        if !self.interval.is_zero() {
            sleep(self.interval).await;
        }
        ProbeState::Polling {
            attempt: attempt + 1,
        }
    }

    /// Verify every hostname and build the pass report
    ///
    /// Hostnames are checked `concurrency` at a time; results keep the input
    /// order. With a deadline configured, hostnames still unfinished when it
    /// passes are reported as `HttpTimeout`.
    pub async fn verify(&self, hostnames: &[String], expected: CertificateClass) -> ReadinessReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let deadline = self.deadline.map(|d| Instant::now() + d);

        info!(
            %run_id,
            hostnames = hostnames.len(),
            expected = %expected,
            concurrency = self.concurrency,
            "Starting readiness pass"
        );

        let mut indexed: Vec<(usize, HostnameOutcome)> = stream::iter(hostnames.iter().enumerate())
            .map(|(idx, hostname)| async move {
                let check = self.verify_hostname(hostname, expected);
                let outcome = match deadline {
                    Some(at) => match timeout_at(at, check).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            warn!(hostname = %hostname, "Readiness deadline reached");
                            HostnameOutcome {
                                verdict: Verdict::HttpTimeout,
                                detail: Some("readiness deadline reached".to_string()),
                                ..HostnameOutcome::pending(hostname.as_str())
                            }
                        }
                    },
                    None => check.await,
                };
                (idx, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        indexed.sort_by_key(|(idx, _)| *idx);

        let report = ReadinessReport {
            run_id,
            expected_class: expected,
            started_at,
            finished_at: Utc::now(),
            outcomes: indexed.into_iter().map(|(_, outcome)| outcome).collect(),
        };

        info!(%run_id, passed = report.passed(), failures = report.failures().len(), "Readiness pass finished");
        report
    }
}
