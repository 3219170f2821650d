//! Readiness verdicts and the per-pass report

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CertificateClass;

/// Per-hostname result of a readiness pass
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Pass has not reached this hostname yet
    Pending,
    /// HTTPS answered with an accepted status, issuer not checked yet
    HttpOk,
    /// No accepted status within the attempt budget
    HttpTimeout,
    /// Served certificate comes from the expected authority class
    IssuerMatch,
    /// Served certificate comes from the other authority class
    IssuerMismatch,
    /// TLS handshake or certificate parsing failed
    CertUnreadable,
}

impl Verdict {
    /// Terminal verdicts never change again within a pass
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Verdict::Pending | Verdict::HttpOk)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::IssuerMatch)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Pending => "pending",
            Verdict::HttpOk => "http ok",
            Verdict::HttpTimeout => "http timeout",
            Verdict::IssuerMatch => "issuer match",
            Verdict::IssuerMismatch => "issuer mismatch",
            Verdict::CertUnreadable => "certificate unreadable",
        };
        f.write_str(label)
    }
}

/// Everything observed for one hostname during a pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostnameOutcome {
    pub hostname: String,
    pub verdict: Verdict,
    /// Polling attempts used
    pub attempts: u32,
    /// Last HTTP status seen, if any request completed
    pub last_status: Option<u16>,
    /// Issuer distinguished name of the leaf certificate
    pub issuer: Option<String>,
    /// SHA-256 fingerprint of the leaf certificate (hex)
    pub fingerprint: Option<String>,
    /// Last error message, if the verdict is a failure
    pub detail: Option<String>,
}

impl HostnameOutcome {
    pub fn pending(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            verdict: Verdict::Pending,
            attempts: 0,
            last_status: None,
            issuer: None,
            fingerprint: None,
            detail: None,
        }
    }
}

/// Result of one complete readiness pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub run_id: Uuid,
    pub expected_class: CertificateClass,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per hostname, in configuration order
    pub outcomes: Vec<HostnameOutcome>,
}

impl ReadinessReport {
    /// The pass succeeds only if every hostname matched the expected issuer
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.verdict.is_success())
    }

    /// Hostnames whose verdict is anything other than `IssuerMatch`
    pub fn failures(&self) -> Vec<&HostnameOutcome> {
        self.outcomes
            .iter()
            .filter(|o| !o.verdict.is_success())
            .collect()
    }

    /// Human-readable per-hostname summary
    pub fn summary(&self) -> String {
        let mut lines = Vec::with_capacity(self.outcomes.len() + 2);
        lines.push(format!(
            "Readiness pass {} (expecting {} certificates)",
            self.run_id, self.expected_class
        ));

        for outcome in &self.outcomes {
            let marker = if outcome.verdict.is_success() { "OK  " } else { "FAIL" };
            let mut line = format!(
                "  [{}] {:<40} {} after {} attempt(s)",
                marker, outcome.hostname, outcome.verdict, outcome.attempts
            );
            if let Some(ref issuer) = outcome.issuer {
                line.push_str(&format!(" | issuer: {}", issuer));
            }
            if let Some(ref detail) = outcome.detail {
                line.push_str(&format!(" | {}", detail));
            }
            lines.push(line);
        }

        let failures = self.failures();
        if failures.is_empty() {
            lines.push("All hostnames verified.".to_string());
        } else {
            let names: Vec<&str> = failures.iter().map(|o| o.hostname.as_str()).collect();
            lines.push(format!("Verification failed for: {}", names.join(", ")));
        }

        lines.join("\n")
    }
}
