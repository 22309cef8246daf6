// src/core/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use strum::Display;

// --- Shared Ordinal Enums ---

/// Risk tier of a single exposure finding or verdict reason.
/// Variants are declared low to high so `Ord` follows severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Risk {
    Low,
    Medium,
    High,
}

/// How strongly a signal points at a technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Overall verdict level. Serialized capitalized (`"Low"`, `"Medium"`, `"High"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

// --- Fetcher ---

/// The single primary response. Header keys are lower-cased; when a header
/// repeats, the last value wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub requested_url: String,
    pub fetched_url: String,
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// Every `Set-Cookie` value in arrival order; `headers` only keeps the last.
    pub set_cookies: Vec<String>,
    pub body: Vec<u8>,
    pub truncated: bool,
    pub elapsed: Duration,
}

impl FetchResult {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// The body decoded as UTF-8, with invalid sequences replaced.
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

// --- TLS Inspector ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TlsFindingKind {
    Expired,
    #[serde(rename = "expiring_30")]
    #[strum(serialize = "expiring_30")]
    Expiring30,
    #[serde(rename = "expiring_60")]
    #[strum(serialize = "expiring_60")]
    Expiring60,
    SelfSigned,
    WeakKey,
    HostnameMismatch,
    WeakSignature,
}

impl TlsFindingKind {
    pub fn severity(self) -> Risk {
        match self {
            TlsFindingKind::Expired | TlsFindingKind::WeakKey => Risk::High,
            TlsFindingKind::Expiring30
            | TlsFindingKind::SelfSigned
            | TlsFindingKind::HostnameMismatch
            | TlsFindingKind::WeakSignature => Risk::Medium,
            TlsFindingKind::Expiring60 => Risk::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsFinding {
    pub kind: TlsFindingKind,
    pub message: String,
}

impl TlsFinding {
    pub fn new(kind: TlsFindingKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsSummary {
    pub subject: String,
    pub issuer: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub subject_alt_names: Vec<String>,
    pub key_type: String,
    pub key_size: Option<u32>,
    pub signature_algorithm: String,
    /// Whole days until `valid_to`, negative once expired. Computed at scan time.
    pub days_remaining: i64,
    pub findings: Vec<TlsFinding>,
}

impl TlsSummary {
    pub fn has(&self, kind: TlsFindingKind) -> bool {
        self.findings.iter().any(|f| f.kind == kind)
    }
}

// --- Header Auditor ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HeaderStatus {
    Secure,
    NeedsReview,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderFinding {
    pub header: String,
    pub status: HeaderStatus,
    pub note: String,
}

impl HeaderFinding {
    pub fn is_secure(&self) -> bool {
        self.status == HeaderStatus::Secure
    }
}

// --- Technology Detector ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechMatch {
    pub name: String,
    pub confidence: Confidence,
    pub evidence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

// --- Exposure Sweeper ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureFinding {
    pub path: String,
    pub status_code: u16,
    pub risk: Risk,
    pub detail: String,
}

// --- Risk Aggregator ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub level: RiskLevel,
    pub reasons: Vec<String>,
}

// --- Main Result ---

/// The only entity that is cached and the only one that crosses the system
/// boundary. Cached copies are returned unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub target: String,
    pub fetched_url: String,
    pub status_code: u16,
    pub response_headers: BTreeMap<String, String>,
    pub risk: RiskVerdict,
    pub tech_stack: Vec<TechMatch>,
    pub security_headers: Vec<HeaderFinding>,
    pub tls: Option<TlsSummary>,
    pub exposures: Vec<ExposureFinding>,
    pub scanned_at: DateTime<Utc>,
}
