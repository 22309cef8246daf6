//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use vulnvision::core::models::{TlsFinding, TlsFindingKind, TlsSummary};
use vulnvision::core::scanner::ssl_scanner::CertificateSource;
use vulnvision::{ScanConfig, Scanner};

/// A ScanConfig with short timeouts suited to a local wiremock server.
pub fn test_config() -> ScanConfig {
    ScanConfig {
        fetch_timeout_seconds: 5,
        exposure_timeout_seconds: 2,
        scan_deadline_seconds: 15,
        tls_timeout_seconds: 1,
        exposure_concurrency: 16,
        user_agent: "VulnVision-Test/1.0".to_string(),
        ..ScanConfig::default()
    }
}

/// Returns the same certificate summary for every host.
pub struct FixedTls(pub Option<TlsSummary>);

#[async_trait]
impl CertificateSource for FixedTls {
    async fn inspect(&self, _host: &str) -> Option<TlsSummary> {
        self.0.clone()
    }
}

/// A certificate expiring in `days_remaining` days carrying `findings`.
pub fn certificate(days_remaining: i64, findings: Vec<TlsFinding>) -> TlsSummary {
    let now = Utc::now();
    TlsSummary {
        subject: "CN=example.com".to_string(),
        issuer: "CN=Test Issuing CA".to_string(),
        valid_from: now - Duration::days(300),
        valid_to: now + Duration::days(days_remaining),
        subject_alt_names: vec!["example.com".to_string()],
        key_type: "RSA".to_string(),
        key_size: Some(2048),
        signature_algorithm: "sha256WithRSAEncryption".to_string(),
        days_remaining,
        findings,
    }
}

pub fn healthy_certificate() -> TlsSummary {
    certificate(200, Vec::new())
}

pub fn expiring_certificate() -> TlsSummary {
    certificate(
        45,
        vec![TlsFinding::new(TlsFindingKind::Expiring60, "Certificate expires within 60 days")],
    )
}

pub fn expired_certificate() -> TlsSummary {
    certificate(
        -5,
        vec![TlsFinding::new(TlsFindingKind::Expired, "Certificate has expired")],
    )
}

/// A scanner whose certificate source always answers with `tls`.
pub fn scanner_with_tls(config: ScanConfig, tls: Option<TlsSummary>) -> Scanner {
    Scanner::builder(config)
        .certificate_source(Arc::new(FixedTls(tls)))
        .build()
        .unwrap()
}

/// Every policy-tracked header with a passing value.
pub const SECURE_HEADERS: &[(&str, &str)] = &[
    ("Content-Security-Policy", "default-src 'self'"),
    ("Strict-Transport-Security", "max-age=31536000; includeSubDomains"),
    ("X-Frame-Options", "DENY"),
    ("X-Content-Type-Options", "nosniff"),
    ("Referrer-Policy", "strict-origin-when-cross-origin"),
    ("Permissions-Policy", "camera=(), microphone=()"),
];
