// src/core/scanner/ssl_scanner.rs

use tracing::{debug, error, info};

use crate::core::models::{TlsFinding, TlsFindingKind, TlsSummary};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use native_tls::TlsConnector;
use std::net::{IpAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tokio::task::spawn_blocking;
use x509_parser::objects::{oid2sn, oid_registry};
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

/// Anything that can produce a certificate summary for a host.
/// `None` means the host has no usable TLS endpoint.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    async fn inspect(&self, host: &str) -> Option<TlsSummary>;
}

/// Connects directly to `host:port`, independent of the HTTP fetch, and reads
/// the leaf certificate.
#[derive(Debug, Clone)]
pub struct TlsInspector {
    port: u16,
    timeout: Duration,
}

impl TlsInspector {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

#[async_trait]
impl CertificateSource for TlsInspector {
    async fn inspect(&self, host: &str) -> Option<TlsSummary> {
        info!(host, port = self.port, "Starting TLS inspection.");
        let host_owned = host.to_string();
        let (port, timeout) = (self.port, self.timeout);

        debug!("Spawning blocking task for TLS connection.");
        let outcome = spawn_blocking(move || perform_tls_scan(&host_owned, port, timeout))
            .await
            .unwrap_or_else(|e| {
                error!(panic = %e, "Blocking TLS task panicked!");
                Err(format!("Task panicked: {e}"))
            });

        match outcome {
            Ok(summary) => {
                info!(findings = %summary.findings.len(), days_remaining = summary.days_remaining, "TLS inspection finished.");
                Some(summary)
            }
            Err(reason) => {
                // Plaintext-only hosts end up here; that is a result, not a failure.
                debug!(host, %reason, "No TLS endpoint available.");
                None
            }
        }
    }
}

fn perform_tls_scan(host: &str, port: u16, timeout: Duration) -> Result<TlsSummary, String> {
    debug!(host, "Performing TLS connection and handshake.");

    // Invalid certificates are accepted so they can be reported on.
    let connector = TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map_err(|e| format!("TlsConnector Error: {e}"))?;

    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| format!("Resolution Error: {e}"))?
        .next()
        .ok_or_else(|| format!("No address for {host}"))?;

    let stream = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| format!("TCP Connection Error: {e}"))?;
    stream
        .set_read_timeout(Some(timeout))
        .and_then(|_| stream.set_write_timeout(Some(timeout)))
        .map_err(|e| format!("Socket Error: {e}"))?;

    let stream = connector
        .connect(host, stream)
        .map_err(|e| format!("TLS Handshake Error: {e}"))?;

    let cert = match stream.peer_certificate() {
        Ok(Some(c)) => c,
        Ok(None) => return Err("Server did not provide a certificate.".to_string()),
        Err(e) => return Err(format!("Could not get peer certificate: {e}")),
    };
    let cert_der = cert
        .to_der()
        .map_err(|e| format!("Could not convert certificate to DER: {e}"))?;

    summarize_certificate(&cert_der, host, Utc::now())
}

/// Parses a DER leaf certificate and applies the findings policy as of `now`.
pub fn summarize_certificate(der: &[u8], host: &str, now: DateTime<Utc>) -> Result<TlsSummary, String> {
    let (_, x509) = parse_x509_certificate(der).map_err(|e| format!("X.509 Parse Error: {e}"))?;
    info!(subject = %x509.subject(), issuer = %x509.issuer(), "Successfully parsed certificate.");

    let validity = x509.validity();
    let valid_from = asn1_time_to_chrono_utc(&validity.not_before);
    let valid_to = asn1_time_to_chrono_utc(&validity.not_after);

    let subject_alt_names: Vec<String> = match x509.subject_alternative_name() {
        Ok(Some(ext)) => ext
            .value
            .general_names
            .iter()
            .filter_map(|name| match name {
                GeneralName::DNSName(dns) => Some(dns.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let (key_type, key_size) = match x509.public_key().parsed() {
        Ok(PublicKey::RSA(rsa)) => ("RSA", Some(rsa.key_size() as u32)),
        Ok(PublicKey::EC(ec)) => ("EC", Some(ec.key_size() as u32)),
        Ok(PublicKey::DSA(_)) => ("DSA", None),
        _ => ("Unknown", None),
    };

    let sig_oid = &x509.signature_algorithm.algorithm;
    let signature_algorithm = oid2sn(sig_oid, oid_registry())
        .map(str::to_string)
        .unwrap_or_else(|_| sig_oid.to_id_string());

    let names_to_match: Vec<String> = if subject_alt_names.is_empty() {
        x509.subject()
            .iter_common_name()
            .filter_map(|cn| cn.as_str().ok().map(str::to_string))
            .collect()
    } else {
        subject_alt_names.clone()
    };
    let hostname_matches = host.parse::<IpAddr>().is_ok()
        || names_to_match.iter().any(|pattern| hostname_matches(pattern, host));

    let days_remaining = days_between(now, valid_to);
    let findings = assess_certificate(&CertificateFacts {
        days_remaining,
        self_signed: x509.subject().as_raw() == x509.issuer().as_raw(),
        key_type,
        key_size,
        hostname_matches,
        signature_algorithm: &signature_algorithm,
    });

    Ok(TlsSummary {
        subject: x509.subject().to_string(),
        issuer: x509.issuer().to_string(),
        valid_from,
        valid_to,
        subject_alt_names,
        key_type: key_type.to_string(),
        key_size,
        signature_algorithm,
        days_remaining,
        findings,
    })
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or_default()
}

/// Whole days from `now` to `until`, rounded down, so anything past expiry is negative.
pub fn days_between(now: DateTime<Utc>, until: DateTime<Utc>) -> i64 {
    until.signed_duration_since(now).num_seconds().div_euclid(86_400)
}

/// Matches a certificate name (optionally `*.`-wildcarded) against a host.
fn hostname_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    match pattern.strip_prefix("*.") {
        Some(suffix) => host
            .split_once('.')
            .is_some_and(|(label, rest)| !label.is_empty() && rest == suffix),
        None => pattern == host,
    }
}

/// The certificate properties the findings policy looks at.
#[derive(Debug, Clone)]
pub struct CertificateFacts<'a> {
    pub days_remaining: i64,
    pub self_signed: bool,
    pub key_type: &'a str,
    pub key_size: Option<u32>,
    pub hostname_matches: bool,
    pub signature_algorithm: &'a str,
}

pub fn assess_certificate(facts: &CertificateFacts<'_>) -> Vec<TlsFinding> {
    debug!(days_remaining = facts.days_remaining, "Analyzing certificate.");
    let mut findings = Vec::new();

    match facts.days_remaining {
        days if days < 0 => {
            findings.push(TlsFinding::new(TlsFindingKind::Expired, "Certificate has expired"))
        }
        0..=30 => findings.push(TlsFinding::new(
            TlsFindingKind::Expiring30,
            "Certificate expires within 30 days",
        )),
        31..=60 => findings.push(TlsFinding::new(
            TlsFindingKind::Expiring60,
            "Certificate expires within 60 days",
        )),
        _ => {}
    }

    if facts.self_signed {
        findings.push(TlsFinding::new(
            TlsFindingKind::SelfSigned,
            "Certificate appears to be self-signed",
        ));
    }

    let weak_floor = match facts.key_type {
        "RSA" | "DSA" => Some(2048),
        "EC" => Some(256),
        _ => None,
    };
    if let (Some(floor), Some(bits)) = (weak_floor, facts.key_size) {
        if bits < floor {
            findings.push(TlsFinding::new(
                TlsFindingKind::WeakKey,
                format!("{} key size is weak ({bits} bits)", facts.key_type),
            ));
        }
    }

    if !facts.hostname_matches {
        findings.push(TlsFinding::new(
            TlsFindingKind::HostnameMismatch,
            "Certificate SAN does not match hostname",
        ));
    }

    let algorithm = facts.signature_algorithm.to_ascii_lowercase();
    if algorithm.contains("md5") || algorithm.contains("sha1") {
        findings.push(TlsFinding::new(
            TlsFindingKind::WeakSignature,
            format!("Weak signature algorithm in use ({})", facts.signature_algorithm),
        ));
    }

    findings
}
