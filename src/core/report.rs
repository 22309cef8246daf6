// src/core/report.rs

use crate::core::knowledge_base::header_policy;
use crate::core::models::ScanResult;
use crate::error::{Result, ScanError};
use std::fmt::Write as _;
use strum::{AsRefStr, Display, EnumString};

/// Turns a finished scan into a document.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, result: &ScanResult) -> Result<String>;
}

/// Output formats the CLI can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Text,
}

impl ReportFormat {
    pub fn renderer(self) -> Box<dyn ReportRenderer> {
        match self {
            ReportFormat::Json => Box::new(JsonRenderer),
            ReportFormat::Text => Box::new(TextRenderer),
        }
    }
}

/// The result as a pretty-printed JSON mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl ReportRenderer for JsonRenderer {
    fn render(&self, result: &ScanResult) -> Result<String> {
        serde_json::to_string_pretty(result).map_err(|e| ScanError::Render(e.to_string()))
    }
}

/// A plain-text summary with remediation advice for every weak header.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl ReportRenderer for TextRenderer {
    fn render(&self, result: &ScanResult) -> Result<String> {
        write_text(result).map_err(|e| ScanError::Render(e.to_string()))
    }
}

fn write_text(result: &ScanResult) -> std::result::Result<String, std::fmt::Error> {
    let mut out = String::new();

    // --- Overview ---
    writeln!(out, "VulnVision report for {}", result.target)?;
    writeln!(out, "Fetched:  {} (HTTP {})", result.fetched_url, result.status_code)?;
    writeln!(out, "Scanned:  {}", result.scanned_at.to_rfc3339())?;
    writeln!(out, "Risk:     {}", result.risk.level)?;
    for reason in &result.risk.reasons {
        writeln!(out, "  - {reason}")?;
    }

    // --- Technologies ---
    writeln!(out, "\nTECHNOLOGIES")?;
    if result.tech_stack.is_empty() {
        writeln!(out, "  Not identified.")?;
    }
    for tech in &result.tech_stack {
        let version = tech.version.as_deref().map(|v| format!(" {v}")).unwrap_or_default();
        writeln!(out, "  - {}{} [{}] ({})", tech.name, version, tech.confidence, tech.evidence)?;
    }

    // --- Security Headers ---
    writeln!(out, "\nSECURITY HEADERS")?;
    for finding in &result.security_headers {
        let icon = if finding.is_secure() { "✓" } else { "✗" };
        writeln!(out, "  {icon} {} ({}): {}", finding.header, finding.status, finding.note)?;
        if !finding.is_secure() {
            if let Some(policy) = header_policy(&finding.header) {
                writeln!(out, "      Fix: {}", policy.remediation)?;
            }
        }
    }

    // --- TLS ---
    writeln!(out, "\nTLS CERTIFICATE")?;
    match &result.tls {
        None => writeln!(out, "  No TLS endpoint.")?,
        Some(tls) => {
            writeln!(out, "  Subject:   {}", tls.subject)?;
            writeln!(out, "  Issuer:    {}", tls.issuer)?;
            writeln!(out, "  Valid to:  {} ({} days remaining)", tls.valid_to.to_rfc3339(), tls.days_remaining)?;
            let key_size = tls.key_size.map(|b| format!(" {b} bits")).unwrap_or_default();
            writeln!(out, "  Key:       {}{}", tls.key_type, key_size)?;
            writeln!(out, "  Signature: {}", tls.signature_algorithm)?;
            for finding in &tls.findings {
                writeln!(out, "  ! {}", finding.message)?;
            }
        }
    }

    // --- Exposures ---
    writeln!(out, "\nEXPOSED PATHS")?;
    if result.exposures.is_empty() {
        writeln!(out, "  None found.")?;
    }
    for exposure in &result.exposures {
        writeln!(
            out,
            "  [{}] {} (HTTP {}): {}",
            exposure.risk, exposure.path, exposure.status_code, exposure.detail
        )?;
    }

    Ok(out)
}
