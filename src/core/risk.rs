// src/core/risk.rs

//! Folds every analyzer's output into one verdict.

use crate::core::models::{
    ExposureFinding, HeaderFinding, HeaderStatus, Risk, RiskLevel, RiskVerdict, TlsFindingKind,
    TlsSummary,
};
use tracing::debug;

pub const NO_ISSUES: &str = "No significant issues detected";

/// Non-secure headers needed to lift the verdict to `Medium` on their own.
const HEADER_ISSUES_FOR_MEDIUM: usize = 2;

/// A reason plus the severity it is ordered by.
struct Reason {
    severity: Risk,
    text: String,
}

/// Builds the verdict. Pure: the same inputs always give the same level and
/// the same reason list.
///
/// Reasons are ordered by severity (high first), then by discovery order
/// (headers, TLS, exposures), deduplicated, and never empty.
pub fn aggregate(
    headers: &[HeaderFinding],
    tls: Option<&TlsSummary>,
    exposures: &[ExposureFinding],
) -> RiskVerdict {
    let mut reasons: Vec<Reason> = Vec::new();

    for finding in headers {
        match finding.status {
            HeaderStatus::Missing => reasons.push(Reason {
                severity: Risk::Medium,
                text: format!("Missing security header: {}", finding.header),
            }),
            HeaderStatus::NeedsReview => reasons.push(Reason {
                severity: Risk::Low,
                text: format!("Header needs review: {}", finding.header),
            }),
            HeaderStatus::Secure => {}
        }
    }

    if let Some(summary) = tls {
        reasons.extend(summary.findings.iter().map(|f| Reason {
            severity: f.kind.severity(),
            text: f.message.clone(),
        }));
    }

    reasons.extend(exposures.iter().filter(|e| e.risk >= Risk::Medium).map(|e| Reason {
        severity: e.risk,
        text: format!("Exposure: {} ({})", e.detail, e.path),
    }));

    // Stable sort keeps discovery order within a severity.
    reasons.sort_by(|a, b| b.severity.cmp(&a.severity));

    let mut texts: Vec<String> = Vec::with_capacity(reasons.len());
    for reason in reasons {
        if !texts.contains(&reason.text) {
            texts.push(reason.text);
        }
    }
    if texts.is_empty() {
        texts.push(NO_ISSUES.to_string());
    }

    let level = level(headers, tls, exposures);
    debug!(%level, reasons = %texts.len(), "Risk verdict computed.");
    RiskVerdict { level, reasons: texts }
}

fn level(headers: &[HeaderFinding], tls: Option<&TlsSummary>, exposures: &[ExposureFinding]) -> RiskLevel {
    let cert_has = |kind: TlsFindingKind| tls.is_some_and(|t| t.has(kind));
    let worst_exposure = exposures.iter().map(|e| e.risk).max();

    if worst_exposure == Some(Risk::High) || cert_has(TlsFindingKind::Expired) {
        return RiskLevel::High;
    }

    let insecure_headers = headers.iter().filter(|h| !h.is_secure()).count();
    if worst_exposure == Some(Risk::Medium)
        || insecure_headers >= HEADER_ISSUES_FOR_MEDIUM
        || cert_has(TlsFindingKind::Expiring30)
        || cert_has(TlsFindingKind::Expiring60)
    {
        return RiskLevel::Medium;
    }

    RiskLevel::Low
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::knowledge_base::HEADER_POLICY;
    use crate::core::models::TlsFinding;
    use chrono::{TimeZone, Utc};

    fn all_secure() -> Vec<HeaderFinding> {
        HEADER_POLICY
            .iter()
            .map(|p| HeaderFinding {
                header: p.name.to_string(),
                status: HeaderStatus::Secure,
                note: "ok".into(),
            })
            .collect()
    }

    fn with_status(mut headers: Vec<HeaderFinding>, name: &str, status: HeaderStatus) -> Vec<HeaderFinding> {
        for h in headers.iter_mut().filter(|h| h.header == name) {
            h.status = status;
        }
        headers
    }

    fn cert(days_remaining: i64, findings: Vec<TlsFinding>) -> TlsSummary {
        TlsSummary {
            subject: "CN=example.com".into(),
            issuer: "CN=Test CA".into(),
            valid_from: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            valid_to: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            subject_alt_names: vec!["example.com".into()],
            key_type: "RSA".into(),
            key_size: Some(2048),
            signature_algorithm: "sha256WithRSAEncryption".into(),
            days_remaining,
            findings,
        }
    }

    fn exposure(path: &str, risk: Risk, detail: &str) -> ExposureFinding {
        ExposureFinding { path: path.into(), status_code: 200, risk, detail: detail.into() }
    }

    #[test]
    fn clean_target_is_low_with_canned_reason() {
        let verdict = aggregate(&all_secure(), Some(&cert(200, vec![])), &[]);
        assert_eq!(verdict.level, RiskLevel::Low);
        assert_eq!(verdict.reasons, vec![NO_ISSUES.to_string()]);
    }

    #[test]
    fn missing_csp_and_45_day_cert_is_medium() {
        let headers = with_status(all_secure(), "Content-Security-Policy", HeaderStatus::Missing);
        let tls = cert(
            45,
            vec![TlsFinding::new(TlsFindingKind::Expiring60, "Certificate expires within 60 days")],
        );
        let verdict = aggregate(&headers, Some(&tls), &[]);
        assert_eq!(verdict.level, RiskLevel::Medium);
        assert_eq!(
            verdict.reasons,
            vec![
                "Missing security header: Content-Security-Policy".to_string(),
                "Certificate expires within 60 days".to_string(),
            ]
        );
    }

    #[test]
    fn expired_certificate_is_always_high() {
        let tls = cert(-3, vec![TlsFinding::new(TlsFindingKind::Expired, "Certificate has expired")]);
        let verdict = aggregate(&all_secure(), Some(&tls), &[]);
        assert_eq!(verdict.level, RiskLevel::High);
        assert_eq!(verdict.reasons, vec!["Certificate has expired".to_string()]);
    }

    #[test]
    fn high_exposure_is_high_and_low_exposure_adds_no_reason() {
        let exposures = vec![
            exposure("/.well-known/security.txt", Risk::Low, "Security.txt present"),
            exposure("/.git/config", Risk::High, "Git repository config exposed"),
        ];
        let verdict = aggregate(&all_secure(), None, &exposures);
        assert_eq!(verdict.level, RiskLevel::High);
        assert_eq!(verdict.reasons, vec!["Exposure: Git repository config exposed (/.git/config)".to_string()]);
    }

    #[test]
    fn two_weak_headers_are_medium_one_is_low() {
        let one = with_status(all_secure(), "Referrer-Policy", HeaderStatus::NeedsReview);
        assert_eq!(aggregate(&one, None, &[]).level, RiskLevel::Low);

        let two = with_status(one, "X-Frame-Options", HeaderStatus::Missing);
        let verdict = aggregate(&two, None, &[]);
        assert_eq!(verdict.level, RiskLevel::Medium);
        // Missing (medium) sorts ahead of needs-review (low).
        assert_eq!(verdict.reasons[0], "Missing security header: X-Frame-Options");
        assert_eq!(verdict.reasons[1], "Header needs review: Referrer-Policy");
    }

    #[test]
    fn reasons_are_severity_ordered_and_deduplicated() {
        let headers = with_status(all_secure(), "Permissions-Policy", HeaderStatus::Missing);
        let exposures = vec![
            exposure("/backup.sql", Risk::High, "Database dump exposed"),
            exposure("/admin", Risk::Medium, "Admin panel directory"),
            exposure("/backup.sql", Risk::High, "Database dump exposed"),
        ];
        let verdict = aggregate(&headers, None, &exposures);
        assert_eq!(
            verdict.reasons,
            vec![
                "Exposure: Database dump exposed (/backup.sql)".to_string(),
                "Missing security header: Permissions-Policy".to_string(),
                "Exposure: Admin panel directory (/admin)".to_string(),
            ]
        );
    }

    #[test]
    fn no_tls_endpoint_contributes_nothing() {
        let verdict = aggregate(&all_secure(), None, &[]);
        assert_eq!(verdict.level, RiskLevel::Low);
        assert_eq!(verdict.reasons.len(), 1);
    }
}
