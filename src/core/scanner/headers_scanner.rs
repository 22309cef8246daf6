// src/core/scanner/headers_scanner.rs

use crate::core::knowledge_base::{HEADER_POLICY, HeaderPolicy};
use crate::core::models::{HeaderFinding, HeaderStatus};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Looks up a header in the lower-cased map captured by the fetcher.
fn check_header<'a>(headers: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    debug!(header_name = name, "Checking for header.");
    let value = headers.get(&name.to_ascii_lowercase()).map(String::as_str);
    match value {
        Some(v) => debug!(header_name = name, value = v, "Header found."),
        None => debug!(header_name = name, "Header not found."),
    }
    value
}

fn grade(policy: &HeaderPolicy, value: Option<&str>) -> HeaderFinding {
    let (status, note) = match value {
        None => (HeaderStatus::Missing, "Header not present".to_string()),
        Some(v) => match (policy.check)(v) {
            Ok(note) => (HeaderStatus::Secure, note),
            Err(note) => (HeaderStatus::NeedsReview, note),
        },
    };
    HeaderFinding {
        header: policy.name.to_string(),
        status,
        note,
    }
}

/// Grades the captured response headers against the security-header policy.
///
/// Pure: no I/O. Exactly one finding per tracked header, in policy order,
/// whatever the target actually sent.
pub fn audit_headers(headers: &BTreeMap<String, String>) -> Vec<HeaderFinding> {
    let findings: Vec<HeaderFinding> = HEADER_POLICY
        .iter()
        .map(|policy| grade(policy, check_header(headers, policy.name)))
        .collect();

    let insecure = findings.iter().filter(|f| !f.is_secure()).count();
    info!(tracked = findings.len(), insecure, "Header audit finished.");
    findings
}
