//! Static reference data the analyzers evaluate against.
//!
//! Nothing in here does I/O. The tables are read-only for the lifetime of the
//! process: the security-header policy, the favicon hash table, and the
//! exposure path catalogue. Technology signatures live next to the detector
//! in `fingerprint_scanner`.

use crate::core::models::Risk;
use once_cell::sync::Lazy;
use regex::Regex;

// --- Security Header Policy ---

/// Outcome of a header's quality predicate: `Ok(note)` when the value is
/// acceptable, `Err(note)` when it needs review.
pub type QualityCheck = fn(&str) -> Result<String, String>;

/// One tracked response header.
pub struct HeaderPolicy {
    /// Canonical display name, e.g. "Strict-Transport-Security".
    pub name: &'static str,
    pub check: QualityCheck,
    /// What to do when the header is missing or weak.
    pub remediation: &'static str,
}

/// Minimum HSTS `max-age` considered secure (one year).
pub const HSTS_MIN_MAX_AGE: u64 = 31_536_000;

/// Tracked headers, in reporting order.
pub static HEADER_POLICY: &[HeaderPolicy] = &[
    HeaderPolicy {
        name: "Content-Security-Policy",
        check: check_csp,
        remediation: "Define a Content-Security-Policy that restricts script sources and avoids 'unsafe-inline' and 'unsafe-eval'.",
    },
    HeaderPolicy {
        name: "Strict-Transport-Security",
        check: check_hsts,
        remediation: "Send 'Strict-Transport-Security: max-age=31536000; includeSubDomains' on every HTTPS response.",
    },
    HeaderPolicy {
        name: "X-Frame-Options",
        check: check_x_frame_options,
        remediation: "Send 'X-Frame-Options: DENY' (or SAMEORIGIN) to prevent clickjacking.",
    },
    HeaderPolicy {
        name: "X-Content-Type-Options",
        check: check_x_content_type_options,
        remediation: "Send 'X-Content-Type-Options: nosniff' to stop MIME type sniffing.",
    },
    HeaderPolicy {
        name: "Referrer-Policy",
        check: check_referrer_policy,
        remediation: "Use 'Referrer-Policy: strict-origin-when-cross-origin' or stricter.",
    },
    HeaderPolicy {
        name: "Permissions-Policy",
        check: check_permissions_policy,
        remediation: "Declare a Permissions-Policy that disables browser features the site does not use.",
    },
];

pub fn header_policy(name: &str) -> Option<&'static HeaderPolicy> {
    HEADER_POLICY.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

fn check_csp(value: &str) -> Result<String, String> {
    let lower = value.to_ascii_lowercase();
    if lower.trim().is_empty() {
        return Err("Policy is empty".to_string());
    }
    let unsafe_sources: Vec<&str> = ["'unsafe-inline'", "'unsafe-eval'"]
        .into_iter()
        .filter(|s| lower.contains(s))
        .collect();
    if unsafe_sources.is_empty() {
        Ok("Policy present without unsafe sources".to_string())
    } else {
        Err(format!("Policy allows {}", unsafe_sources.join(" and ")))
    }
}

fn check_hsts(value: &str) -> Result<String, String> {
    let max_age = value
        .split(';')
        .find_map(|part| {
            let part = part.trim();
            part.get(..8)
                .filter(|p| p.eq_ignore_ascii_case("max-age="))
                .map(|_| part[8..].trim().trim_matches('"'))
        })
        .ok_or_else(|| "Missing max-age directive".to_string())?;
    let max_age: u64 = max_age
        .parse()
        .map_err(|_| format!("Invalid max-age value {max_age:?}"))?;
    if max_age < HSTS_MIN_MAX_AGE {
        return Err(format!("max-age={max_age} is below {HSTS_MIN_MAX_AGE}"));
    }
    Ok(format!("max-age={max_age}"))
}

fn check_x_frame_options(value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("deny") || value.eq_ignore_ascii_case("sameorigin") {
        Ok(value.to_ascii_uppercase())
    } else {
        Err(format!("Unexpected value {value:?}"))
    }
}

fn check_x_content_type_options(value: &str) -> Result<String, String> {
    if value.trim().eq_ignore_ascii_case("nosniff") {
        Ok("nosniff".to_string())
    } else {
        Err(format!("Expected 'nosniff', got {:?}", value.trim()))
    }
}

fn check_referrer_policy(value: &str) -> Result<String, String> {
    const SAFE: &[&str] = &[
        "no-referrer",
        "same-origin",
        "strict-origin",
        "strict-origin-when-cross-origin",
        "origin",
        "origin-when-cross-origin",
    ];
    // Browsers apply the last policy they understand.
    let effective = value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .last()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if SAFE.contains(&effective.as_str()) {
        Ok(effective)
    } else {
        Err(format!("Policy {effective:?} may leak full URLs"))
    }
}

fn check_permissions_policy(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        Err("Policy is empty".to_string())
    } else {
        Ok("Policy present".to_string())
    }
}

// --- Favicon Hashes ---

/// Shodan-style favicon hashes (signed MurmurHash3 of the MIME base64 body).
pub static FAVICON_HASHES: &[(i32, &str)] = &[
    (-247388890, "Apache Tomcat"),
    (-1372965829, "WordPress"),
    (-1520217781, "phpMyAdmin"),
    (116323821, "Django"),
    (968422740, "Nginx"),
    (81586312, "Jenkins"),
    (1485257654, "SonarQube"),
];

pub fn favicon_technology(hash: i32) -> Option<&'static str> {
    FAVICON_HASHES
        .iter()
        .find(|(h, _)| *h == hash)
        .map(|(_, name)| *name)
}

// --- Exposure Catalogue ---

/// Statuses treated as "the resource exists".
pub const FOUND: &[u16] = &[200];
/// As `FOUND`, plus auth challenges that confirm the path exists.
pub const FOUND_OR_PROTECTED: &[u16] = &[200, 401, 403];

/// Content test applied to a 2xx response body.
pub enum BodyCheck {
    /// Any body counts (subject to soft-404 suppression).
    Any,
    /// Case-sensitive substring, any of the listed markers.
    Contains(&'static [&'static str]),
    Pattern(&'static Lazy<Regex>),
    /// Raw byte prefix, for binary archives and dumps.
    Magic(&'static [u8]),
}

impl BodyCheck {
    pub fn matches(&self, body: &[u8]) -> bool {
        match self {
            BodyCheck::Any => true,
            BodyCheck::Contains(markers) => {
                let text = String::from_utf8_lossy(body);
                markers.iter().any(|m| text.contains(m))
            }
            BodyCheck::Pattern(re) => re.is_match(&String::from_utf8_lossy(body)),
            BodyCheck::Magic(prefix) => body.starts_with(prefix),
        }
    }
}

pub struct ExposureCheck {
    pub path: &'static str,
    pub detail: &'static str,
    pub risk: Risk,
    pub accept: &'static [u16],
    pub body: BodyCheck,
}

static RE_ENV_ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(export\s+)?[A-Za-z_][A-Za-z0-9_]*\s*=").unwrap());
static RE_HTPASSWD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[^:\s<>]+:(\$apr1\$|\$2[aby]\$|\{SHA\}|[A-Za-z0-9./]{13})").unwrap());
static RE_ROBOTS_SENSITIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Disallow:\s*/(admin|backup|config|\.git)").unwrap());
static RE_PROMETHEUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^# (HELP|TYPE) \w+").unwrap());

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Every requested path, in reporting order.
pub static EXPOSURE_CATALOGUE: &[ExposureCheck] = &[
    // Version control metadata
    ExposureCheck { path: "/.git/config", detail: "Git repository config exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Contains(&["[core]", "[remote"]) },
    ExposureCheck { path: "/.git/HEAD", detail: "Git HEAD reference exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Contains(&["ref: refs/"]) },
    ExposureCheck { path: "/.svn/entries", detail: "Subversion metadata exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Contains(&["dir", "svn:"]) },
    ExposureCheck { path: "/.hg/hgrc", detail: "Mercurial config exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Contains(&["[paths]", "[ui]"]) },
    // Environment and credential files
    ExposureCheck { path: "/.env", detail: "Environment variables file exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Pattern(&RE_ENV_ASSIGNMENT) },
    ExposureCheck { path: "/.env.local", detail: "Local environment file exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Pattern(&RE_ENV_ASSIGNMENT) },
    ExposureCheck { path: "/.env.production", detail: "Production environment file exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Pattern(&RE_ENV_ASSIGNMENT) },
    ExposureCheck { path: "/.env.backup", detail: "Environment file backup exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Pattern(&RE_ENV_ASSIGNMENT) },
    ExposureCheck { path: "/.htpasswd", detail: "Apache password file exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Pattern(&RE_HTPASSWD) },
    ExposureCheck { path: "/.npmrc", detail: "npm credentials file exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Contains(&["_authToken", "_auth="]) },
    ExposureCheck { path: "/.aws/credentials", detail: "AWS credentials file exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Contains(&["aws_access_key_id"]) },
    ExposureCheck { path: "/.ssh/id_rsa", detail: "SSH private key exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Contains(&["PRIVATE KEY-----"]) },
    ExposureCheck { path: "/.vscode/sftp.json", detail: "Editor SFTP settings exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Contains(&["\"password\"", "\"host\""]) },
    // Server configuration
    ExposureCheck { path: "/.htaccess", detail: "Apache configuration file exposed", risk: Risk::Medium, accept: FOUND, body: BodyCheck::Contains(&["RewriteEngine", "RewriteRule", "Deny from", "Require ", "<IfModule"]) },
    ExposureCheck { path: "/web.config", detail: "IIS configuration file exposed", risk: Risk::Medium, accept: FOUND, body: BodyCheck::Contains(&["<configuration"]) },
    ExposureCheck { path: "/config.php", detail: "Common PHP config file", risk: Risk::Medium, accept: FOUND, body: BodyCheck::Any },
    ExposureCheck { path: "/config.php.bak", detail: "PHP config backup exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Contains(&["<?php"]) },
    ExposureCheck { path: "/wp-config.php.bak", detail: "WordPress config backup exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Contains(&["DB_PASSWORD", "DB_NAME"]) },
    ExposureCheck { path: "/docker-compose.yml", detail: "Docker Compose file exposed", risk: Risk::Medium, accept: FOUND, body: BodyCheck::Contains(&["services:"]) },
    // Backups and dumps
    ExposureCheck { path: "/backup.zip", detail: "Potential backup archive", risk: Risk::High, accept: FOUND, body: BodyCheck::Magic(ZIP_MAGIC) },
    ExposureCheck { path: "/backup.tar.gz", detail: "Potential backup archive", risk: Risk::High, accept: FOUND, body: BodyCheck::Magic(GZIP_MAGIC) },
    ExposureCheck { path: "/site.tar.gz", detail: "Potential site archive", risk: Risk::High, accept: FOUND, body: BodyCheck::Magic(GZIP_MAGIC) },
    ExposureCheck { path: "/backup.sql", detail: "Database dump exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Contains(&["CREATE TABLE", "INSERT INTO"]) },
    ExposureCheck { path: "/dump.sql", detail: "Database dump exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Contains(&["CREATE TABLE", "INSERT INTO"]) },
    ExposureCheck { path: "/database.sql", detail: "Database dump exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Contains(&["CREATE TABLE", "INSERT INTO"]) },
    ExposureCheck { path: "/error_log", detail: "Server error log exposed", risk: Risk::Medium, accept: FOUND, body: BodyCheck::Contains(&["PHP Warning", "PHP Fatal", "PHP Notice", "[error]"]) },
    // Admin panels and diagnostics
    ExposureCheck { path: "/admin", detail: "Admin panel directory", risk: Risk::Medium, accept: FOUND_OR_PROTECTED, body: BodyCheck::Any },
    ExposureCheck { path: "/administrator", detail: "Administrator panel", risk: Risk::Medium, accept: FOUND_OR_PROTECTED, body: BodyCheck::Any },
    ExposureCheck { path: "/login", detail: "Login panel", risk: Risk::Low, accept: FOUND, body: BodyCheck::Any },
    ExposureCheck { path: "/phpmyadmin/", detail: "phpMyAdmin interface exposed", risk: Risk::Medium, accept: FOUND_OR_PROTECTED, body: BodyCheck::Contains(&["phpMyAdmin"]) },
    ExposureCheck { path: "/phpinfo.php", detail: "PHP info page exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Contains(&["phpinfo()", "PHP Version"]) },
    ExposureCheck { path: "/info.php", detail: "PHP info page exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Contains(&["phpinfo()", "PHP Version"]) },
    ExposureCheck { path: "/server-status", detail: "Apache server status exposed", risk: Risk::High, accept: FOUND_OR_PROTECTED, body: BodyCheck::Contains(&["Apache Server Status"]) },
    ExposureCheck { path: "/server-info", detail: "Apache server info exposed", risk: Risk::Medium, accept: FOUND, body: BodyCheck::Contains(&["Apache Server Information"]) },
    ExposureCheck { path: "/elmah.axd", detail: "ELMAH error log exposed", risk: Risk::Medium, accept: FOUND, body: BodyCheck::Contains(&["Error Log for"]) },
    ExposureCheck { path: "/trace.axd", detail: "ASP.NET trace viewer exposed", risk: Risk::Medium, accept: FOUND, body: BodyCheck::Contains(&["Application Trace"]) },
    // Metrics and framework endpoints
    ExposureCheck { path: "/metrics", detail: "Prometheus metrics endpoint exposed", risk: Risk::Medium, accept: FOUND_OR_PROTECTED, body: BodyCheck::Pattern(&RE_PROMETHEUS) },
    ExposureCheck { path: "/actuator", detail: "Spring Boot actuator exposed", risk: Risk::Medium, accept: FOUND_OR_PROTECTED, body: BodyCheck::Contains(&["\"_links\""]) },
    ExposureCheck { path: "/actuator/env", detail: "Spring Boot environment exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Contains(&["propertySources", "activeProfiles"]) },
    ExposureCheck { path: "/actuator/heapdump", detail: "Spring Boot heap dump exposed", risk: Risk::High, accept: FOUND, body: BodyCheck::Magic(b"JAVA PROFILE") },
    ExposureCheck { path: "/debug/pprof/", detail: "Go pprof profiler exposed", risk: Risk::Medium, accept: FOUND, body: BodyCheck::Contains(&["goroutine", "Types of profiles available"]) },
    ExposureCheck { path: "/swagger.json", detail: "API specification exposed", risk: Risk::Low, accept: FOUND, body: BodyCheck::Contains(&["\"swagger\"", "\"openapi\""]) },
    // Metadata files
    ExposureCheck { path: "/.DS_Store", detail: "macOS directory metadata exposed", risk: Risk::Low, accept: FOUND, body: BodyCheck::Magic(b"\x00\x00\x00\x01Bud1") },
    ExposureCheck { path: "/crossdomain.xml", detail: "Permissive Flash cross-domain policy", risk: Risk::Medium, accept: FOUND, body: BodyCheck::Contains(&["domain=\"*\""]) },
    ExposureCheck { path: "/robots.txt", detail: "robots.txt reveals sensitive paths", risk: Risk::Medium, accept: FOUND, body: BodyCheck::Pattern(&RE_ROBOTS_SENSITIVE) },
    ExposureCheck { path: "/.well-known/security.txt", detail: "Security.txt present", risk: Risk::Low, accept: FOUND, body: BodyCheck::Contains(&["Contact:"]) },
];

/// Markers of an auto-generated directory index.
pub const DIRECTORY_LISTING_MARKERS: &[&str] = &["Index of /", "Directory listing for"];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn check(name: &str, value: &str) -> Result<String, String> {
        (header_policy(name).unwrap().check)(value)
    }

    #[test]
    fn hsts_requires_max_age_floor() {
        assert!(check("strict-transport-security", "max-age=31536000; includeSubDomains").is_ok());
        assert!(check("Strict-Transport-Security", "MAX-AGE=\"63072000\"").is_ok());
        let weak = check("Strict-Transport-Security", "max-age=300").unwrap_err();
        assert!(weak.contains("below"));
        assert!(check("Strict-Transport-Security", "includeSubDomains").is_err());
        assert!(check("Strict-Transport-Security", "max-age=abc").is_err());
    }

    #[test]
    fn csp_flags_unsafe_sources() {
        assert!(check("Content-Security-Policy", "default-src 'self'").is_ok());
        let note = check("Content-Security-Policy", "script-src 'self' 'unsafe-inline'").unwrap_err();
        assert!(note.contains("'unsafe-inline'"));
    }

    #[test]
    fn frame_content_type_referrer_and_permissions() {
        assert!(check("X-Frame-Options", "sameorigin").is_ok());
        assert!(check("X-Frame-Options", "ALLOW-FROM https://a.example").is_err());
        assert!(check("X-Content-Type-Options", "nosniff").is_ok());
        assert!(check("X-Content-Type-Options", "sniff").is_err());
        assert!(check("Referrer-Policy", "no-referrer, strict-origin-when-cross-origin").is_ok());
        assert!(check("Referrer-Policy", "unsafe-url").is_err());
        assert!(check("Permissions-Policy", "camera=()").is_ok());
        assert!(check("Permissions-Policy", " ").is_err());
    }

    #[test]
    fn catalogue_is_large_and_unique() {
        assert!(EXPOSURE_CATALOGUE.len() >= 30);
        let paths: HashSet<_> = EXPOSURE_CATALOGUE.iter().map(|p| p.path).collect();
        assert_eq!(paths.len(), EXPOSURE_CATALOGUE.len());
        assert!(EXPOSURE_CATALOGUE.iter().all(|p| p.path.starts_with('/')));
    }

    #[test]
    fn body_checks() {
        assert!(BodyCheck::Contains(&["[core]"]).matches(b"[core]\n\trepositoryformatversion = 0"));
        assert!(BodyCheck::Pattern(&RE_ENV_ASSIGNMENT).matches(b"APP_KEY=base64:abc\nDEBUG=true"));
        assert!(!BodyCheck::Pattern(&RE_ENV_ASSIGNMENT).matches(b"<html><body>Hello</body></html>"));
        assert!(BodyCheck::Magic(GZIP_MAGIC).matches(&[0x1f, 0x8b, 0x08, 0x00]));
        assert!(!BodyCheck::Magic(ZIP_MAGIC).matches(b"<html>"));
        assert!(BodyCheck::Pattern(&RE_ROBOTS_SENSITIVE).matches(b"User-agent: *\nDisallow: /admin/"));
    }

    #[test]
    fn favicon_lookup() {
        assert_eq!(favicon_technology(81586312), Some("Jenkins"));
        assert_eq!(favicon_technology(1), None);
    }
}
