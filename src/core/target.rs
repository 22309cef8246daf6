// src/core/target.rs

//! Turns user input into the canonical URL every later stage works from.

use crate::error::{Result, ScanError};
use std::fmt;
use url::Url;

/// A normalized scan target. Its string form is also the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    url: Url,
}

impl Target {
    /// Accepts a bare hostname (`example.com`) or an absolute `http`/`https`
    /// URL. Scheme and host come out lower-cased and any fragment is dropped.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ScanError::Validation("target must not be empty".to_string()));
        }

        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };

        let mut url = Url::parse(&candidate)
            .map_err(|e| ScanError::Validation(format!("malformed target {trimmed:?}: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ScanError::Validation(format!(
                "unsupported scheme {:?}, only http and https are allowed",
                url.scheme()
            )));
        }
        match url.host_str() {
            Some(host) if !host.is_empty() => {}
            _ => {
                return Err(ScanError::Validation(format!(
                    "target {trimmed:?} has no host"
                )));
            }
        }
        url.set_fragment(None);

        Ok(Self { url })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn host(&self) -> &str {
        // Guaranteed by `parse`.
        self.url.host_str().unwrap_or_default()
    }

    /// `scheme://host[:port]` without a trailing slash.
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    /// Absolute URL for `path` on this target's origin.
    pub fn join_origin(&self, path: &str) -> String {
        format!("{}/{}", self.origin(), path.trim_start_matches('/'))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_domain_gets_https() {
        let target = Target::parse("  Example.COM ").unwrap();
        assert_eq!(target.as_str(), "https://example.com/");
        assert_eq!(target.host(), "example.com");
    }

    #[test]
    fn scheme_and_host_are_lowercased_path_is_kept() {
        let target = Target::parse("HTTP://WWW.Example.com:8080/Admin?x=1#top").unwrap();
        assert_eq!(target.as_str(), "http://www.example.com:8080/Admin?x=1");
        assert_eq!(target.origin(), "http://www.example.com:8080");
        assert_eq!(
            target.join_origin("/.git/config"),
            "http://www.example.com:8080/.git/config"
        );
    }

    #[test]
    fn rejects_empty_and_hostless_input() {
        for raw in ["", "   ", "https://"] {
            let err = Target::parse(raw).unwrap_err();
            assert_eq!(err.code(), "validation_error", "input {raw:?}");
        }
    }

    #[test]
    fn rejects_other_schemes() {
        let err = Target::parse("ftp://files.example.com").unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn same_site_spelled_differently_normalizes_identically() {
        let a = Target::parse("example.com").unwrap();
        let b = Target::parse("HTTPS://EXAMPLE.com/").unwrap();
        assert_eq!(a, b);
    }
}
