// src/config.rs

//! Runtime options for the scanner.
//!
//! Values are layered: built-in defaults, then an optional TOML file with a
//! `[scan]` table, then `VULNVISION_*` environment variables.

use crate::error::{Result, ScanError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const ENV_PREFIX: &str = "VULNVISION_";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    pub cache_ttl_seconds: u64,
    pub rate_limit_per_minute: u32,
    pub fetch_timeout_seconds: u64,
    pub max_redirects: usize,
    pub exposure_timeout_seconds: u64,
    /// Overall deadline for one scan, cache hits excluded.
    pub scan_deadline_seconds: u64,
    /// Response bodies longer than this are truncated, not rejected.
    pub max_body_bytes: usize,
    pub favicon_max_bytes: usize,
    pub max_concurrent_scans: usize,
    pub exposure_concurrency: usize,
    pub tls_port: u16,
    pub tls_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 120,
            rate_limit_per_minute: 30,
            fetch_timeout_seconds: 8,
            max_redirects: 5,
            exposure_timeout_seconds: 3,
            scan_deadline_seconds: 20,
            max_body_bytes: 2 * 1024 * 1024,
            favicon_max_bytes: 128 * 1024,
            max_concurrent_scans: 8,
            exposure_concurrency: 8,
            tls_port: 443,
            tls_timeout_seconds: 5,
            user_agent: "VulnVision/1.0".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    scan: Option<ScanConfig>,
}

impl ScanConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(std::env::vars())?;
        Ok(config)
    }

    /// Loads a TOML file, then applies environment overrides on top.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ScanError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env(std::env::vars())?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: FileConfig =
            toml::from_str(content).map_err(|e| ScanError::Config(e.to_string()))?;
        let config = file.scan.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Applies every `VULNVISION_<OPTION>` pair found in `vars`.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(option) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.trim();
            match option {
                "CACHE_TTL_SECONDS" => self.cache_ttl_seconds = parse_env(&key, value)?,
                "RATE_LIMIT_PER_MINUTE" => self.rate_limit_per_minute = parse_env(&key, value)?,
                "FETCH_TIMEOUT_SECONDS" => self.fetch_timeout_seconds = parse_env(&key, value)?,
                "MAX_REDIRECTS" => self.max_redirects = parse_env(&key, value)?,
                "EXPOSURE_TIMEOUT_SECONDS" => {
                    self.exposure_timeout_seconds = parse_env(&key, value)?
                }
                "SCAN_DEADLINE_SECONDS" => self.scan_deadline_seconds = parse_env(&key, value)?,
                "MAX_BODY_BYTES" => self.max_body_bytes = parse_env(&key, value)?,
                "FAVICON_MAX_BYTES" => self.favicon_max_bytes = parse_env(&key, value)?,
                "MAX_CONCURRENT_SCANS" => self.max_concurrent_scans = parse_env(&key, value)?,
                "EXPOSURE_CONCURRENCY" => self.exposure_concurrency = parse_env(&key, value)?,
                "TLS_PORT" => self.tls_port = parse_env(&key, value)?,
                "TLS_TIMEOUT_SECONDS" => self.tls_timeout_seconds = parse_env(&key, value)?,
                "USER_AGENT" => self.user_agent = value.to_string(),
                // Consumed by the logging setup.
                "LOGLEVEL" => {}
                _ => debug!(variable = %key, "Ignoring unknown configuration variable."),
            }
        }
        self.validate()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let positive = [
            ("fetch_timeout_seconds", self.fetch_timeout_seconds),
            ("exposure_timeout_seconds", self.exposure_timeout_seconds),
            ("scan_deadline_seconds", self.scan_deadline_seconds),
            ("tls_timeout_seconds", self.tls_timeout_seconds),
            ("max_concurrent_scans", self.max_concurrent_scans as u64),
            ("exposure_concurrency", self.exposure_concurrency as u64),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ScanError::Config(format!("{name} must be greater than zero")));
        }
        if self.user_agent.is_empty() {
            return Err(ScanError::Config("user_agent must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    pub fn exposure_timeout(&self) -> Duration {
        Duration::from_secs(self.exposure_timeout_seconds)
    }

    pub fn scan_deadline(&self) -> Duration {
        Duration::from_secs(self.scan_deadline_seconds)
    }

    pub fn tls_timeout(&self) -> Duration {
        Duration::from_secs(self.tls_timeout_seconds)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ScanError::Config(format!("{key} has an invalid value: {value:?}")))
}
