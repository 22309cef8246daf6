// src/error.rs

//! Error taxonomy for the scan pipeline.
//!
//! Only fatal conditions live here. Analyzer-local failures (TLS handshake,
//! favicon fetch, a single exposure path) are absorbed at the analyzer
//! boundary and never become a `ScanError`.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use thiserror::Error;

/// Why the primary fetch (or the origin as a whole) could not be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FetchFailure {
    Timeout,
    Dns,
    ConnectionRefused,
    TlsError,
    TooManyRedirects,
    /// Any other transport failure (reset, body read error, ...).
    Connection,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid target: {0}")]
    Validation(String),

    #[error("rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("target could not be fetched ({reason})")]
    Fetch { reason: FetchFailure, detail: String },

    #[error("scan did not finish within {seconds}s")]
    Timeout { seconds: u64 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("report rendering failed: {0}")]
    Render(String),
}

impl ScanError {
    /// Stable, machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ScanError::Validation(_) => "validation_error",
            ScanError::RateLimited { .. } => "rate_limited",
            ScanError::Fetch { .. } => "fetch_error",
            ScanError::Timeout { .. } => "scan_timeout",
            ScanError::Config(_) => "config_error",
            ScanError::Render(_) => "render_error",
        }
    }

    /// The fetch reason code, when this is a fetch failure.
    pub fn fetch_reason(&self) -> Option<FetchFailure> {
        match self {
            ScanError::Fetch { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Whether the caller can fix the problem by changing the input.
    pub fn is_user_error(&self) -> bool {
        matches!(self, ScanError::Validation(_))
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

/// Serializable form of a fatal error as it crosses the system boundary.
/// The `detail` of fetch failures stays in the logs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, ScanError>;
