// src/lib.rs

//! Passive web exposure scanning: fetch a target once, grade its security
//! headers, inspect its certificate, fingerprint its stack, request a catalogue
//! of commonly exposed paths, and fold everything into one risk verdict.

pub mod config;
pub mod core;
pub mod error;
pub mod logging;

pub use crate::config::ScanConfig;
pub use crate::core::models::{RiskLevel, ScanResult};
pub use crate::core::report::{JsonRenderer, ReportFormat, ReportRenderer, TextRenderer};
pub use crate::core::scanner::{Scanner, ScannerBuilder};
pub use crate::error::{ErrorBody, FetchFailure, Result, ScanError};
