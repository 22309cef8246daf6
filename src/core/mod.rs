// src/core/mod.rs

// The scan engine. `scanner` holds the analyzers and the orchestrator; the
// other modules are the pieces they share.

/// Data structures produced and consumed by the analyzers, up to `ScanResult`.
pub mod models;

/// The analyzers (fetch, headers, TLS, fingerprinting, exposures) and the
/// `Scanner` that runs them together.
pub mod scanner;

/// Static reference data: header policy, favicon hashes, exposure catalogue.
pub mod knowledge_base;

pub mod cache;
pub mod clock;
pub mod rate_limit;
pub mod report;
pub mod risk;
pub mod target;
