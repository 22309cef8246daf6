// src/core/rate_limit.rs

//! Process-wide admission gate for new scans.

use crate::core::clock::Clock;
use crate::error::{Result, ScanError};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

#[derive(Debug)]
struct Window {
    started_at: DateTime<Utc>,
    admitted: u32,
}

/// Fixed-window counter: at most `quota` admissions per `window`.
/// Consulted only for scans that miss the cache.
pub struct RateLimiter {
    quota: u32,
    window: chrono::Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<Window>,
}

impl RateLimiter {
    pub fn with_clock(quota: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            quota,
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX),
            clock,
            state: Mutex::new(Window { started_at, admitted: 0 }),
        }
    }

    /// Admits one scan start or fails with `RateLimited`.
    pub fn try_acquire(&self) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if now.signed_duration_since(state.started_at) >= self.window {
            state.started_at = now;
            state.admitted = 0;
        }

        if state.admitted < self.quota {
            state.admitted += 1;
            return Ok(());
        }

        let remaining = self.window - now.signed_duration_since(state.started_at);
        // Round up so a client never retries a fraction of a second early.
        let retry_after_secs = (remaining.num_milliseconds().max(0) as u64).div_ceil(1000);
        warn!(quota = self.quota, retry_after_secs, "Scan rejected by rate limiter.");
        Err(ScanError::RateLimited { retry_after_secs })
    }

    /// Admissions left in the current window.
    pub fn remaining(&self) -> u32 {
        let now = self.clock.now();
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if now.signed_duration_since(state.started_at) >= self.window {
            self.quota
        } else {
            self.quota.saturating_sub(state.admitted)
        }
    }
}
