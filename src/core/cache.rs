// src/core/cache.rs

//! Per-target result cache with TTL expiry.

use crate::core::clock::Clock;
use crate::core::models::ScanResult;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    result: Arc<ScanResult>,
    expires_at: DateTime<Utc>,
}

/// Maps a normalized target to its most recent `ScanResult`.
///
/// Writes are last-writer-wins; a store always resets the TTL. An expired
/// entry goes away when its key is looked up, or on the next store of any key.
pub struct ResultCache {
    entries: DashMap<String, CacheEntry>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            clock,
        }
    }

    /// Returns the stored result unchanged if it has not expired.
    pub fn get(&self, key: &str) -> Option<ScanResult> {
        let now = self.clock.now();
        let hit = {
            let entry = self.entries.get(key)?;
            if entry.expires_at > now {
                Some(Arc::clone(&entry.result))
            } else {
                None
            }
        };
        match hit {
            Some(result) => {
                debug!(key, "Cache hit.");
                Some(result.as_ref().clone())
            }
            None => {
                // Only drop the entry if nobody refreshed it in between.
                self.entries.remove_if(key, |_, e| e.expires_at <= now);
                debug!(key, "Cache entry expired.");
                None
            }
        }
    }

    pub fn insert(&self, key: &str, result: ScanResult) {
        if self.ttl <= chrono::Duration::zero() {
            return;
        }
        let purged = self.purge_expired();
        if purged > 0 {
            debug!(purged, "Evicted expired cache entries.");
        }
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.entries.insert(
            key.to_string(),
            CacheEntry { result: Arc::new(result), expires_at },
        );
        debug!(key, "Stored scan result in cache.");
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
