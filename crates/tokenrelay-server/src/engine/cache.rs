//! TTL-aware per-user response cache.
//!
//! The cache holds the most recent response observed for each user.
//! Writes come from exactly one place - the cache-writer bus subscription
//! in [`crate::engine::ingest`] - and overwrite unconditionally in arrival
//! order. Reads apply the freshness rule, so a stale entry is
//! indistinguishable from a missing one. Entries are never evicted;
//! staleness is filtered at read time.

use core::time::Duration;
use dashmap::DashMap;
use std::time::SystemTime;
use tokenrelay_core::record::TokenResponse;

/// Map from user identifier to the latest response for that user.
pub struct ResponseCache {
    entries: DashMap<String, TokenResponse>,
    grace: Duration,
}

impl ResponseCache {
    /// Creates an empty cache with the given grace period.
    pub fn new(grace: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            grace,
        }
    }

    /// Returns the cached response for `user` if one exists and is still
    /// fresh under the grace period.
    pub fn get(&self, user: &str) -> Option<TokenResponse> {
        self.get_at(user, SystemTime::now())
    }

    /// Freshness-checked lookup against an explicit clock reading.
    pub fn get_at(&self, user: &str, now: SystemTime) -> Option<TokenResponse> {
        let entry = self.entries.get(user)?;
        if entry.is_expired(self.grace, now) {
            return None;
        }
        Some(entry.clone())
    }

    /// Stores `response` under its user, replacing any previous entry.
    ///
    /// Last write wins by arrival order; no timestamp comparison is made.
    pub fn put(&self, response: TokenResponse) {
        self.entries.insert(response.user.clone(), response);
    }

    /// Number of entries held, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
