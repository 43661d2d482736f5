//! Process-local guest usage tracking.
//!
//! Guests have no durable identity, so their counters live in a
//! process-local map keyed by fingerprint. Entries idle for more than 24h
//! are swept opportunistically at the start of each inbound request
//! rather than on a background timer, since the host may not guarantee a
//! persistent scheduler. Not shared across process instances; a known
//! scaling limitation of the guest tier.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Usage entry for one guest fingerprint.
#[derive(Debug, Clone, Copy)]
pub struct GuestUsageEntry {
    /// Plain searches recorded.
    pub searches: u32,
    /// Deep searches recorded (always zero; guests cannot deep-search).
    pub deep_searches: u32,
    /// Last activity, for TTL eviction.
    pub last_seen: DateTime<Utc>,
}

impl Default for GuestUsageEntry {
    fn default() -> Self {
        Self {
            searches: 0,
            deep_searches: 0,
            last_seen: Utc::now(),
        }
    }
}

/// In-process counter map for unauthenticated identities.
#[derive(Debug, Default)]
pub struct GuestUsageTracker {
    entries: Mutex<HashMap<u64, GuestUsageEntry>>,
}

impl GuestUsageTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entry for a fingerprint; zero-valued default if absent.
    pub fn get(&self, fingerprint: u64) -> GuestUsageEntry {
        self.entries
            .lock()
            .get(&fingerprint)
            .copied()
            .unwrap_or_default()
    }

    /// Record a search for a fingerprint, refreshing its last-seen time.
    ///
    /// Called immediately at admission: with no durable record to charge
    /// post-hoc, guests are charged up front.
    pub fn record_search(&self, fingerprint: u64) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(fingerprint).or_default();
        entry.searches += 1;
        entry.last_seen = Utc::now();
    }

    /// Remove entries idle for more than 24 hours.
    pub fn sweep(&self) {
        let cutoff = Utc::now() - Duration::hours(24);
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.last_seen >= cutoff);
        let evicted = before - entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = entries.len(), "Swept stale guest entries");
        }
    }

    /// Number of tracked fingerprints.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the tracker is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
