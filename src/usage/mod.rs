//! Durable per-user-per-day usage counters.
//!
//! One [`UsageRecord`] per (user, UTC calendar day), created lazily on
//! first use. Backed by Redis when configured, using atomic `HINCRBY` so
//! concurrent increments for the same user never lose updates; the
//! in-memory fallback is read-modify-write under a mutex, where lost
//! updates under same-user concurrency are tolerated (rare and
//! low-stakes) but blocking indefinitely is not.

pub mod guest;

use std::collections::HashMap;

use chrono::NaiveDate;
use parking_lot::Mutex;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::entitlement::ActionKind;

/// Counter records expire two days after creation; a record is only ever
/// read for the current day.
const RECORD_TTL_SECS: i64 = 2 * 86_400;

/// Usage counters for one user on one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Plain searches used today.
    pub searches_used: u32,
    /// Deep searches used today.
    pub deep_searches_used: u32,
}

impl UsageRecord {
    /// The counter for the given action kind.
    pub fn used(&self, kind: ActionKind) -> u32 {
        match kind {
            ActionKind::Search => self.searches_used,
            ActionKind::DeepSearch => self.deep_searches_used,
        }
    }
}

/// The current UTC calendar day. The single place that fixes which
/// calendar the daily counters roll over on.
pub fn day_key() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

fn counter_field(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Search => "searches",
        ActionKind::DeepSearch => "deep_searches",
    }
}

/// Durable usage counter store.
pub struct UsageStore {
    backend: Backend,
}

enum Backend {
    Redis(redis::aio::ConnectionManager),
    Memory(Mutex<HashMap<(String, NaiveDate), UsageRecord>>),
}

impl std::fmt::Debug for UsageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match self.backend {
            Backend::Redis(_) => "redis",
            Backend::Memory(_) => "memory",
        };
        f.debug_struct("UsageStore").field("backend", &backend).finish()
    }
}

impl UsageStore {
    /// Create a Redis-backed store.
    pub fn redis(conn: redis::aio::ConnectionManager) -> Self {
        Self {
            backend: Backend::Redis(conn),
        }
    }

    /// Create an in-memory store (single-process fallback).
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Mutex::new(HashMap::new())),
        }
    }

    fn redis_key(user_id: &str, date: NaiveDate) -> String {
        format!("usage:{user_id}:{date}")
    }

    /// Get the record for (user, day); zero-valued if absent.
    pub async fn get(&self, user_id: &str, date: NaiveDate) -> anyhow::Result<UsageRecord> {
        match &self.backend {
            Backend::Redis(conn) => {
                let mut conn = conn.clone();
                let key = Self::redis_key(user_id, date);
                let (searches, deep): (Option<u32>, Option<u32>) = redis::cmd("HMGET")
                    .arg(&key)
                    .arg("searches")
                    .arg("deep_searches")
                    .query_async(&mut conn)
                    .await?;
                Ok(UsageRecord {
                    searches_used: searches.unwrap_or(0),
                    deep_searches_used: deep.unwrap_or(0),
                })
            }
            Backend::Memory(map) => Ok(map
                .lock()
                .get(&(user_id.to_string(), date))
                .copied()
                .unwrap_or_default()),
        }
    }

    /// Increment the counter for the given action kind, preserving the
    /// other counter, and return the updated record.
    pub async fn increment(
        &self,
        user_id: &str,
        date: NaiveDate,
        kind: ActionKind,
    ) -> anyhow::Result<UsageRecord> {
        match &self.backend {
            Backend::Redis(conn) => {
                let mut conn = conn.clone();
                let key = Self::redis_key(user_id, date);
                let count: i64 = conn.hincr(&key, counter_field(kind), 1).await?;

                // Set expiry when the record is first created
                if count == 1 {
                    let _: () = conn.expire(&key, RECORD_TTL_SECS).await.unwrap_or(());
                }

                self.get(user_id, date).await
            }
            Backend::Memory(map) => {
                let mut map = map.lock();
                let record = map.entry((user_id.to_string(), date)).or_default();
                match kind {
                    ActionKind::Search => record.searches_used += 1,
                    ActionKind::DeepSearch => record.deep_searches_used += 1,
                }
                Ok(*record)
            }
        }
    }

    /// Reset the record for (user, day). Only called on explicit
    /// plan-change events.
    pub async fn reset(&self, user_id: &str, date: NaiveDate) -> anyhow::Result<()> {
        match &self.backend {
            Backend::Redis(conn) => {
                let mut conn = conn.clone();
                let key = Self::redis_key(user_id, date);
                let _: () = conn.del(&key).await?;
                Ok(())
            }
            Backend::Memory(map) => {
                map.lock().remove(&(user_id.to_string(), date));
                Ok(())
            }
        }
    }
}
