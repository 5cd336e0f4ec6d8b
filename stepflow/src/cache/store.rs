//! Concurrent result cache with TTL expiry and a background sweep.

use super::cache_key;
use crate::core::Outcome;
use crate::utils::duration_ms;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Entry in the result cache.
#[derive(Debug, Clone)]
struct CacheEntry {
    outcome: Outcome,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that found nothing live.
    pub misses: u64,
    /// Entries removed by sweeps.
    pub swept: u64,
    /// Entries physically present, expired or not.
    pub entries: usize,
}

/// In-memory memoization layer keyed by (operation, canonical params).
///
/// Entries are never returned once their TTL has elapsed, whether or not a
/// sweep has run. The cache is non-authoritative: a miss is always safe.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    swept: AtomicU64,
}

impl ResultCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a live entry.
    #[must_use]
    pub fn get(&self, operation: &str, params: &serde_json::Value) -> Option<Outcome> {
        let key = cache_key(operation, params);
        let now = Instant::now();

        let live = self
            .entries
            .get(&key)
            .map(|entry| entry.is_live(now).then(|| entry.outcome.clone()));

        match live {
            Some(Some(outcome)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(operation, key = %key, "Cache hit");
                Some(outcome)
            }
            Some(None) => {
                // Only drop it if no writer refreshed it in the meantime.
                self.entries.remove_if(&key, |_, entry| !entry.is_live(now));
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Stores or overwrites an entry that expires `ttl` from now.
    pub fn set(&self, operation: &str, params: &serde_json::Value, outcome: Outcome, ttl: Duration) {
        let key = cache_key(operation, params);
        debug!(operation, key = %key, ttl_ms = duration_ms(ttl), "Cache store");
        self.entries.insert(
            key,
            CacheEntry {
                outcome,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Removes one entry. Returns true if it was present.
    pub fn invalidate(&self, operation: &str, params: &serde_json::Value) -> bool {
        self.entries.remove(&cache_key(operation, params)).is_some()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Physically removes every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = entry.is_live(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        self.swept.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Returns the number of physically present entries, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the current counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            swept: self.swept.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    /// Starts the periodic sweep on the current tokio runtime.
    ///
    /// The sweep runs every `interval` regardless of read/write traffic. It
    /// stops when the returned handle is dropped or the cache is dropped.
    #[must_use = "dropping the handle stops the sweeper"]
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> SweeperHandle {
        let interval = interval.max(Duration::from_millis(1));
        let cache: Weak<Self> = Arc::downgrade(self);

        info!(interval_ms = duration_ms(interval), "Starting cache sweeper");

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(cache) = cache.upgrade() else {
                    debug!("Cache dropped, stopping sweeper");
                    break;
                };

                let removed = cache.purge_expired();
                if removed > 0 {
                    debug!(removed, remaining = cache.len(), "Swept expired cache entries");
                }
            }
        });

        SweeperHandle { task }
    }
}

/// Owns the background sweep task. Aborts it on drop.
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the sweeper.
    pub fn stop(self) {
        self.task.abort();
    }

    /// Returns true once the sweep task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
