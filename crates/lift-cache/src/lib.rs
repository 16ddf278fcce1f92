//! Per-account TTL cache for remotely fetched datasets.
//!
//! Freshness is evaluated lazily at read time; stale entries stay in the map
//! and are simply ignored until the next `put` overwrites them. Cardinality is
//! one entry per signed-in account, so there is no size bound and no
//! background eviction.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

pub const CRATE_NAME: &str = "lift-cache";

/// Freshness window used by the dashboard for offers and sales data.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct Entry<T> {
    data: T,
    stored_at: Instant,
}

/// Time-expiring store keyed by account identifier.
///
/// The clock is an explicit argument on every call so expiry is testable
/// without sleeping; callers outside tests pass `Instant::now()`.
#[derive(Debug, Clone)]
pub struct TtlCache<T> {
    ttl: Duration,
    entries: HashMap<String, Entry<T>>,
}

impl<T> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached data for `account` only while it is fresh. A stale
    /// entry behaves exactly like an absent one.
    pub fn get(&self, account: &str, now: Instant) -> Option<&T> {
        match self.entries.get(account) {
            Some(entry) if now.duration_since(entry.stored_at) < self.ttl => {
                debug!(account, "cache hit");
                Some(&entry.data)
            }
            Some(_) => {
                debug!(account, "cache entry stale");
                None
            }
            None => {
                debug!(account, "cache miss");
                None
            }
        }
    }

    /// Stores `data` for `account`, overwriting any prior entry and resetting
    /// its freshness window.
    pub fn put(&mut self, account: &str, data: T, now: Instant) {
        self.entries.insert(
            account.to_string(),
            Entry {
                data,
                stored_at: now,
            },
        );
    }

    /// Drops the entry for `account`, fresh or not. Used after mutations that
    /// invalidate the server-side dataset.
    pub fn invalidate(&mut self, account: &str) {
        if self.entries.remove(account).is_some() {
            debug!(account, "cache entry invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_right_after_put_returns_data() {
        let mut cache = TtlCache::new(Duration::from_secs(300));
        let now = Instant::now();
        cache.put("acct-1", vec![1, 2, 3], now);
        assert_eq!(cache.get("acct-1", now), Some(&vec![1, 2, 3]));
    }

    #[test]
    fn stale_entry_behaves_as_absent_without_explicit_evict() {
        let mut cache = TtlCache::new(Duration::from_secs(300));
        let stored = Instant::now();
        cache.put("acct-1", "offers".to_string(), stored);

        let just_before_expiry = stored + Duration::from_secs(299);
        assert!(cache.get("acct-1", just_before_expiry).is_some());

        let at_expiry = stored + Duration::from_secs(300);
        assert!(cache.get("acct-1", at_expiry).is_none());
    }

    #[test]
    fn put_overwrites_and_resets_freshness() {
        let mut cache = TtlCache::new(Duration::from_secs(300));
        let t0 = Instant::now();
        cache.put("acct-1", 1u32, t0);

        let t1 = t0 + Duration::from_secs(299);
        cache.put("acct-1", 2u32, t1);

        let t2 = t0 + Duration::from_secs(400);
        assert_eq!(cache.get("acct-1", t2), Some(&2));
    }

    #[test]
    fn accounts_are_isolated() {
        let mut cache = TtlCache::new(Duration::from_secs(300));
        let now = Instant::now();
        cache.put("acct-1", "a", now);
        assert!(cache.get("acct-2", now).is_none());
    }

    #[test]
    fn invalidate_drops_fresh_entries() {
        let mut cache = TtlCache::new(Duration::from_secs(300));
        let now = Instant::now();
        cache.put("acct-1", "a", now);
        cache.invalidate("acct-1");
        assert!(cache.get("acct-1", now).is_none());
    }
}
