//! Time-to-live cache
//!
//! Entries are `(value, fetched_at)` pairs keyed by string. A lookup is valid
//! while `now - fetched_at < ttl`; expired entries are skipped on read and only
//! dropped by [`TtlCache::purge_expired`].

use crate::clock::{Clock, SystemClock};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

/// A value served from cache together with its age at read time
#[derive(Debug, Clone, Serialize)]
pub struct Cached<V> {
    #[serde(flatten)]
    pub value: V,
    pub cache_age_seconds: f64,
}

impl<V> Cached<V> {
    /// Wrap a freshly computed value
    pub fn fresh(value: V) -> Self {
        Self {
            value,
            cache_age_seconds: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    fetched_at: DateTime<Utc>,
}

/// Keyed cache with a single TTL for every entry
pub struct TtlCache<V> {
    entries: DashMap<String, Entry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache backed by the system clock
    pub fn new(ttl_seconds: u64) -> Self {
        Self::with_clock(ttl_seconds, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl_seconds: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::seconds(ttl_seconds as i64),
            clock,
        }
    }

    /// Valid lookup: a clone of the value and its age, or `None` if missing or expired
    pub fn get(&self, key: &str) -> Option<Cached<V>> {
        let entry = self.entries.get(key)?;
        let age = self.clock.now() - entry.fetched_at;
        if age >= self.ttl {
            return None;
        }
        Some(Cached {
            value: entry.value.clone(),
            cache_age_seconds: age.num_milliseconds().max(0) as f64 / 1000.0,
        })
    }

    /// Insert or replace, stamping the entry with the current time
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.entries.insert(
            key.into(),
            Entry {
                value,
                fetched_at: self.clock.now(),
            },
        );
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = now - entry.fetched_at < self.ttl;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_set_then_get_is_fresh() {
        let clock = manual_clock();
        let cache: TtlCache<String> = TtlCache::with_clock(300, clock.clone());

        cache.set("price:defi", "v".to_string());
        let hit = cache.get("price:defi").unwrap();
        assert_eq!(hit.value, "v");
        assert_eq!(hit.cache_age_seconds, 0.0);
    }

    #[test]
    fn test_age_is_computed_at_read_time() {
        let clock = manual_clock();
        let cache: TtlCache<u32> = TtlCache::with_clock(300, clock.clone());

        cache.set("k", 7);
        clock.advance(Duration::seconds(42));
        assert_eq!(cache.get("k").unwrap().cache_age_seconds, 42.0);

        clock.advance(Duration::seconds(8));
        assert_eq!(cache.get("k").unwrap().cache_age_seconds, 50.0);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let clock = manual_clock();
        let cache: TtlCache<u32> = TtlCache::with_clock(300, clock.clone());

        cache.set("k", 1);
        clock.advance(Duration::seconds(301));
        assert!(cache.get("k").is_none());
        // Lazy expiry: still stored until purged
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_entry_expires_exactly_at_ttl() {
        let clock = manual_clock();
        let cache: TtlCache<u32> = TtlCache::with_clock(10, clock.clone());

        cache.set("k", 1);
        clock.advance(Duration::milliseconds(9_999));
        assert!(cache.get("k").is_some());
        clock.advance(Duration::milliseconds(1));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_set_replaces_and_restamps() {
        let clock = manual_clock();
        let cache: TtlCache<u32> = TtlCache::with_clock(60, clock.clone());

        cache.set("k", 1);
        clock.advance(Duration::seconds(59));
        cache.set("k", 2);
        clock.advance(Duration::seconds(30));

        let hit = cache.get("k").unwrap();
        assert_eq!(hit.value, 2);
        assert_eq!(hit.cache_age_seconds, 30.0);
    }

    #[test]
    fn test_returned_value_is_a_copy() {
        let clock = manual_clock();
        let cache: TtlCache<Vec<u32>> = TtlCache::with_clock(60, clock);

        cache.set("k", vec![1, 2]);
        let mut hit = cache.get("k").unwrap();
        hit.value.push(3);
        assert_eq!(cache.get("k").unwrap().value, vec![1, 2]);
    }

    #[test]
    fn test_purge_expired() {
        let clock = manual_clock();
        let cache: TtlCache<u32> = TtlCache::with_clock(60, clock.clone());

        cache.set("old", 1);
        clock.advance(Duration::seconds(61));
        cache.set("new", 2);

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("new").is_some());
    }

    #[test]
    fn test_purge_counts_only_what_it_removed() {
        let clock = manual_clock();
        let cache: TtlCache<u32> = TtlCache::with_clock(60, clock.clone());

        assert_eq!(cache.purge_expired(), 0);

        cache.set("a", 1);
        cache.set("b", 2);
        clock.advance(Duration::seconds(60));
        // Entries written after the purge starts are not counted
        cache.set("c", 3);

        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.purge_expired(), 0);
        assert_eq!(cache.len(), 1);
    }
}
