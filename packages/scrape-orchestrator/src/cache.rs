//! In-memory result cache with per-entry TTL.
//!
//! Staleness is enforced lazily: a read of an expired entry evicts it and
//! reports a miss. There is no background sweeper and reads never extend an
//! entry's lifetime.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::types::kind::TargetKind;
use crate::types::report::CacheStatus;

/// Cache address: fetch kind plus target URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: TargetKind,
    url: String,
}

impl CacheKey {
    pub fn new(kind: TargetKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
        }
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.cache_namespace(), self.url)
    }
}

struct CacheEntry<V> {
    data: V,
    stored_at: Instant,
    stored_at_wall: DateTime<Utc>,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }

    fn is_fresh(&self, now: Instant) -> bool {
        self.age(now) < self.ttl
    }
}

/// Thread-safe TTL cache. One mutex guards the whole map; every operation
/// is O(1) except [`TtlCache::clear_all`].
pub struct TtlCache<V> {
    entries: Mutex<HashMap<CacheKey, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fresh value for `key`, evicting the entry if it has gone stale.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries();

        match entries.get(key) {
            Some(entry) if entry.is_fresh(now) => Some(entry.data.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store `value`, replacing any previous entry and restarting its clock.
    pub fn put(&self, key: CacheKey, value: V, ttl: Duration) {
        let entry = CacheEntry {
            data: value,
            stored_at: Instant::now(),
            stored_at_wall: Utc::now(),
            ttl,
        };
        self.entries().insert(key, entry);
    }

    /// [`TtlCache::put`] with the cache's default TTL.
    pub fn insert(&self, key: CacheKey, value: V) {
        self.put(key, value, self.default_ttl);
    }

    /// Drop one entry. Returns whether an entry (fresh or stale) existed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries().remove(key).is_some()
    }

    /// Drop everything. Returns how many entries were removed.
    pub fn clear_all(&self) -> usize {
        let mut entries = self.entries();
        let count = entries.len();
        entries.clear();
        count
    }

    /// Raw presence check that ignores freshness and never evicts.
    pub fn contains_raw(&self, key: &CacheKey) -> bool {
        self.entries().contains_key(key)
    }

    /// Entries currently held, stale ones included.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Describe the entry for `key` without evicting it.
    pub fn status(&self, key: &CacheKey) -> CacheStatus {
        let now = Instant::now();
        let entries = self.entries();

        let Some(entry) = entries.get(key) else {
            return CacheStatus::not_cached();
        };

        let age = entry.age(now);
        let expires_in_ms = entry.ttl.as_millis() as i128 - age.as_millis() as i128;
        let expires_at = chrono::Duration::from_std(entry.ttl)
            .ok()
            .and_then(|ttl| entry.stored_at_wall.checked_add_signed(ttl));

        CacheStatus {
            is_cached: true,
            cached_at: Some(entry.stored_at_wall),
            expires_at,
            age_seconds: Some(age.as_secs()),
            expires_in_seconds: Some((expires_in_ms / 1000) as i64),
            expired: Some(!entry.is_fresh(now)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(url: &str) -> CacheKey {
        CacheKey::new(TargetKind::Product, url)
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_then_get_until_expiry() {
        let cache = TtlCache::new(Duration::from_secs(3600));
        cache.put(key("https://x/a"), "R", Duration::from_millis(100));

        assert_eq!(cache.get(&key("https://x/a")), Some("R"));

        tokio::time::advance(Duration::from_millis(99)).await;
        assert_eq!(cache.get(&key("https://x/a")), Some("R"));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get(&key("https://x/a")), None);
        assert!(!cache.contains_raw(&key("https://x/a")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_does_not_refresh_ttl() {
        let cache = TtlCache::new(Duration::from_millis(100));
        cache.insert(key("https://x/a"), 1);

        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(cache.get(&key("https://x/a")), Some(1));

        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(cache.get(&key("https://x/a")), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_overwrites_and_resets_clock() {
        let cache = TtlCache::new(Duration::from_millis(100));
        cache.insert(key("https://x/a"), 1);

        tokio::time::advance(Duration::from_millis(80)).await;
        cache.insert(key("https://x/a"), 2);

        tokio::time::advance(Duration::from_millis(80)).await;
        assert_eq!(cache.get(&key("https://x/a")), Some(2));
    }

    #[test]
    fn test_namespaces_do_not_collide() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let url = "https://x/fiction";
        cache.insert(CacheKey::new(TargetKind::Navigation, url), "nav");
        cache.insert(CacheKey::new(TargetKind::Category, url), "cat");

        assert_eq!(cache.get(&CacheKey::new(TargetKind::Navigation, url)), Some("nav"));
        assert_eq!(cache.get(&CacheKey::new(TargetKind::Category, url)), Some("cat"));
        assert_eq!(cache.get(&CacheKey::new(TargetKind::Product, url)), None);
        assert_eq!(CacheKey::new(TargetKind::Category, url).to_string(), "cat:https://x/fiction");
    }

    #[test]
    fn test_invalidate_and_clear_all() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert(key("a"), 1);
        cache.insert(key("b"), 2);
        cache.insert(key("c"), 3);

        assert!(cache.invalidate(&key("a")));
        assert!(!cache.invalidate(&key("a")));
        assert_eq!(cache.clear_all(), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reports_age_without_evicting() {
        let cache = TtlCache::new(Duration::from_secs(10));
        assert!(!cache.status(&key("a")).is_cached);

        cache.insert(key("a"), 1);
        tokio::time::advance(Duration::from_secs(4)).await;

        let status = cache.status(&key("a"));
        assert!(status.is_cached);
        assert_eq!(status.age_seconds, Some(4));
        assert_eq!(status.expires_in_seconds, Some(6));
        assert_eq!(status.expired, Some(false));

        tokio::time::advance(Duration::from_secs(7)).await;
        let status = cache.status(&key("a"));
        assert_eq!(status.expired, Some(true));
        assert!(cache.contains_raw(&key("a")));
    }
}
