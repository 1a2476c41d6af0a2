//! Memoized web-search summaries.
//!
//! Keys are normalized (trim + lowercase) before lookup and insert, so
//! `"  Foo "` and `"foo"` share one entry. The in-memory implementation is
//! an LRU with a configurable capacity and optional TTL; the stored entry
//! keeps the original query string for inspection.
//!
//! Two concurrent misses for the same query can both perform a live search
//! and both write — last write wins. That race is accepted; the cache is an
//! optimization, not a correctness boundary.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

use crate::config::CacheConfig;
use crate::types::SearchCacheEntry;

/// Canonical cache key for a query.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Key-value store for summarized search answers. Write failures are
/// recoverable: the engine logs them and only forfeits future hits.
#[async_trait]
pub trait SearchCache: Send + Sync {
    async fn get(&self, query: &str) -> Result<Option<SearchCacheEntry>>;
    async fn put(&self, query: &str, summary: &str, timestamp: DateTime<Utc>) -> Result<()>;
}

/// In-memory LRU cache with optional TTL.
pub struct MemorySearchCache {
    entries: Mutex<LruCache<String, SearchCacheEntry>>,
    ttl: Option<Duration>,
}

impl MemorySearchCache {
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        let ttl = config
            .ttl_secs
            .map(|secs| Duration::seconds(secs.min(i64::MAX as u64) as i64));
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn expired(&self, entry: &SearchCacheEntry) -> bool {
        match self.ttl {
            Some(ttl) => Utc::now() - entry.timestamp > ttl,
            None => false,
        }
    }
}

#[async_trait]
impl SearchCache for MemorySearchCache {
    async fn get(&self, query: &str) -> Result<Option<SearchCacheEntry>> {
        let key = normalize_query(query);
        let mut entries = self.entries.lock();
        let hit = entries.get(&key).cloned();
        match hit {
            Some(entry) if self.expired(&entry) => {
                entries.pop(&key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry)),
            None => Ok(None),
        }
    }

    async fn put(&self, query: &str, summary: &str, timestamp: DateTime<Utc>) -> Result<()> {
        let entry = SearchCacheEntry {
            query: query.to_string(),
            summary: summary.to_string(),
            timestamp,
        };
        self.entries.lock().put(normalize_query(query), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize, ttl_secs: Option<u64>) -> MemorySearchCache {
        MemorySearchCache::new(&CacheConfig { capacity, ttl_secs })
    }

    #[tokio::test]
    async fn hit_returns_the_stored_summary_and_original_query() {
        let cache = cache(8, None);
        cache
            .put("What is the capital of X?", "The capital is Y.", Utc::now())
            .await
            .unwrap();
        let entry = cache.get("What is the capital of X?").await.unwrap().unwrap();
        assert_eq!(entry.summary, "The capital is Y.");
        assert_eq!(entry.query, "What is the capital of X?");
    }

    #[tokio::test]
    async fn key_is_normalized_on_both_sides() {
        let cache = cache(8, None);
        cache.put("  Foo Bar ", "answer", Utc::now()).await.unwrap();
        assert!(cache.get("foo bar").await.unwrap().is_some());
        assert!(cache.get("FOO BAR").await.unwrap().is_some());
        assert!(cache.get("foo baz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_write_wins_for_the_same_key() {
        let cache = cache(8, None);
        cache.put("q", "first", Utc::now()).await.unwrap();
        cache.put("q", "second", Utc::now()).await.unwrap();
        let entry = cache.get("q").await.unwrap().unwrap();
        assert_eq!(entry.summary, "second");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn capacity_bound_evicts_least_recently_used() {
        let cache = cache(2, None);
        cache.put("a", "1", Utc::now()).await.unwrap();
        cache.put("b", "2", Utc::now()).await.unwrap();
        cache.put("c", "3", Utc::now()).await.unwrap();
        assert!(cache.get("a").await.unwrap().is_none());
        assert!(cache.get("b").await.unwrap().is_some());
        assert!(cache.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn expired_entry_reads_as_a_miss() {
        let cache = cache(8, Some(60));
        let stale = Utc::now() - Duration::seconds(120);
        cache.put("old question", "old answer", stale).await.unwrap();
        assert!(cache.get("old question").await.unwrap().is_none());
        // Expired entry is dropped, not just hidden.
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn no_ttl_means_no_expiry() {
        let cache = cache(8, None);
        let stale = Utc::now() - Duration::days(365);
        cache.put("old", "answer", stale).await.unwrap();
        assert!(cache.get("old").await.unwrap().is_some());
    }
}
