//! Path-keyed fetch cache with time-based freshness.
//!
//! Every single-document fetch the resolver issues goes through this
//! cache. An entry holds the in-flight (or completed) fetch as a shared
//! future, so concurrent requests for the same reference await one
//! underlying store call instead of racing duplicates. Entries expire
//! lazily: a request after the freshness window reissues the fetch and
//! overwrites the entry.
//!
//! The cache never distinguishes "not found" from "found": a fetch that
//! resolved to a missing document is cached like any other and not
//! retried until its entry expires. There is no eviction beyond lazy
//! replacement on expiry; callers needing bounded memory call
//! [`FetchCache::clear`] or drop the owning context.
use crate::error::{GraphError, GraphResult};
use crate::store::DocumentStore;
use crate::types::{DocRef, Snapshot};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default freshness window: 3000 ms.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_millis(3000);

/// A deduplicated in-flight or completed fetch.
///
/// Cloning is cheap; every clone awaits the same underlying store call.
/// Results are Arc-wrapped so all callers share one snapshot.
pub type SharedFetch = Shared<BoxFuture<'static, Result<Arc<Snapshot>, Arc<GraphError>>>>;

/// One cache slot: the shared fetch and when it was issued.
#[derive(Clone)]
struct CacheEntry {
    fetch: SharedFetch,
    issued_at: Instant,
}

/// Path-keyed store of recent single-document fetches.
#[derive(Default)]
pub struct FetchCache {
    /// Document path → cached fetch
    entries: DashMap<String, CacheEntry>,

    /// Freshness window in milliseconds
    window_ms: AtomicU64,
}

impl FetchCache {
    /// Create a cache with the default freshness window.
    pub fn new() -> Self {
        let cache = Self {
            entries: DashMap::new(),
            window_ms: AtomicU64::new(0),
        };
        cache.set_freshness_window(DEFAULT_FRESHNESS_WINDOW);
        cache
    }

    /// Replace the freshness window.
    pub fn set_freshness_window(&self, window: Duration) {
        self.window_ms
            .store(window.as_millis() as u64, Ordering::Relaxed);
    }

    /// The current freshness window.
    pub fn freshness_window(&self) -> Duration {
        Duration::from_millis(self.window_ms.load(Ordering::Relaxed))
    }

    /// Number of cached entries (fresh or expired).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all cached entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Return the cached fetch for a reference, issuing a new one when
    /// absent or expired.
    ///
    /// The returned future is shared: all callers within the freshness
    /// window observe the same store call and the same result.
    pub fn get_or_fetch(&self, store: Arc<dyn DocumentStore>, doc_ref: &DocRef) -> SharedFetch {
        let window = self.freshness_window();
        match self.entries.entry(doc_ref.path().to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().issued_at.elapsed() < window {
                    return occupied.get().fetch.clone();
                }
                let entry = Self::issue(store, doc_ref.clone());
                let fetch = entry.fetch.clone();
                occupied.insert(entry);
                fetch
            }
            Entry::Vacant(vacant) => {
                let entry = Self::issue(store, doc_ref.clone());
                let fetch = entry.fetch.clone();
                vacant.insert(entry);
                fetch
            }
        }
    }

    /// Convenience wrapper: await the shared fetch, de-Arc'ing errors
    /// into a caller-owned [`GraphError`].
    pub async fn fetch(
        &self,
        store: Arc<dyn DocumentStore>,
        doc_ref: &DocRef,
    ) -> GraphResult<Arc<Snapshot>> {
        self.get_or_fetch(store, doc_ref)
            .await
            .map_err(|e| GraphError::FetchFailed {
                path: doc_ref.path().to_string(),
                reason: e.to_string(),
            })
    }

    fn issue(store: Arc<dyn DocumentStore>, doc_ref: DocRef) -> CacheEntry {
        let fetch = async move {
            store
                .fetch_one(&doc_ref)
                .await
                .map(Arc::new)
                .map_err(Arc::new)
        }
        .boxed()
        .shared();
        CacheEntry {
            fetch,
            issued_at: Instant::now(),
        }
    }
}

impl std::fmt::Debug for FetchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCache")
            .field("entries", &self.entries.len())
            .field("freshness_window", &self.freshness_window())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde_json::json;

    fn seeded() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.insert("users/alice", json!({"name": "Alice"})).unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_second_fetch_within_window_is_a_hit() {
        let store = seeded();
        let cache = FetchCache::new();
        let doc_ref = DocRef::doc("users/alice").unwrap();

        let first = cache.fetch(store.clone(), &doc_ref).await.unwrap();
        let second = cache.fetch(store.clone(), &doc_ref).await.unwrap();

        assert_eq!(first.data, second.data);
        assert_eq!(store.fetch_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_refetches() {
        let store = seeded();
        let cache = FetchCache::new();
        cache.set_freshness_window(Duration::from_millis(10));
        let doc_ref = DocRef::doc("users/alice").unwrap();

        cache.fetch(store.clone(), &doc_ref).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.fetch(store.clone(), &doc_ref).await.unwrap();

        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let store = seeded();
        let cache = Arc::new(FetchCache::new());
        let doc_ref = DocRef::doc("users/alice").unwrap();

        let fetches: Vec<SharedFetch> = (0..8)
            .map(|_| cache.get_or_fetch(store.clone(), &doc_ref))
            .collect();
        let results = futures::future::join_all(fetches).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_document_cached_until_expiry() {
        let store = seeded();
        let cache = FetchCache::new();
        let doc_ref = DocRef::doc("users/ghost").unwrap();

        let snap = cache.fetch(store.clone(), &doc_ref).await.unwrap();
        assert!(!snap.exists);

        // Document appears, but the stale "missing" result is still fresh.
        store.insert("users/ghost", json!({"name": "Ghost"})).unwrap();
        let snap = cache.fetch(store.clone(), &doc_ref).await.unwrap();
        assert!(!snap.exists);
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_clear_forces_refetch() {
        let store = seeded();
        let cache = FetchCache::new();
        let doc_ref = DocRef::doc("users/alice").unwrap();

        cache.fetch(store.clone(), &doc_ref).await.unwrap();
        cache.clear();
        assert!(cache.is_empty());
        cache.fetch(store.clone(), &doc_ref).await.unwrap();
        assert_eq!(store.fetch_count(), 2);
    }
}
