//! In-process document store adapter.
//!
//! `MemoryStore` implements the full [`DocumentStore`] surface over a
//! concurrent in-memory map: filters, explicit ordering with a
//! document-path tiebreak, path-valued cursors, and limits. It backs the
//! test suites and is useful on its own for building resolved graphs
//! without a remote store.
//!
//! The adapter counts issued fetches and queries so callers can assert
//! cache behavior and physical query fan-out.
use crate::error::{GraphError, GraphResult};
use crate::query::Query;
use crate::store::DocumentStore;
use crate::types::{DocRef, RefKind, Snapshot};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicUsize, Ordering};

/// DashMap-backed in-memory document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Document path → field values
    docs: DashMap<String, JsonValue>,

    /// Statistics
    fetches: AtomicUsize,
    queries: AtomicUsize,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or overwrite) a document.
    pub fn insert(&self, path: impl Into<String>, data: JsonValue) -> GraphResult<DocRef> {
        let doc_ref = DocRef::doc(path)?;
        self.docs.insert(doc_ref.path().to_string(), data);
        Ok(doc_ref)
    }

    /// Remove a document, returning whether it existed.
    pub fn remove(&self, path: &str) -> bool {
        self.docs.remove(path).is_some()
    }

    /// Number of `fetch_one` calls issued against this store.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Number of `fetch_many` calls issued against this store.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    /// All matching documents in query order, before cursors and limit.
    fn matching_sorted(&self, query: &Query) -> Vec<Snapshot> {
        let mut matches: Vec<Snapshot> = self
            .docs
            .iter()
            .filter(|entry| {
                parent_collection(entry.key())
                    .is_some_and(|collection| collection == query.collection)
                    && query.matches(entry.value())
            })
            .filter_map(|entry| {
                DocRef::doc(entry.key().clone())
                    .ok()
                    .map(|doc_ref| Snapshot::new(doc_ref, entry.value().clone()))
            })
            .collect();

        // Path tiebreak gives a deterministic total order regardless of
        // map iteration order.
        matches.sort_by(|a, b| {
            query
                .compare_docs(a, b)
                .then_with(|| a.doc_ref.path().cmp(b.doc_ref.path()))
        });
        matches
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch_one(&self, doc_ref: &DocRef) -> GraphResult<Snapshot> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        if doc_ref.kind() != RefKind::Document {
            return Err(GraphError::InvalidPath {
                path: doc_ref.path().to_string(),
                reason: "fetch_one requires a document reference".to_string(),
            });
        }
        Ok(match self.docs.get(doc_ref.path()) {
            Some(entry) => Snapshot::new(doc_ref.clone(), entry.value().clone()),
            None => Snapshot::missing(doc_ref.clone()),
        })
    }

    async fn fetch_many(&self, query: &Query) -> GraphResult<Vec<Snapshot>> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        if let Some(filter) = query.filters.iter().find(|f| {
            f.disjunction_values()
                .is_some_and(|values| values.len() > self.disjunction_limit())
        }) {
            return Err(GraphError::StoreError(format!(
                "disjunction filter on '{}' exceeds {} values",
                filter.field,
                self.disjunction_limit()
            )));
        }

        let mut results = self.matching_sorted(query);

        if let Some(path) = &query.start_at {
            if let Some(pos) = position_of(&results, path) {
                results.drain(..pos);
            }
        }
        if let Some(path) = &query.start_after {
            if let Some(pos) = position_of(&results, path) {
                results.drain(..=pos);
            }
        }
        if let Some(path) = &query.end_before {
            if let Some(pos) = position_of(&results, path) {
                results.truncate(pos);
            }
        }
        if let Some(path) = &query.end_at {
            if let Some(pos) = position_of(&results, path) {
                results.truncate(pos + 1);
            }
        }
        if let Some(limit) = query.limit {
            results.truncate(limit);
        }
        Ok(results)
    }
}

/// Parent collection of a document path (`users/alice` → `users`).
fn parent_collection(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

fn position_of(results: &[Snapshot], path: &str) -> Option<usize> {
    results.iter().position(|s| s.doc_ref.path() == path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;
    use serde_json::json;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert("users/alice", json!({"name": "Alice", "age": 30}))
            .unwrap();
        store
            .insert("users/bob", json!({"name": "Bob", "age": 20}))
            .unwrap();
        store
            .insert("users/carol", json!({"name": "Carol", "age": 35}))
            .unwrap();
        store
            .insert("teams/red/members/dave", json!({"name": "Dave"}))
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_fetch_one_existing_and_missing() {
        let store = seeded();
        let alice = store
            .fetch_one(&DocRef::doc("users/alice").unwrap())
            .await
            .unwrap();
        assert!(alice.exists);
        assert_eq!(alice.data["name"], "Alice");

        let ghost = store
            .fetch_one(&DocRef::doc("users/ghost").unwrap())
            .await
            .unwrap();
        assert!(!ghost.exists);
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_one_rejects_collection_ref() {
        let store = seeded();
        let result = store.fetch_one(&DocRef::parse("users").unwrap()).await;
        assert!(matches!(result, Err(GraphError::InvalidPath { .. })));
    }

    #[tokio::test]
    async fn test_query_filters_and_order() {
        let store = seeded();
        let query = Query::collection("users")
            .filter(Filter::gt("age", json!(18)))
            .order_by_desc("age");
        let results = store.fetch_many(&query).await.unwrap();
        let names: Vec<_> = results.iter().map(|s| s.data["name"].clone()).collect();
        assert_eq!(names, vec![json!("Carol"), json!("Alice"), json!("Bob")]);
    }

    #[tokio::test]
    async fn test_query_scoped_to_collection() {
        let store = seeded();
        let results = store
            .fetch_many(&Query::collection("teams/red/members"))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].data["name"], "Dave");
    }

    #[tokio::test]
    async fn test_query_cursors_and_limit() {
        let store = seeded();
        let query = Query::collection("users").order_by_asc("age");

        let all = store.fetch_many(&query).await.unwrap();
        assert_eq!(all.len(), 3);

        let after_bob = store
            .fetch_many(&query.clone().start_after("users/bob"))
            .await
            .unwrap();
        assert_eq!(after_bob[0].data["name"], "Alice");

        let first_two = store.fetch_many(&query.clone().limit(2)).await.unwrap();
        assert_eq!(first_two.len(), 2);

        let until_alice = store
            .fetch_many(&query.clone().end_at("users/alice"))
            .await
            .unwrap();
        assert_eq!(until_alice.len(), 2);
    }

    #[tokio::test]
    async fn test_oversized_disjunction_rejected() {
        let store = seeded();
        let values: Vec<JsonValue> = (0..31).map(|n| json!(n)).collect();
        let query = Query::collection("users").filter(Filter::is_in("age", values));
        assert!(store.fetch_many(&query).await.is_err());
    }
}
