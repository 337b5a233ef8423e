//! The resolution engine.
//!
//! [`ResolverContext`] is the explicit component instance that owns all
//! shared resolver state: the store handle, the fetch cache, the
//! split-query cursor ledger, and the data transformer. Passing the
//! context explicitly (rather than hiding it in process-wide globals)
//! gives test isolation and lets several tenants resolve against
//! different stores without cross-talk.
//!
//! Resolution walks a document's data and the caller's include
//! specification, schedules a fetch for every reference it finds, and
//! recursively builds child nodes as those fetches complete. The
//! caller awaits the whole subgraph through
//! [`DocumentNode::ready`](crate::DocumentNode::ready) — or consumes
//! partially resolved nodes without awaiting, accepting the race.
use crate::cache::FetchCache;
use crate::error::GraphResult;
use crate::include::{Computed, Include, IncludeSpec};
use crate::node::{DocumentCollection, DocumentNode};
use crate::path::get_path;
use crate::query::Query;
use crate::split::{self, CursorLedger};
use crate::store::DocumentStore;
use crate::transform::{default_transformer, DataTransformer};
use crate::types::{DocRef, Snapshot};
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// Owner of all shared resolution state.
pub struct ResolverContext {
    /// The external store capability surface.
    store: Arc<dyn DocumentStore>,
    /// Path-keyed single-document fetch cache.
    cache: FetchCache,
    /// Resumption state for recent split queries.
    ledger: Mutex<CursorLedger>,
    /// Data transformer applied to every node after include resolution.
    transformer: RwLock<DataTransformer>,
}

impl ResolverContext {
    /// Create a context over a store handle.
    ///
    /// Returned Arc-wrapped: resolution spawns tasks that keep the
    /// context alive until their fetches finish.
    pub fn new(store: Arc<dyn DocumentStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            cache: FetchCache::new(),
            ledger: Mutex::new(CursorLedger::default()),
            transformer: RwLock::new(default_transformer()),
        })
    }

    /// The store handle this context resolves against.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// The fetch cache (for `clear()` or inspection).
    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    /// Replace the fetch cache's freshness window (default 3000 ms).
    pub fn set_freshness_window(&self, window: Duration) {
        self.cache.set_freshness_window(window);
    }

    /// Replace the data transformer (default: timestamp→date rewrite).
    pub fn set_transformer(&self, transformer: DataTransformer) {
        *self
            .transformer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = transformer;
    }

    /// Resolve a document by reference.
    ///
    /// The returned node may still be populating its relations; await
    /// [`DocumentNode::ready`] for the guaranteed-complete subgraph.
    /// A document shared by several parents in one graph is resolved
    /// once per occurrence (the cache collapses the underlying
    /// fetches, not the nodes).
    pub async fn resolve(
        self: &Arc<Self>,
        doc_ref: &DocRef,
        include: &IncludeSpec,
    ) -> GraphResult<Arc<DocumentNode>> {
        let snapshot = self.cache.fetch(self.store.clone(), doc_ref).await?;
        Ok(self.build_node((*snapshot).clone(), include))
    }

    /// Resolve every document matching a query, as a collection.
    ///
    /// Routed through the disjunction splitter: queries whose "value is
    /// one of N" filter exceeds the store's limit fan out into chunked
    /// physical queries and merge back deterministically.
    pub async fn resolve_query(
        self: &Arc<Self>,
        query: &Query,
        include: &IncludeSpec,
    ) -> GraphResult<DocumentCollection> {
        let snapshots = split::execute(&self.store, &self.ledger, query).await?;
        let nodes = snapshots
            .into_iter()
            .map(|snapshot| self.build_node(snapshot, include))
            .collect();
        Ok(DocumentCollection::new(nodes))
    }

    /// Build a node from data the caller already has in memory,
    /// running the same include-resolution and transform pipeline —
    /// no store round-trip for the root document itself.
    pub fn create_local(
        self: &Arc<Self>,
        doc_ref: DocRef,
        data: JsonValue,
        include: &IncludeSpec,
    ) -> Arc<DocumentNode> {
        self.build_node(Snapshot::new(doc_ref, data), include)
    }

    /// Node construction pipeline: copy data/identity, schedule the
    /// includes, then transform the data in place.
    pub(crate) fn build_node(
        self: &Arc<Self>,
        snapshot: Snapshot,
        include: &IncludeSpec,
    ) -> Arc<DocumentNode> {
        let node = Arc::new(DocumentNode::new(snapshot));
        self.resolve_includes(&node, include);
        let transformer = self
            .transformer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        node.update_data(|data| transformer(data));
        node
    }

    /// Walk the include specification against the node's data and
    /// schedule a fetch for every relation found.
    ///
    /// Scheduling is synchronous (every task exists before this
    /// returns); completion is not awaited here.
    fn resolve_includes(self: &Arc<Self>, node: &Arc<DocumentNode>, include: &IncludeSpec) {
        match include {
            IncludeSpec::None => {}
            IncludeSpec::DiscoverAll => {
                let discovered = node.with_data(crate::include::discover_references);
                for (path, doc_ref) in discovered {
                    self.schedule_one(node, &path, doc_ref, IncludeSpec::None);
                }
            }
            IncludeSpec::Paths(entries) => {
                for (path, entry) in entries {
                    self.resolve_entry(node, path, entry);
                }
            }
        }
    }

    /// Evaluate one path entry of a specification.
    fn resolve_entry(self: &Arc<Self>, node: &Arc<DocumentNode>, path: &str, entry: &Include) {
        let nested = match entry {
            Include::Nested(spec) => spec.clone(),
            Include::Callback(_) => IncludeSpec::None,
        };
        let value = node.with_data(|data| get_path(data, path).cloned());

        // Simple relation: the path holds a reference.
        if let Some(doc_ref) = value.as_ref().and_then(DocRef::from_value) {
            self.schedule_one(node, path, doc_ref, nested);
            return;
        }

        match value {
            // Array relation: element-wise, skipping non-references.
            Some(JsonValue::Array(items)) => {
                node.ensure_many(path);
                for (index, item) in items.iter().enumerate() {
                    if let Some(doc_ref) = DocRef::from_value(item) {
                        self.schedule_slot(node, path, index, doc_ref, nested.clone());
                    }
                }
            }
            // Keyed-map relation: object whose values are references.
            Some(JsonValue::Object(ref map))
                if map.values().any(|v| DocRef::from_value(v).is_some()) =>
            {
                for (key, item) in map {
                    if let Some(doc_ref) = DocRef::from_value(item) {
                        self.schedule_keyed(node, path, key, doc_ref, nested.clone());
                    }
                }
            }
            // Computed relation: the callback derives the target from
            // the owning node. Unusable returns are skipped silently.
            _ => {
                if let Include::Callback(callback) = entry {
                    match callback(node) {
                        Some(Computed::Reference(doc_ref)) => {
                            self.schedule_one(node, path, doc_ref, IncludeSpec::None);
                        }
                        Some(Computed::ReferenceWith { doc_ref, include }) => {
                            self.schedule_one(node, path, doc_ref, include);
                        }
                        Some(Computed::Query(query)) => {
                            self.schedule_query(node, path, query, IncludeSpec::None);
                        }
                        Some(Computed::QueryWith { query, include }) => {
                            self.schedule_query(node, path, query, include);
                        }
                        None => {
                            tracing::debug!(
                                path,
                                doc = %node.doc_ref(),
                                "include callback returned no usable target; skipping"
                            );
                        }
                    }
                }
            }
        }
    }

    fn schedule_one(
        self: &Arc<Self>,
        node: &Arc<DocumentNode>,
        path: &str,
        doc_ref: DocRef,
        include: IncludeSpec,
    ) {
        let ctx = Arc::clone(self);
        let parent = Arc::clone(node);
        let path = path.to_string();
        node.add_pending(tokio::spawn(async move {
            let snapshot = ctx.cache.fetch(ctx.store.clone(), &doc_ref).await?;
            let child = ctx.build_node((*snapshot).clone(), &include);
            parent.add_child(Arc::clone(&child));
            parent.set_included_one(&path, child);
            Ok(())
        }));
    }

    fn schedule_slot(
        self: &Arc<Self>,
        node: &Arc<DocumentNode>,
        path: &str,
        index: usize,
        doc_ref: DocRef,
        include: IncludeSpec,
    ) {
        let ctx = Arc::clone(self);
        let parent = Arc::clone(node);
        let path = path.to_string();
        node.add_pending(tokio::spawn(async move {
            let snapshot = ctx.cache.fetch(ctx.store.clone(), &doc_ref).await?;
            let child = ctx.build_node((*snapshot).clone(), &include);
            parent.add_child(Arc::clone(&child));
            parent.insert_included_slot(&path, index, child);
            Ok(())
        }));
    }

    fn schedule_keyed(
        self: &Arc<Self>,
        node: &Arc<DocumentNode>,
        path: &str,
        key: &str,
        doc_ref: DocRef,
        include: IncludeSpec,
    ) {
        let ctx = Arc::clone(self);
        let parent = Arc::clone(node);
        let path = path.to_string();
        let key = key.to_string();
        node.add_pending(tokio::spawn(async move {
            let snapshot = ctx.cache.fetch(ctx.store.clone(), &doc_ref).await?;
            let child = ctx.build_node((*snapshot).clone(), &include);
            parent.add_child(Arc::clone(&child));
            parent.insert_included_keyed(&path, &key, child);
            Ok(())
        }));
    }

    fn schedule_query(
        self: &Arc<Self>,
        node: &Arc<DocumentNode>,
        path: &str,
        query: Query,
        include: IncludeSpec,
    ) {
        node.ensure_many(path);
        let ctx = Arc::clone(self);
        let parent = Arc::clone(node);
        let path = path.to_string();
        node.add_pending(tokio::spawn(async move {
            let snapshots = split::execute(&ctx.store, &ctx.ledger, &query).await?;
            for (index, snapshot) in snapshots.into_iter().enumerate() {
                let child = ctx.build_node(snapshot, &include);
                parent.add_child(Arc::clone(&child));
                parent.insert_included_slot(&path, index, child);
            }
            Ok(())
        }));
    }
}

impl std::fmt::Debug for ResolverContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverContext")
            .field("cache", &self.cache)
            .finish()
    }
}
