//! Resolved document nodes and collections.
//!
//! A [`DocumentNode`] owns one store document's data plus the
//! bookkeeping for its resolved relations: the `included` tree (shaped
//! like the include specification), the flat list of in-flight
//! resolution tasks it spawned, and the flat list of child nodes it
//! produced. Completion is awaited through [`DocumentNode::settled`]
//! (this node's own tasks) and [`DocumentNode::ready`] (the whole
//! subgraph, transitively).
//!
//! Nodes are observable while still populating: callers that skip
//! `ready()` trade an opt-in race for lower latency when partial data
//! is acceptable.
use crate::error::{GraphError, GraphResult};
use crate::types::{DocRef, Snapshot};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::task::JoinHandle;

/// A resolved relation in a node's `included` tree.
#[derive(Debug, Clone)]
pub enum IncludedValue {
    /// Single-document relation.
    One(Arc<DocumentNode>),
    /// Array relation, keyed by the source array index so completion
    /// order never reshuffles results (skipped non-reference elements
    /// leave gaps).
    Many(BTreeMap<usize, Arc<DocumentNode>>),
    /// Keyed-map relation, keyed by the source object key.
    Keyed(BTreeMap<String, Arc<DocumentNode>>),
}

impl IncludedValue {
    /// The node of a single-document relation.
    pub fn as_one(&self) -> Option<&Arc<DocumentNode>> {
        match self {
            Self::One(node) => Some(node),
            _ => None,
        }
    }

    /// All nodes of this relation, in index/key order.
    pub fn nodes(&self) -> Vec<Arc<DocumentNode>> {
        match self {
            Self::One(node) => vec![Arc::clone(node)],
            Self::Many(slots) => slots.values().cloned().collect(),
            Self::Keyed(map) => map.values().cloned().collect(),
        }
    }
}

/// One store document plus its resolved relations.
pub struct DocumentNode {
    /// Identity of the document (cache key, merge identity).
    doc_ref: DocRef,
    /// The raw store response this node was built from.
    snapshot: Snapshot,
    /// The document's field values, mutated in place by the data
    /// transformer after include resolution.
    data: RwLock<JsonValue>,
    /// Resolved relations, shaped like the include specification.
    included: RwLock<BTreeMap<String, IncludedValue>>,
    /// In-flight resolution tasks spawned directly by this node.
    pending: Mutex<Vec<JoinHandle<GraphResult<()>>>>,
    /// Serializes drains of `pending` so a second awaiter waits for the
    /// in-progress drain instead of observing its emptied task list.
    drain: tokio::sync::Mutex<()>,
    /// Child nodes this node directly produced (recursion base for
    /// completion tracking, without re-walking `included`'s shape).
    children: Mutex<Vec<Arc<DocumentNode>>>,
    /// First resolution failure, sticky across repeated awaits.
    failure: Mutex<Option<Arc<GraphError>>>,
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DocumentNode {
    /// Create an unresolved node from a raw store response.
    ///
    /// Include resolution and the data transform are driven by the
    /// owning [`ResolverContext`](crate::ResolverContext).
    pub(crate) fn new(snapshot: Snapshot) -> Self {
        Self {
            doc_ref: snapshot.doc_ref.clone(),
            data: RwLock::new(snapshot.data.clone()),
            snapshot,
            included: RwLock::new(BTreeMap::new()),
            pending: Mutex::new(Vec::new()),
            drain: tokio::sync::Mutex::new(()),
            children: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    /// Identity of this document.
    pub fn doc_ref(&self) -> &DocRef {
        &self.doc_ref
    }

    /// Whether the document existed at fetch time.
    pub fn exists(&self) -> bool {
        self.snapshot.exists
    }

    /// The raw store response this node was built from.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// A copy of the document's (possibly transformed) field values.
    ///
    /// Only safe to treat as final after [`DocumentNode::ready`] has
    /// succeeded; before that, the transformer may not have run on
    /// late-arriving relations of ancestors.
    pub fn data(&self) -> JsonValue {
        read(&self.data).clone()
    }

    /// Run a closure against the data without cloning.
    pub fn with_data<R>(&self, f: impl FnOnce(&JsonValue) -> R) -> R {
        f(&read(&self.data))
    }

    /// Mutate the data in place (transformer hook).
    pub(crate) fn update_data(&self, f: impl FnOnce(&mut JsonValue)) {
        f(&mut write(&self.data));
    }

    /// A copy of the resolved-relations tree (nodes are shared).
    pub fn included(&self) -> BTreeMap<String, IncludedValue> {
        read(&self.included).clone()
    }

    /// The resolved relation at one include path, if any.
    pub fn included_at(&self, path: &str) -> Option<IncludedValue> {
        read(&self.included).get(path).cloned()
    }

    /// Child nodes this node directly produced so far.
    pub fn children(&self) -> Vec<Arc<DocumentNode>> {
        lock(&self.children).clone()
    }

    pub(crate) fn set_included_one(&self, path: &str, node: Arc<DocumentNode>) {
        write(&self.included).insert(path.to_string(), IncludedValue::One(node));
    }

    /// Pre-create an empty array relation so callers observe the path
    /// even before (or without) any element resolving.
    pub(crate) fn ensure_many(&self, path: &str) {
        write(&self.included)
            .entry(path.to_string())
            .or_insert_with(|| IncludedValue::Many(BTreeMap::new()));
    }

    pub(crate) fn insert_included_slot(&self, path: &str, index: usize, node: Arc<DocumentNode>) {
        let mut included = write(&self.included);
        let entry = included
            .entry(path.to_string())
            .or_insert_with(|| IncludedValue::Many(BTreeMap::new()));
        if let IncludedValue::Many(slots) = entry {
            slots.insert(index, node);
        }
    }

    pub(crate) fn insert_included_keyed(&self, path: &str, key: &str, node: Arc<DocumentNode>) {
        let mut included = write(&self.included);
        let entry = included
            .entry(path.to_string())
            .or_insert_with(|| IncludedValue::Keyed(BTreeMap::new()));
        if let IncludedValue::Keyed(map) = entry {
            map.insert(key.to_string(), node);
        }
    }

    pub(crate) fn add_child(&self, child: Arc<DocumentNode>) {
        lock(&self.children).push(child);
    }

    pub(crate) fn add_pending(&self, handle: JoinHandle<GraphResult<()>>) {
        lock(&self.pending).push(handle);
    }

    /// Await every resolution task this node spawned directly.
    ///
    /// Concurrent awaiters serialize on an internal gate, so each one
    /// observes the full task list and the same outcome. The first
    /// failure aborts the await and is sticky: every awaiter, current
    /// and later, receives it as [`GraphError::Shared`] wrapping the
    /// original error. Succeeding calls after a clean drain are cheap
    /// no-ops.
    pub async fn settled(&self) -> GraphResult<()> {
        let _draining = self.drain.lock().await;
        loop {
            if let Some(error) = lock(&self.failure).clone() {
                return Err(GraphError::Shared(error));
            }
            let handle = lock(&self.pending).pop();
            let Some(handle) = handle else {
                return Ok(());
            };
            let outcome = match handle.await {
                Ok(result) => result,
                Err(join_error) => Err(GraphError::TaskFailed(join_error.to_string())),
            };
            if let Err(error) = outcome {
                let error = Arc::new(error);
                *lock(&self.failure) = Some(Arc::clone(&error));
                return Err(GraphError::Shared(error));
            }
        }
    }

    /// Await the entire resolved subgraph rooted at this node.
    ///
    /// Satisfied when every one of this node's own pending resolutions
    /// has settled and every resolved child's subgraph is itself ready,
    /// transitively. One failing fetch anywhere fails the whole await.
    ///
    /// A document shared by several parents is awaited once per
    /// occurrence; identity deduplication is deliberately not performed.
    pub fn ready(&self) -> BoxFuture<'_, GraphResult<()>> {
        async move {
            self.settled().await?;
            let children = self.children();
            for child in children {
                child.ready().await?;
            }
            Ok(())
        }
        .boxed()
    }
}

impl std::fmt::Debug for DocumentNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentNode")
            .field("doc_ref", &self.doc_ref)
            .field("exists", &self.snapshot.exists)
            .field("included_paths", &read(&self.included).len())
            .field("pending", &lock(&self.pending).len())
            .finish()
    }
}

/// An ordered sequence of nodes sharing one include specification.
///
/// Supports the same completion-awaiting contract as a single node,
/// aggregated across members.
#[derive(Debug, Clone, Default)]
pub struct DocumentCollection {
    nodes: Vec<Arc<DocumentNode>>,
}

impl DocumentCollection {
    pub(crate) fn new(nodes: Vec<Arc<DocumentNode>>) -> Self {
        Self { nodes }
    }

    /// The member nodes, in result order.
    pub fn nodes(&self) -> &[Arc<DocumentNode>] {
        &self.nodes
    }

    /// Number of member nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node at a result position.
    pub fn get(&self, index: usize) -> Option<&Arc<DocumentNode>> {
        self.nodes.get(index)
    }

    /// Iterate the member nodes.
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<DocumentNode>> {
        self.nodes.iter()
    }

    /// Await every member's own pending resolutions.
    pub async fn settled(&self) -> GraphResult<()> {
        for node in &self.nodes {
            node.settled().await?;
        }
        Ok(())
    }

    /// Await every member's entire resolved subgraph.
    pub async fn ready(&self) -> GraphResult<()> {
        for node in &self.nodes {
            node.ready().await?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a DocumentCollection {
    type Item = &'a Arc<DocumentNode>;
    type IntoIter = std::slice::Iter<'a, Arc<DocumentNode>>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
