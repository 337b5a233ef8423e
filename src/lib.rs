//! # docgraph — Eager Reference-Graph Resolution
//!
//! docgraph resolves a directed graph of references rooted at documents
//! fetched from a remote document store. Given a document and a
//! declarative include specification, it eagerly loads every referenced
//! document (and their references, recursively), while a short-lived
//! path-keyed cache bounds redundant fetches. Resolved graphs serialize
//! to and from a transport form that preserves reference identity and
//! date values, and over-sized "value is one of N" queries are split
//! into store-sized chunks and deterministically merged back —
//! including across paginated continuations.
//!
//! ## Quick Start
//!
//! ```ignore
//! use docgraph::{DocRef, IncludeSpec, MemoryStore, ResolverContext};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     store.insert("users/bob", json!({"name": "Bob"}))?;
//!     store.insert("posts/p1", json!({
//!         "title": "Hello",
//!         "author": DocRef::doc("users/bob")?.to_value(),
//!     }))?;
//!
//!     let ctx = ResolverContext::new(store);
//!     let post = ctx
//!         .resolve(&DocRef::doc("posts/p1")?, &IncludeSpec::paths().path("author"))
//!         .await?;
//!     post.ready().await?;
//!
//!     let author = post.included_at("author").unwrap();
//!     println!("author: {:?}", author.as_one().unwrap().data());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Resolution flows through a handful of cooperating pieces:
//!
//! 1. **Include Resolver** (`resolver`) — walks data + specification,
//!    schedules a fetch per discovered reference
//! 2. **Fetch Cache** (`cache`) — path-keyed, freshness-windowed,
//!    deduplicates concurrent fetches
//! 3. **Completion Tracking** (`node`) — per-node task lists aggregated
//!    into one awaitable signal for the whole subgraph
//! 4. **Query Splitter** (`split`) — fans over-sized disjunction
//!    queries out and merges them back, with cursor continuity
//! 5. **Transport** (`transport`) — lossless tagged serialization
//!
//! The store itself sits behind the [`DocumentStore`] trait; docgraph
//! never speaks a wire protocol.
//!
//! ## Thread Safety
//!
//! A [`ResolverContext`] is `Arc`-shared and safe to use from many
//! tasks concurrently; the cache and cursor ledger synchronize
//! internally.

// Internal modules
mod error;
mod path;
mod types;

// Capability surface and adapters
pub mod memory;
pub mod store;

// Query model and splitting
pub mod query;
pub mod split;

// Resolution engine
pub mod cache;
pub mod include;
pub mod node;
pub mod resolver;
pub mod transform;

// Transport serialization
pub mod transport;

// Public API exports
pub use error::{GraphError, GraphResult};
pub use types::{DocRef, RefKind, Snapshot};

pub use cache::{FetchCache, SharedFetch, DEFAULT_FRESHNESS_WINDOW};
pub use include::{Computed, Include, IncludeFn, IncludeSpec};
pub use memory::MemoryStore;
pub use node::{DocumentCollection, DocumentNode, IncludedValue};
pub use query::{Direction, Filter, FilterOp, OrderBy, Query};
pub use resolver::ResolverContext;
pub use split::CursorLedger;
pub use store::DocumentStore;
pub use transform::{timestamps_to_dates, DataTransformer};
pub use transport::{
    collection_to_transport, from_transport, from_transport_many, to_transport,
    to_transport_string, TransportDocument, TransportInclude,
};

// Re-export commonly used external types for convenience
pub use chrono::{DateTime, Utc};
pub use serde_json::{json, Value as JsonValue};

/// Prelude module for convenient imports.
///
/// Import everything you need with:
/// ```ignore
/// use docgraph::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{GraphError, GraphResult};
    pub use crate::types::{DocRef, RefKind, Snapshot};
    pub use chrono::{DateTime, Utc};
    pub use serde_json::{json, Value as JsonValue};

    pub use crate::include::{Computed, Include, IncludeSpec};
    pub use crate::memory::MemoryStore;
    pub use crate::node::{DocumentCollection, DocumentNode, IncludedValue};
    pub use crate::query::{Direction, Filter, FilterOp, OrderBy, Query};
    pub use crate::resolver::ResolverContext;
    pub use crate::store::DocumentStore;
    pub use crate::transport::{from_transport, to_transport, to_transport_string};
}
