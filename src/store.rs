//! The document-store capability surface.
//!
//! docgraph treats the underlying store client as an external
//! collaborator: anything that can fetch one document by reference and
//! fetch many documents matching a query can drive the resolver.
//! Connection management, wire protocol, and authentication live behind
//! this trait and are out of scope here.
use crate::error::GraphResult;
use crate::query::Query;
use crate::types::{DocRef, Snapshot};
use async_trait::async_trait;

/// Async capability surface of a document store.
///
/// Implementations must be cheap to share (`Arc<dyn DocumentStore>`)
/// and safe to call concurrently; the resolver issues many fetches in
/// flight at once.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a single document by reference.
    ///
    /// A missing document is a successful fetch with
    /// [`Snapshot::exists`](crate::Snapshot) set to `false`, not an
    /// error. Errors mean the store rejected the fetch itself.
    async fn fetch_one(&self, doc_ref: &DocRef) -> GraphResult<Snapshot>;

    /// Fetch the ordered sequence of documents matching a query.
    async fn fetch_many(&self, query: &Query) -> GraphResult<Vec<Snapshot>>;

    /// Maximum candidate-set size the store accepts in a single
    /// disjunction ("value is one of N") filter.
    ///
    /// Queries exceeding this are fanned out by the splitter.
    fn disjunction_limit(&self) -> usize {
        30
    }
}
