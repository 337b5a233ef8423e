//! Error types for docgraph operations.
//!
//! This module provides the error hierarchy covering every failure mode
//! in the resolver. All errors are well-typed and can be pattern-matched
//! for precise error handling.
use std::sync::Arc;
use thiserror::Error;

/// The main error type for docgraph operations.
///
/// All fallible operations in docgraph return `Result<T, GraphError>`.
/// This provides a unified error handling interface across the entire API.
#[derive(Error, Debug)]
pub enum GraphError {
    /// A single-document fetch was rejected by the store.
    ///
    /// A fetch failure anywhere in a resolved subgraph aborts the whole
    /// recursive `ready()` await; there is no partial-success signal.
    #[error("Fetch failed for '{path}': {reason}")]
    FetchFailed {
        /// The document path that was being fetched
        path: String,
        /// Why the store rejected the fetch
        reason: String,
    },

    /// Store adapter failure (query rejected, backend unavailable, ...)
    #[error("Store error: {0}")]
    StoreError(String),

    /// Transport input did not parse or failed validation
    #[error("Malformed transport input: {reason}")]
    MalformedTransport {
        /// Description of what failed to parse or validate
        reason: String,
    },

    /// Serialization error when converting data to/from JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A spawned resolution task panicked or was aborted
    #[error("Resolution task failed: {0}")]
    TaskFailed(String),

    /// A subgraph failure shared with every awaiter.
    ///
    /// One resolution failure is observed by all concurrent and later
    /// awaiters of the same node; the original error stays intact
    /// behind the `Arc`.
    #[error(transparent)]
    Shared(Arc<GraphError>),

    /// A reference path failed validation
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath {
        /// The offending path
        path: String,
        /// Why the path is invalid
        reason: String,
    },
}

/// Result type alias for docgraph operations.
///
/// This is a convenience alias for `Result<T, GraphError>` that makes
/// function signatures more concise throughout the codebase.
pub type GraphResult<T> = Result<T, GraphError>;
