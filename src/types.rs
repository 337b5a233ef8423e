//! Common types used throughout docgraph.
//!
//! This module defines the core data structures shared by the resolver,
//! the cache, the query splitter, and the transport layer: store
//! references, raw snapshots, and the tagged-value conventions used to
//! embed references and dates inside plain JSON trees.
use crate::error::{GraphError, GraphResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// Field name carrying the type tag of an embedded record.
pub const TAG_FIELD: &str = "_type";
/// Tag value marking an embedded document reference.
pub const TAG_REFERENCE: &str = "DocumentReference";
/// Tag value marking a date in its transport form.
pub const TAG_DATE: &str = "Date";
/// Tag value marking a store-native timestamp (pre-transform form).
pub const TAG_TIMESTAMP: &str = "Timestamp";

/// Whether a reference names a single document or a collection.
///
/// The discriminator is derived from the path shape: an even number of
/// segments names a document (`users/alice`), an odd number names a
/// collection (`users` or `users/alice/posts`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefKind {
    /// Names exactly one document.
    Document,
    /// Names a collection of documents.
    Collection,
}

/// A reference to a location in the document store.
///
/// The path is the stable identity of the referenced location: it is the
/// fetch-cache key, the merge identity used by the query splitter, and
/// the value carried by the tagged transport form
/// `{"_type": "DocumentReference", "path": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocRef {
    path: String,
}

impl DocRef {
    /// Parse a reference of either kind, validating segment shape.
    ///
    /// Paths are `/`-separated, must be non-empty, and must not contain
    /// empty segments.
    pub fn parse(path: impl Into<String>) -> GraphResult<Self> {
        let path = path.into();
        if path.is_empty() {
            return Err(GraphError::InvalidPath {
                path,
                reason: "empty path".to_string(),
            });
        }
        if path.split('/').any(|segment| segment.is_empty()) {
            return Err(GraphError::InvalidPath {
                path,
                reason: "empty path segment".to_string(),
            });
        }
        Ok(Self { path })
    }

    /// Parse a reference that must name a single document.
    pub fn doc(path: impl Into<String>) -> GraphResult<Self> {
        let doc_ref = Self::parse(path)?;
        if doc_ref.kind() != RefKind::Document {
            return Err(GraphError::InvalidPath {
                path: doc_ref.path,
                reason: "odd segment count names a collection, not a document".to_string(),
            });
        }
        Ok(doc_ref)
    }

    /// The full store path of this reference.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Document/collection discriminator, derived from segment count.
    pub fn kind(&self) -> RefKind {
        if self.path.split('/').count() % 2 == 0 {
            RefKind::Document
        } else {
            RefKind::Collection
        }
    }

    /// The last path segment (document id or collection name).
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// The parent location, if any (`users/alice` → `users`).
    pub fn parent(&self) -> Option<Self> {
        self.path.rsplit_once('/').map(|(parent, _)| Self {
            path: parent.to_string(),
        })
    }

    /// Append a child segment (`users` + `alice` → `users/alice`).
    pub fn child(&self, segment: impl AsRef<str>) -> Self {
        Self {
            path: format!("{}/{}", self.path, segment.as_ref()),
        }
    }

    /// Recognize a tagged reference record inside document data.
    ///
    /// Returns `None` for anything that is not a well-formed
    /// `{"_type": "DocumentReference", "path": <valid path>}` object;
    /// callers treat that as "not a reference" rather than an error.
    pub fn from_value(value: &JsonValue) -> Option<Self> {
        let map = value.as_object()?;
        if map.get(TAG_FIELD)?.as_str()? != TAG_REFERENCE {
            return None;
        }
        let path = map.get("path")?.as_str()?;
        Self::parse(path).ok()
    }

    /// The tagged in-data / transport form of this reference.
    pub fn to_value(&self) -> JsonValue {
        json!({ TAG_FIELD: TAG_REFERENCE, "path": self.path })
    }
}

impl std::fmt::Display for DocRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// The raw store response a document node is built from.
///
/// Kept on the node so callers can check existence and so the splitter
/// can re-derive pagination positions later. A fetch of a missing
/// document yields `exists: false` with empty data, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Identity of the fetched document.
    pub doc_ref: DocRef,
    /// Whether the document existed at fetch time.
    pub exists: bool,
    /// The document's field values (empty object when missing).
    pub data: JsonValue,
}

impl Snapshot {
    /// Snapshot of an existing document.
    pub fn new(doc_ref: DocRef, data: JsonValue) -> Self {
        Self {
            doc_ref,
            exists: true,
            data,
        }
    }

    /// Snapshot of a document that does not exist.
    pub fn missing(doc_ref: DocRef) -> Self {
        Self {
            doc_ref,
            exists: false,
            data: json!({}),
        }
    }

    /// The document id (last path segment).
    pub fn id(&self) -> &str {
        self.doc_ref.id()
    }
}
