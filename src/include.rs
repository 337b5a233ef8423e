//! Include specifications: which references to follow, and how.
//!
//! An include specification is either the discover-all sentinel (walk
//! the whole data tree and follow every reference found) or a map from
//! a dotted/indexed path expression to further include behavior. A
//! mapped entry is a nested specification for the included document's
//! own includes, or a callback computing a reference or query from the
//! owning node — for relations that live in sibling fields rather than
//! structurally in the data.
use crate::node::DocumentNode;
use crate::path::{push_index, push_key};
use crate::query::Query;
use crate::types::DocRef;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Callback computing an include target from the owning node.
///
/// Returning `None` (or a target the resolver cannot use) skips the
/// entry silently.
pub type IncludeFn = Arc<dyn Fn(&DocumentNode) -> Option<Computed> + Send + Sync>;

/// An include target computed by a callback.
#[derive(Clone)]
pub enum Computed {
    /// Include the referenced document.
    Reference(DocRef),
    /// Include the documents matching a query, as a collection relation.
    Query(Query),
    /// Include the referenced document, resolving its own includes with
    /// the wrapped specification.
    ReferenceWith {
        /// The document to include.
        doc_ref: DocRef,
        /// Include specification for the nested resolution.
        include: IncludeSpec,
    },
    /// Include the matching documents, resolving each with the wrapped
    /// specification.
    QueryWith {
        /// The query to run.
        query: Query,
        /// Include specification for each matched document.
        include: IncludeSpec,
    },
}

/// Behavior for one path entry of a specification.
#[derive(Clone)]
pub enum Include {
    /// Resolve the value at the path, then resolve the included
    /// document's own includes with this nested specification.
    Nested(IncludeSpec),
    /// Compute the include target from the owning node.
    Callback(IncludeFn),
}

impl Include {
    /// An entry with no nested includes.
    pub fn leaf() -> Self {
        Self::Nested(IncludeSpec::None)
    }

    /// An entry with a nested specification.
    pub fn nested(spec: IncludeSpec) -> Self {
        Self::Nested(spec)
    }

    /// A callback entry.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&DocumentNode) -> Option<Computed> + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(f))
    }
}

impl std::fmt::Debug for Include {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nested(spec) => f.debug_tuple("Nested").field(spec).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// A caller-declared include specification.
#[derive(Debug, Clone, Default)]
pub enum IncludeSpec {
    /// Include nothing.
    #[default]
    None,
    /// Walk the entire data tree and follow every reference found.
    /// Discovered documents resolve with the empty specification.
    DiscoverAll,
    /// Follow the listed paths.
    Paths(BTreeMap<String, Include>),
}

impl IncludeSpec {
    /// The empty specification.
    pub fn none() -> Self {
        Self::None
    }

    /// The discover-all sentinel.
    pub fn discover_all() -> Self {
        Self::DiscoverAll
    }

    /// Start an empty path map; chain [`IncludeSpec::path`] to fill it.
    pub fn paths() -> Self {
        Self::Paths(BTreeMap::new())
    }

    /// Add a path entry with no nested includes.
    pub fn path(self, path: impl Into<String>) -> Self {
        self.entry(path, Include::leaf())
    }

    /// Add a path entry with a nested specification.
    pub fn path_with(self, path: impl Into<String>, nested: IncludeSpec) -> Self {
        self.entry(path, Include::nested(nested))
    }

    /// Add a callback entry.
    pub fn path_fn<F>(self, path: impl Into<String>, f: F) -> Self
    where
        F: Fn(&DocumentNode) -> Option<Computed> + Send + Sync + 'static,
    {
        self.entry(path, Include::callback(f))
    }

    fn entry(self, path: impl Into<String>, include: Include) -> Self {
        let mut map = match self {
            Self::Paths(map) => map,
            _ => BTreeMap::new(),
        };
        map.insert(path.into(), include);
        Self::Paths(map)
    }
}

/// Walk a data tree depth-first, collecting every tagged reference.
///
/// Object fields extend the synthesized path with dots, array elements
/// with bracketed indices: `{b: [ref, 3]}` discovers `b[0]` and skips
/// the scalar at `b[1]`.
pub fn discover_references(data: &JsonValue) -> Vec<(String, DocRef)> {
    let mut found = Vec::new();
    walk(data, "", &mut found);
    found
}

fn walk(value: &JsonValue, path: &str, found: &mut Vec<(String, DocRef)>) {
    if let Some(doc_ref) = DocRef::from_value(value) {
        if !path.is_empty() {
            found.push((path.to_string(), doc_ref));
        }
        return;
    }
    match value {
        JsonValue::Object(map) => {
            for (key, field) in map {
                walk(field, &push_key(path, key), found);
            }
        }
        JsonValue::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                walk(item, &push_index(path, index), found);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc_ref(path: &str) -> DocRef {
        DocRef::doc(path).unwrap()
    }

    #[test]
    fn test_discover_mixed_tree() {
        let data = json!({
            "a": doc_ref("users/one").to_value(),
            "b": [doc_ref("users/two").to_value(), 3],
            "c": {"x": doc_ref("users/three").to_value()},
        });
        let found = discover_references(&data);
        let paths: Vec<_> = found.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["a", "b[0]", "c.x"]);
        assert_eq!(found[1].1.path(), "users/two");
    }

    #[test]
    fn test_discover_skips_scalars_and_plain_objects() {
        let data = json!({"n": 1, "s": "x", "o": {"deep": true}, "arr": [1, 2]});
        assert!(discover_references(&data).is_empty());
    }

    #[test]
    fn test_discover_does_not_recurse_into_references() {
        // A reference record's own fields are terminal.
        let data = json!({"a": doc_ref("users/one").to_value()});
        assert_eq!(discover_references(&data).len(), 1);
    }

    #[test]
    fn test_spec_builder() {
        let spec = IncludeSpec::paths()
            .path("author")
            .path_with("team", IncludeSpec::paths().path("captain"));
        match spec {
            IncludeSpec::Paths(map) => {
                assert_eq!(map.len(), 2);
                assert!(matches!(map["author"], Include::Nested(IncludeSpec::None)));
            }
            _ => panic!("expected paths"),
        }
    }
}
