//! Transport serialization of resolved graphs.
//!
//! A resolved document (or an array of them) flattens to a JSON form
//! that preserves reference identity and date values exactly:
//! references stay tagged `{"_type": "DocumentReference", "path"}`,
//! dates stay tagged `{"_type": "Date", "value"}`, and each node
//! becomes a record of its `data`, its `included` tree, and a reduced
//! `snapshot` (identity, existence flag). Object keys serialize in
//! sorted order — `serde_json`'s default map is ordered — so output is
//! stable for diffing.
//!
//! Deserialization validates the whole tree: every reference tag must
//! carry a well-formed path (even segment count names a document, odd
//! a collection) and every date tag must parse as RFC 3339. Malformed
//! input surfaces as [`GraphError::MalformedTransport`] to the direct
//! caller. Round-tripping reconstructs data, included shape, and
//! identities — never pending-resolution state or cache entries.
use crate::error::{GraphError, GraphResult};
use crate::node::{DocumentCollection, DocumentNode, IncludedValue};
use crate::transform::as_date;
use crate::types::{DocRef, RefKind, TAG_DATE, TAG_FIELD, TAG_REFERENCE};
use serde_json::{json, Map, Value as JsonValue};
use std::collections::BTreeMap;

/// Serialize a resolved node to its transport value.
pub fn to_transport(node: &DocumentNode) -> JsonValue {
    json!({
        "data": node.data(),
        "included": included_to_value(&node.included()),
        "snapshot": {
            "ref": node.doc_ref().to_value(),
            "id": node.doc_ref().id(),
            "exists": node.exists(),
        },
    })
}

/// Serialize a resolved node to transport text.
pub fn to_transport_string(node: &DocumentNode) -> GraphResult<String> {
    Ok(serde_json::to_string(&to_transport(node))?)
}

/// Serialize a collection to its transport value (an array of
/// document records, preserving order).
pub fn collection_to_transport(collection: &DocumentCollection) -> JsonValue {
    JsonValue::Array(collection.iter().map(|node| to_transport(node)).collect())
}

fn included_to_value(included: &BTreeMap<String, IncludedValue>) -> JsonValue {
    let mut out = Map::new();
    for (path, value) in included {
        let encoded = match value {
            IncludedValue::One(node) => to_transport(node),
            IncludedValue::Many(slots) => {
                JsonValue::Array(slots.values().map(|node| to_transport(node)).collect())
            }
            IncludedValue::Keyed(map) => JsonValue::Object(
                map.iter()
                    .map(|(key, node)| (key.clone(), to_transport(node)))
                    .collect(),
            ),
        };
        out.insert(path.clone(), encoded);
    }
    JsonValue::Object(out)
}

/// A document reconstructed from transport form.
///
/// Mirrors the node shape — data, included tree, identity — without
/// any resolution machinery.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportDocument {
    /// The document's field values (references and dates still tagged,
    /// but validated).
    pub data: JsonValue,
    /// The reconstructed included tree.
    pub included: BTreeMap<String, TransportInclude>,
    /// Identity of the document.
    pub doc_ref: DocRef,
    /// Whether the document existed when serialized.
    pub exists: bool,
}

impl TransportDocument {
    /// The reconstructed relation at one include path.
    pub fn included_at(&self, path: &str) -> Option<&TransportInclude> {
        self.included.get(path)
    }
}

/// A reconstructed relation.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportInclude {
    /// Single-document relation.
    One(TransportDocument),
    /// Array relation, in serialized order.
    Many(Vec<TransportDocument>),
    /// Keyed-map relation.
    Keyed(BTreeMap<String, TransportDocument>),
}

/// Parse transport text into a reconstructed document.
pub fn from_transport(text: &str) -> GraphResult<TransportDocument> {
    let value: JsonValue = serde_json::from_str(text).map_err(|e| {
        GraphError::MalformedTransport {
            reason: e.to_string(),
        }
    })?;
    parse_document(&value)
}

/// Parse transport text holding an array of document records.
pub fn from_transport_many(text: &str) -> GraphResult<Vec<TransportDocument>> {
    let value: JsonValue = serde_json::from_str(text).map_err(|e| {
        GraphError::MalformedTransport {
            reason: e.to_string(),
        }
    })?;
    let items = value
        .as_array()
        .ok_or_else(|| malformed("expected an array of document records"))?;
    items.iter().map(parse_document).collect()
}

fn malformed(reason: impl Into<String>) -> GraphError {
    GraphError::MalformedTransport {
        reason: reason.into(),
    }
}

fn parse_document(value: &JsonValue) -> GraphResult<TransportDocument> {
    let record = value
        .as_object()
        .ok_or_else(|| malformed("document record must be an object"))?;

    let data = record
        .get("data")
        .ok_or_else(|| malformed("document record missing 'data'"))?;
    validate_tags(data)?;

    let snapshot = record
        .get("snapshot")
        .and_then(JsonValue::as_object)
        .ok_or_else(|| malformed("document record missing 'snapshot'"))?;
    let doc_ref = snapshot
        .get("ref")
        .and_then(DocRef::from_value)
        .ok_or_else(|| malformed("snapshot 'ref' is not a valid reference"))?;
    if doc_ref.kind() != RefKind::Document {
        return Err(malformed(format!(
            "snapshot ref '{doc_ref}' names a collection, not a document"
        )));
    }
    let exists = snapshot
        .get("exists")
        .and_then(JsonValue::as_bool)
        .ok_or_else(|| malformed("snapshot missing 'exists'"))?;

    let mut included = BTreeMap::new();
    if let Some(tree) = record.get("included") {
        let tree = tree
            .as_object()
            .ok_or_else(|| malformed("'included' must be an object"))?;
        for (path, entry) in tree {
            included.insert(path.clone(), parse_include(entry)?);
        }
    }

    Ok(TransportDocument {
        data: data.clone(),
        included,
        doc_ref,
        exists,
    })
}

fn parse_include(value: &JsonValue) -> GraphResult<TransportInclude> {
    match value {
        JsonValue::Array(items) => Ok(TransportInclude::Many(
            items.iter().map(parse_document).collect::<GraphResult<_>>()?,
        )),
        JsonValue::Object(map) if is_document_record(map) => {
            Ok(TransportInclude::One(parse_document(value)?))
        }
        JsonValue::Object(map) => {
            let mut keyed = BTreeMap::new();
            for (key, entry) in map {
                keyed.insert(key.clone(), parse_document(entry)?);
            }
            Ok(TransportInclude::Keyed(keyed))
        }
        _ => Err(malformed("included entry must be a record, array, or map")),
    }
}

fn is_document_record(map: &Map<String, JsonValue>) -> bool {
    map.contains_key("data") && map.contains_key("snapshot")
}

/// Walk a data tree, validating every tagged reference and date.
fn validate_tags(value: &JsonValue) -> GraphResult<()> {
    match value {
        JsonValue::Object(map) => {
            match map.get(TAG_FIELD).and_then(JsonValue::as_str) {
                Some(TAG_REFERENCE) => {
                    let path = map
                        .get("path")
                        .and_then(JsonValue::as_str)
                        .ok_or_else(|| malformed("reference record missing 'path'"))?;
                    DocRef::parse(path).map_err(|e| malformed(e.to_string()))?;
                    Ok(())
                }
                Some(TAG_DATE) => {
                    as_date(value)
                        .ok_or_else(|| malformed("date record is not valid RFC 3339"))?;
                    Ok(())
                }
                _ => {
                    for field in map.values() {
                        validate_tags(field)?;
                    }
                    Ok(())
                }
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                validate_tags(item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::date_value;
    use chrono::DateTime;

    fn record(path: &str, data: JsonValue) -> JsonValue {
        json!({
            "data": data,
            "included": {},
            "snapshot": {
                "ref": { TAG_FIELD: TAG_REFERENCE, "path": path },
                "id": path.rsplit('/').next().unwrap(),
                "exists": true,
            },
        })
    }

    #[test]
    fn test_parse_minimal_record() {
        let text = record("users/alice", json!({"name": "Alice"})).to_string();
        let doc = from_transport(&text).unwrap();
        assert_eq!(doc.doc_ref.path(), "users/alice");
        assert!(doc.exists);
        assert_eq!(doc.data["name"], "Alice");
        assert!(doc.included.is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(from_transport("not json").is_err());
        assert!(from_transport("{}").is_err());
        assert!(from_transport(r#"{"data": {}}"#).is_err());
    }

    #[test]
    fn test_parse_rejects_collection_snapshot_ref() {
        let mut value = record("users/alice", json!({}));
        value["snapshot"]["ref"]["path"] = json!("users");
        assert!(matches!(
            from_transport(&value.to_string()),
            Err(GraphError::MalformedTransport { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_invalid_embedded_reference() {
        let data = json!({"friend": {TAG_FIELD: TAG_REFERENCE, "path": "a//b"}});
        let text = record("users/alice", data).to_string();
        assert!(from_transport(&text).is_err());
    }

    #[test]
    fn test_parse_rejects_invalid_date() {
        let data = json!({"at": {TAG_FIELD: TAG_DATE, "value": "yesterday"}});
        let text = record("users/alice", data).to_string();
        assert!(from_transport(&text).is_err());
    }

    #[test]
    fn test_parse_accepts_valid_tags() {
        let instant = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let data = json!({
            "friend": {TAG_FIELD: TAG_REFERENCE, "path": "users/bob"},
            "team": {TAG_FIELD: TAG_REFERENCE, "path": "teams"},
            "at": date_value(instant),
        });
        let text = record("users/alice", data).to_string();
        let doc = from_transport(&text).unwrap();
        assert_eq!(doc.data["friend"]["path"], "users/bob");
    }

    #[test]
    fn test_parse_included_shapes() {
        let mut value = record("users/alice", json!({}));
        value["included"] = json!({
            "author": record("users/bob", json!({"n": 1})),
            "tags": [record("tags/a", json!({})), record("tags/b", json!({}))],
            "by_key": {"x": record("users/x", json!({}))},
        });
        let doc = from_transport(&value.to_string()).unwrap();

        assert!(matches!(
            doc.included_at("author"),
            Some(TransportInclude::One(_))
        ));
        match doc.included_at("tags") {
            Some(TransportInclude::Many(docs)) => assert_eq!(docs.len(), 2),
            other => panic!("expected Many, got {other:?}"),
        }
        match doc.included_at("by_key") {
            Some(TransportInclude::Keyed(map)) => {
                assert_eq!(map["x"].doc_ref.path(), "users/x");
            }
            other => panic!("expected Keyed, got {other:?}"),
        }
    }

    #[test]
    fn test_from_transport_many() {
        let text = JsonValue::Array(vec![
            record("users/a", json!({})),
            record("users/b", json!({})),
        ])
        .to_string();
        let docs = from_transport_many(&text).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].doc_ref.path(), "users/b");

        assert!(from_transport_many(&record("users/a", json!({})).to_string()).is_err());
    }

    #[test]
    fn test_sorted_keys_in_output() {
        // serde_json's default map is BTree-backed; spot-check anyway.
        let value = record("users/alice", json!({"z": 1, "a": 2}));
        let text = serde_json::to_string(&value).unwrap();
        assert!(text.find("\"a\"").unwrap() < text.find("\"z\"").unwrap());
    }
}
