//! Query descriptions for the document store surface.
//!
//! A [`Query`] describes a set of documents to fetch: a collection,
//! filter conditions, explicit ordering, a limit, and pagination
//! cursors. The query value is fully inspectable — the disjunction
//! splitter reads and rewrites filters and cursors, and the in-memory
//! store adapter evaluates them — so every part is plain data.
//!
//! # Example
//!
//! ```ignore
//! use docgraph::{Filter, Query};
//! use serde_json::json;
//!
//! let query = Query::collection("users")
//!     .filter(Filter::eq("active", json!(true)))
//!     .order_by_asc("age")
//!     .limit(10);
//! ```
use crate::path::get_path;
use crate::types::Snapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

/// Comparison operator of a filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    /// Field equals value.
    Eq,
    /// Field not equals value.
    Ne,
    /// Field greater than value.
    Gt,
    /// Field greater than or equal to value.
    Gte,
    /// Field less than value.
    Lt,
    /// Field less than or equal to value.
    Lte,
    /// Field's value is a member of the given set (disjunction filter).
    ///
    /// Stores bound the set size; the splitter fans oversized sets out
    /// into multiple physical queries.
    In,
}

/// A single filter condition: field, operator, value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Dot-path of the field being tested.
    pub field: String,
    /// Comparison operator.
    pub op: FilterOp,
    /// Comparison value (a JSON array of candidates for `In`).
    pub value: JsonValue,
}

impl Filter {
    /// Create an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    /// Create a not-equals filter.
    pub fn ne(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::new(field, FilterOp::Ne, value)
    }

    /// Create a greater-than filter.
    pub fn gt(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::new(field, FilterOp::Gt, value)
    }

    /// Create a greater-than-or-equal filter.
    pub fn gte(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::new(field, FilterOp::Gte, value)
    }

    /// Create a less-than filter.
    pub fn lt(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::new(field, FilterOp::Lt, value)
    }

    /// Create a less-than-or-equal filter.
    pub fn lte(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::new(field, FilterOp::Lte, value)
    }

    /// Create a disjunction ("value is one of") filter.
    pub fn is_in(field: impl Into<String>, values: Vec<JsonValue>) -> Self {
        Self::new(field, FilterOp::In, JsonValue::Array(values))
    }

    fn new(field: impl Into<String>, op: FilterOp, value: impl Into<JsonValue>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// The candidate set of an `In` filter, `None` for other operators.
    pub fn disjunction_values(&self) -> Option<&Vec<JsonValue>> {
        match self.op {
            FilterOp::In => self.value.as_array(),
            _ => None,
        }
    }

    /// Evaluate this filter against a document's data.
    pub fn matches_value(&self, data: &JsonValue) -> bool {
        let field_value = get_path(data, &self.field);
        match self.op {
            FilterOp::Eq => field_value.is_some_and(|v| v == &self.value),
            FilterOp::Ne => field_value.is_none_or(|v| v != &self.value),
            FilterOp::Gt => field_value
                .is_some_and(|v| compare_json(v, &self.value) == Some(Ordering::Greater)),
            FilterOp::Gte => field_value.is_some_and(|v| {
                matches!(
                    compare_json(v, &self.value),
                    Some(Ordering::Greater | Ordering::Equal)
                )
            }),
            FilterOp::Lt => {
                field_value.is_some_and(|v| compare_json(v, &self.value) == Some(Ordering::Less))
            }
            FilterOp::Lte => field_value.is_some_and(|v| {
                matches!(
                    compare_json(v, &self.value),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }),
            FilterOp::In => field_value.is_some_and(|v| {
                self.value
                    .as_array()
                    .is_some_and(|candidates| candidates.contains(v))
            }),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Ascending order (smallest first).
    Asc,
    /// Descending order (largest first).
    Desc,
}

/// One explicit ordering field of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Dot-path of the field to order by.
    pub field: String,
    /// Sort direction.
    pub direction: Direction,
}

impl OrderBy {
    /// Create a new ordering specification.
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// A query against a document-store collection.
///
/// Pagination cursors are document paths in query order: `start_after`
/// resumes immediately past the named document, `start_at` includes it,
/// `end_at`/`end_before` bound the tail. Path-valued cursors are what
/// lets the splitter record an exact per-chunk resumption point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Path of the collection being queried.
    pub collection: String,
    /// Filter conditions (all must match).
    pub filters: Vec<Filter>,
    /// Explicit ordering fields.
    pub order_by: Vec<OrderBy>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Begin at this document path (inclusive).
    pub start_at: Option<String>,
    /// Begin after this document path (exclusive).
    pub start_after: Option<String>,
    /// End at this document path (inclusive).
    pub end_at: Option<String>,
    /// End before this document path (exclusive).
    pub end_before: Option<String>,
}

impl Query {
    /// Create a new query over a collection.
    pub fn collection(path: impl Into<String>) -> Self {
        Self {
            collection: path.into(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            start_at: None,
            start_after: None,
            end_at: None,
            end_before: None,
        }
    }

    /// Add a filter condition.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add an ascending ordering field.
    pub fn order_by_asc(mut self, field: impl Into<String>) -> Self {
        self.order_by.push(OrderBy::new(field, Direction::Asc));
        self
    }

    /// Add a descending ordering field.
    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.order_by.push(OrderBy::new(field, Direction::Desc));
        self
    }

    /// Set the maximum number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Begin at the named document (inclusive).
    pub fn start_at(mut self, path: impl Into<String>) -> Self {
        self.start_at = Some(path.into());
        self
    }

    /// Begin after the named document (exclusive).
    pub fn start_after(mut self, path: impl Into<String>) -> Self {
        self.start_after = Some(path.into());
        self
    }

    /// End at the named document (inclusive).
    pub fn end_at(mut self, path: impl Into<String>) -> Self {
        self.end_at = Some(path.into());
        self
    }

    /// End before the named document (exclusive).
    pub fn end_before(mut self, path: impl Into<String>) -> Self {
        self.end_before = Some(path.into());
        self
    }

    /// Check whether a document's data matches all filters.
    pub fn matches(&self, data: &JsonValue) -> bool {
        self.filters.iter().all(|f| f.matches_value(data))
    }

    /// Compare two snapshots under this query's explicit ordering.
    ///
    /// Returns `Equal` when every ordering field ties (or no ordering is
    /// set), so a stable sort preserves the callers' origin order across
    /// ties instead of reshuffling them.
    pub fn compare_docs(&self, a: &Snapshot, b: &Snapshot) -> Ordering {
        for order in &self.order_by {
            let a_val = get_path(&a.data, &order.field);
            let b_val = get_path(&b.data, &order.field);

            let cmp = match (a_val, b_val) {
                (Some(av), Some(bv)) => compare_json(av, bv).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };

            let cmp = match order.direction {
                Direction::Asc => cmp,
                Direction::Desc => cmp.reverse(),
            };

            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    }
}

/// Compare two JSON values.
/// Returns ordering with nulls sorting before all other values.
pub(crate) fn compare_json(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (a, b) {
        // Null sorts before everything
        (JsonValue::Null, JsonValue::Null) => Some(Ordering::Equal),
        (JsonValue::Null, _) => Some(Ordering::Less),
        (_, JsonValue::Null) => Some(Ordering::Greater),

        // Same type comparisons
        (JsonValue::Number(a), JsonValue::Number(b)) => {
            let a_f = a.as_f64()?;
            let b_f = b.as_f64()?;
            a_f.partial_cmp(&b_f)
        }
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        (JsonValue::Bool(a), JsonValue::Bool(b)) => Some(a.cmp(b)),

        // Mixed types are incomparable
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocRef;
    use serde_json::json;

    fn snap(path: &str, data: JsonValue) -> Snapshot {
        Snapshot::new(DocRef::doc(path).unwrap(), data)
    }

    #[test]
    fn test_filter_eq() {
        let filter = Filter::eq("name", json!("Alice"));
        assert!(filter.matches_value(&json!({"name": "Alice"})));
        assert!(!filter.matches_value(&json!({"name": "Bob"})));
        assert!(!filter.matches_value(&json!({})));
    }

    #[test]
    fn test_filter_comparisons() {
        assert!(Filter::gt("age", json!(30)).matches_value(&json!({"age": 35})));
        assert!(!Filter::gt("age", json!(30)).matches_value(&json!({"age": 30})));
        assert!(Filter::gte("age", json!(30)).matches_value(&json!({"age": 30})));
        assert!(Filter::lt("age", json!(30)).matches_value(&json!({"age": 25})));
        assert!(Filter::lte("age", json!(30)).matches_value(&json!({"age": 30})));
        assert!(Filter::ne("age", json!(30)).matches_value(&json!({"age": 31})));
    }

    #[test]
    fn test_filter_in() {
        let filter = Filter::is_in("status", vec![json!("active"), json!("pending")]);
        assert!(filter.matches_value(&json!({"status": "active"})));
        assert!(filter.matches_value(&json!({"status": "pending"})));
        assert!(!filter.matches_value(&json!({"status": "closed"})));
        assert_eq!(filter.disjunction_values().map(Vec::len), Some(2));
        assert!(Filter::eq("x", json!(1)).disjunction_values().is_none());
    }

    #[test]
    fn test_filter_nested_field() {
        let filter = Filter::eq("user.name", json!("Alice"));
        assert!(filter.matches_value(&json!({"user": {"name": "Alice"}})));
        assert!(!filter.matches_value(&json!({"user": {"name": "Bob"}})));
    }

    #[test]
    fn test_query_matches_all_filters() {
        let query = Query::collection("users")
            .filter(Filter::gt("age", json!(18)))
            .filter(Filter::lt("age", json!(65)));
        assert!(query.matches(&json!({"age": 30})));
        assert!(!query.matches(&json!({"age": 10})));
        assert!(!query.matches(&json!({"age": 70})));
    }

    #[test]
    fn test_compare_docs_multi_key() {
        let query = Query::collection("users")
            .order_by_asc("team")
            .order_by_desc("score");
        let a = snap("users/a", json!({"team": "red", "score": 10}));
        let b = snap("users/b", json!({"team": "red", "score": 20}));
        let c = snap("users/c", json!({"team": "blue", "score": 5}));

        assert_eq!(query.compare_docs(&c, &a), Ordering::Less);
        assert_eq!(query.compare_docs(&b, &a), Ordering::Less); // desc score
        assert_eq!(query.compare_docs(&a, &a), Ordering::Equal);
    }

    #[test]
    fn test_compare_docs_ties_stay_equal() {
        let query = Query::collection("users").order_by_asc("team");
        let a = snap("users/a", json!({"team": "red"}));
        let b = snap("users/b", json!({"team": "red"}));
        assert_eq!(query.compare_docs(&a, &b), Ordering::Equal);
    }

    #[test]
    fn test_missing_field_sorts_last() {
        let query = Query::collection("users").order_by_asc("age");
        let a = snap("users/a", json!({"age": 1}));
        let b = snap("users/b", json!({}));
        assert_eq!(query.compare_docs(&a, &b), Ordering::Less);
        assert_eq!(query.compare_docs(&b, &a), Ordering::Greater);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_compare_json_matches_integer_order(a in -1000i64..1000, b in -1000i64..1000) {
                prop_assert_eq!(compare_json(&json!(a), &json!(b)), a.partial_cmp(&b));
            }

            #[test]
            fn prop_compare_docs_sorts_consistently(
                ages in proptest::collection::vec(0u8..50, 1..20)
            ) {
                let query = Query::collection("users").order_by_asc("age");
                let mut snaps: Vec<Snapshot> = ages
                    .iter()
                    .enumerate()
                    .map(|(i, age)| snap(&format!("users/u{i:02}"), json!({"age": age})))
                    .collect();
                snaps.sort_by(|a, b| query.compare_docs(a, b));
                let sorted: Vec<i64> = snaps
                    .iter()
                    .map(|s| s.data["age"].as_i64().unwrap())
                    .collect();
                prop_assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
            }
        }
    }
}
