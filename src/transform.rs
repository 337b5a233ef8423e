//! Pluggable data transformation run after include resolution.
//!
//! Every document node's data passes through the context's transformer
//! immediately after its includes are scheduled. The default transform
//! rewrites store-native timestamp records into the tagged date form
//! used by the transport format, recursively, for every object field
//! and array position — without descending into reference records.
use crate::types::{DocRef, TAG_DATE, TAG_FIELD, TAG_TIMESTAMP};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

/// A data transformer mutates a node's data tree in place.
pub type DataTransformer = Arc<dyn Fn(&mut JsonValue) + Send + Sync>;

/// The default transformer: [`timestamps_to_dates`].
pub fn default_transformer() -> DataTransformer {
    Arc::new(timestamps_to_dates)
}

/// Recursively convert store-native timestamps to tagged dates.
///
/// A timestamp is `{"_type": "Timestamp", "seconds": i64, "nanos": u32}`;
/// it becomes `{"_type": "Date", "value": <RFC 3339 string>}`.
/// Timestamps with out-of-range components are left untouched.
pub fn timestamps_to_dates(value: &mut JsonValue) {
    match value {
        JsonValue::Object(_) => {
            if DocRef::from_value(value).is_some() {
                return;
            }
            if let Some(date) = as_timestamp(value) {
                *value = date_value(date);
                return;
            }
            if let JsonValue::Object(map) = value {
                for field in map.values_mut() {
                    timestamps_to_dates(field);
                }
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                timestamps_to_dates(item);
            }
        }
        _ => {}
    }
}

/// Recognize a tagged timestamp record, returning its instant.
pub fn as_timestamp(value: &JsonValue) -> Option<DateTime<Utc>> {
    let map = value.as_object()?;
    if map.get(TAG_FIELD)?.as_str()? != TAG_TIMESTAMP {
        return None;
    }
    let seconds = map.get("seconds")?.as_i64()?;
    let nanos = u32::try_from(map.get("nanos")?.as_u64()?).ok()?;
    DateTime::from_timestamp(seconds, nanos)
}

/// Build a tagged timestamp record.
pub fn timestamp_value(seconds: i64, nanos: u32) -> JsonValue {
    json!({ TAG_FIELD: TAG_TIMESTAMP, "seconds": seconds, "nanos": nanos })
}

/// Build a tagged date record.
pub fn date_value(instant: DateTime<Utc>) -> JsonValue {
    json!({
        TAG_FIELD: TAG_DATE,
        "value": instant.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    })
}

/// Recognize a tagged date record, returning its instant.
pub fn as_date(value: &JsonValue) -> Option<DateTime<Utc>> {
    let map = value.as_object()?;
    if map.get(TAG_FIELD)?.as_str()? != TAG_DATE {
        return None;
    }
    DateTime::parse_from_rfc3339(map.get("value")?.as_str()?)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
