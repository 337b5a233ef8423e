//! Disjunction query splitting and merging.
//!
//! Stores bound the candidate-set size of a "value is one of N" filter
//! (30 by default). This module fans an over-sized logical query out
//! into one physical sub-query per chunk of the candidate set, runs
//! them concurrently, and merges the result sets back into what the
//! unsplit query would have returned: deduplicated by document
//! identity, re-sorted under the original explicit ordering with a
//! stable origin-order tiebreak, and truncated to the original limit.
//!
//! A single "next page" cursor from the unsplit query does not
//! correspond to any one chunk's true position, so the last document
//! each chunk contributed is recorded in a small [`CursorLedger`]; a
//! later call for the next page of the same logical query resumes each
//! chunk from its own recorded position instead of re-scanning.
use crate::error::GraphResult;
use crate::query::{Filter, Query};
use crate::store::DocumentStore;
use crate::types::Snapshot;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// How many recent split queries keep their chunk positions.
pub const LEDGER_CAPACITY: usize = 16;

/// Resumption state for one logical query that required splitting.
#[derive(Debug, Clone)]
struct LedgerEntry {
    /// Collection path of the logical query.
    collection: String,
    /// The original (unsplit) filter set.
    filters: Vec<Filter>,
    /// Per chunk, the path of the last document it contributed.
    chunk_positions: Vec<Option<String>>,
    /// Path of the last document in the merged output (what a caller
    /// passes as `start_after` to ask for the next page).
    continuation: Option<String>,
}

/// Bounded FIFO of recent split-query resumption points.
#[derive(Debug)]
pub struct CursorLedger {
    entries: VecDeque<LedgerEntry>,
    capacity: usize,
}

impl Default for CursorLedger {
    fn default() -> Self {
        Self::new(LEDGER_CAPACITY)
    }
}

impl CursorLedger {
    /// Create a ledger evicting the oldest entry beyond `capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Number of recorded logical queries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all recorded resumption points.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Chunk resumption positions for a query continuing a recorded
    /// logical query.
    ///
    /// A query matches when its collection and filter set equal a
    /// recorded entry's and its `start_after` cursor is the entry's
    /// continuation point. Ordering and limit are deliberately not part
    /// of the match key; changing them between pages is caller error
    /// (see DESIGN.md).
    fn find(&self, query: &Query) -> Option<&LedgerEntry> {
        let cursor = query.start_after.as_ref()?;
        self.entries.iter().find(|entry| {
            entry.collection == query.collection
                && entry.filters == query.filters
                && entry.continuation.as_ref() == Some(cursor)
        })
    }

    /// Record (or update) the resumption state of a logical query.
    fn record(&mut self, entry: LedgerEntry) {
        self.entries
            .retain(|e| !(e.collection == entry.collection && e.filters == entry.filters));
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}

/// Index and chunked candidate set of a split-eligible filter.
fn split_point(query: &Query, limit: usize) -> Option<(usize, Vec<Vec<serde_json::Value>>)> {
    query.filters.iter().enumerate().find_map(|(index, f)| {
        let values = f.disjunction_values()?;
        if values.len() <= limit {
            return None;
        }
        let chunks = values.chunks(limit).map(<[_]>::to_vec).collect();
        Some((index, chunks))
    })
}

/// Execute a query, splitting it when its disjunction filter exceeds
/// the store's limit.
///
/// Non-eligible queries pass straight through to the store. For split
/// queries, a failing chunk degrades to an empty contribution (logged,
/// not surfaced); the merged output preserves the original ordering
/// and limit.
pub(crate) async fn execute(
    store: &Arc<dyn DocumentStore>,
    ledger: &Mutex<CursorLedger>,
    query: &Query,
) -> GraphResult<Vec<Snapshot>> {
    let Some((filter_index, chunks)) = split_point(query, store.disjunction_limit()) else {
        return store.fetch_many(query).await;
    };
    let field = query.filters[filter_index].field.clone();

    let resume = {
        let ledger = ledger.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        ledger
            .find(query)
            .map(|entry| entry.chunk_positions.clone())
    };
    let resuming = resume.is_some();

    let sub_queries: Vec<Query> = chunks
        .iter()
        .enumerate()
        .map(|(chunk_index, chunk)| {
            let mut sub = query.clone();
            sub.filters[filter_index] = Filter::is_in(field.clone(), chunk.clone());
            if let Some(position) = resume
                .as_ref()
                .and_then(|positions| positions.get(chunk_index))
                .and_then(Clone::clone)
            {
                sub.start_after = Some(position);
            } else if resuming {
                // The logical continuation cursor names a document from
                // another chunk's value range; a chunk that contributed
                // nothing last page rescans from its start.
                sub.start_after = None;
            }
            sub
        })
        .collect();

    let outcomes =
        futures::future::join_all(sub_queries.iter().map(|sub| store.fetch_many(sub))).await;

    let mut merged: Vec<(usize, Snapshot)> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for (chunk_index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(snapshots) => {
                for snapshot in snapshots {
                    if seen.insert(snapshot.doc_ref.path().to_string()) {
                        merged.push((chunk_index, snapshot));
                    }
                }
            }
            Err(error) => {
                tracing::warn!(
                    collection = %query.collection,
                    chunk = chunk_index,
                    %error,
                    "split chunk query failed; contributing empty result set"
                );
            }
        }
    }

    // Stable sort: compare_docs returns Equal on ties, so documents
    // with equal ordering keys keep their chunk-order positions.
    merged.sort_by(|(_, a), (_, b)| query.compare_docs(a, b));
    if let Some(limit) = query.limit {
        merged.truncate(limit);
    }

    let mut chunk_positions = resume.unwrap_or_else(|| vec![None; chunks.len()]);
    for (chunk_index, snapshot) in &merged {
        chunk_positions[*chunk_index] = Some(snapshot.doc_ref.path().to_string());
    }
    let continuation = merged
        .last()
        .map(|(_, snapshot)| snapshot.doc_ref.path().to_string());
    {
        let mut ledger = ledger.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        ledger.record(LedgerEntry {
            collection: query.collection.clone(),
            filters: query.filters.clone(),
            chunk_positions,
            continuation,
        });
    }

    Ok(merged.into_iter().map(|(_, snapshot)| snapshot).collect())
}
