//! Record-store access: the grouping query, point lookups, and the per-run
//! group cache.

mod cache;
mod json;
mod memory;

pub use cache::{GroupResolver, Resolution};
pub use json::JsonStore;
pub use memory::MemoryStore;

use crate::domain::{CheckError, CompositionBatch, GroupId, RecordId, StructureGroup, StructureRecord};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub trait RecordStore {
    /// Grouping query: bucket a prefix of the group population by composition
    /// signature and keep only signatures with more than one group id, since
    /// those are the only buckets where duplicates are possible.
    ///
    /// Batches come back largest first so the most duplicated compositions
    /// surface earliest in long runs; ties break on the composition signature
    /// so re-runs over an unchanged store enumerate identically.
    fn duplicate_composition_batches(
        &self,
        scan_limit: Option<usize>,
    ) -> Result<Vec<CompositionBatch>, StoreError>;

    fn fetch_group(&self, id: GroupId) -> Result<Option<StructureGroup>, StoreError>;

    fn fetch_record(&self, id: RecordId) -> Result<Option<StructureRecord>, StoreError>;

    /// Group ids present in the store within `[start, end)`, ascending.
    fn group_ids_in_range(&self, start: GroupId, end: GroupId) -> Result<Vec<GroupId>, StoreError>;

    /// Record ids present in the store within `[start, end)`, ascending.
    fn record_ids_in_range(
        &self,
        start: RecordId,
        end: RecordId,
    ) -> Result<Vec<RecordId>, StoreError>;
}

/// Catalog row summarizing one group for the grouping query; the full group
/// document is only fetched on demand.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub group_id: GroupId,
    pub composition: String,
    pub spacegroup: u16,
}

/// Store-wide index document: group summaries in insertion order plus the
/// record id population. Insertion order is what makes the grouping query's
/// scan-limit prefix and tie-breaking deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub groups: Vec<CatalogEntry>,
    pub record_ids: Vec<RecordId>,
}

/// Shared aggregation behind `duplicate_composition_batches`.
pub(crate) fn batches_from_entries(
    entries: &[CatalogEntry],
    scan_limit: Option<usize>,
) -> Vec<CompositionBatch> {
    let scanned = match scan_limit {
        Some(limit) => &entries[..limit.min(entries.len())],
        None => entries,
    };

    let mut batches: Vec<CompositionBatch> = Vec::new();
    for entry in scanned {
        match batches
            .iter_mut()
            .find(|batch| batch.composition == entry.composition)
        {
            Some(batch) => {
                if !batch.group_ids.contains(&entry.group_id) {
                    batch.group_ids.push(entry.group_id);
                }
            }
            None => batches.push(CompositionBatch {
                composition: entry.composition.clone(),
                group_ids: vec![entry.group_id],
            }),
        }
    }

    batches.retain(|batch| batch.group_ids.len() > 1);
    batches.sort_by(|a, b| {
        b.group_ids
            .len()
            .cmp(&a.group_ids.len())
            .then_with(|| a.composition.cmp(&b.composition))
    });
    batches
}

#[derive(Debug)]
pub enum StoreError {
    Connectivity {
        path: PathBuf,
        source: std::io::Error,
    },
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connectivity { path, source } => {
                write!(f, "store access failed for '{}': {}", path.display(), source)
            }
            Self::Decode { path, source } => {
                write!(f, "failed to decode '{}': {}", path.display(), source)
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Connectivity { source, .. } => Some(source),
            Self::Decode { source, .. } => Some(source),
        }
    }
}

impl From<StoreError> for CheckError {
    fn from(error: StoreError) -> Self {
        let message = error.to_string();
        match error {
            StoreError::Connectivity { .. } => {
                CheckError::store_connectivity("STORE.ACCESS", message)
            }
            StoreError::Decode { .. } => CheckError::store_connectivity("STORE.DECODE", message),
        }
    }
}
