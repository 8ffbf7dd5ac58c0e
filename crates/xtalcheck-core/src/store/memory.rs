use super::{CatalogEntry, RecordStore, StoreError, batches_from_entries};
use crate::domain::{CompositionBatch, GroupId, RecordId, StructureGroup, StructureRecord};
use std::collections::BTreeMap;

/// In-memory store, primarily for tests and small ad-hoc verification runs.
/// Group insertion order is preserved for the grouping query, mirroring the
/// catalog-order semantics of [`super::JsonStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Vec<CatalogEntry>,
    groups: BTreeMap<GroupId, StructureGroup>,
    records: BTreeMap<RecordId, StructureRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_group(&mut self, group: StructureGroup) {
        self.entries.push(CatalogEntry {
            group_id: group.group_id,
            composition: group
                .canonical_structure
                .composition()
                .reduced_formula_abc(),
            spacegroup: group.canonical_key.spacegroup,
        });
        self.groups.insert(group.group_id, group);
    }

    /// Catalog row without a backing document; resolves to NotFound.
    pub fn insert_dangling_entry(&mut self, group_id: GroupId, composition: &str) {
        self.entries.push(CatalogEntry {
            group_id,
            composition: composition.to_string(),
            spacegroup: 1,
        });
    }

    pub fn insert_record(&mut self, record: StructureRecord) {
        self.records.insert(record.record_id, record);
    }
}

impl RecordStore for MemoryStore {
    fn duplicate_composition_batches(
        &self,
        scan_limit: Option<usize>,
    ) -> Result<Vec<CompositionBatch>, StoreError> {
        Ok(batches_from_entries(&self.entries, scan_limit))
    }

    fn fetch_group(&self, id: GroupId) -> Result<Option<StructureGroup>, StoreError> {
        Ok(self.groups.get(&id).cloned())
    }

    fn fetch_record(&self, id: RecordId) -> Result<Option<StructureRecord>, StoreError> {
        Ok(self.records.get(&id).cloned())
    }

    fn group_ids_in_range(&self, start: GroupId, end: GroupId) -> Result<Vec<GroupId>, StoreError> {
        Ok(self
            .groups
            .range(start..end)
            .map(|(id, _)| *id)
            .collect())
    }

    fn record_ids_in_range(
        &self,
        start: RecordId,
        end: RecordId,
    ) -> Result<Vec<RecordId>, StoreError> {
        Ok(self.records.range(start..end).map(|(id, _)| *id).collect())
    }
}
