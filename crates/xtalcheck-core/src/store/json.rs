use super::{Catalog, CatalogEntry, RecordStore, StoreError, batches_from_entries};
use crate::domain::{CompositionBatch, GroupId, RecordId, StructureGroup, StructureRecord};
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Directory-backed document store.
///
/// Layout under the store root:
///
/// ```text
/// catalog.json            group/record index (see [`Catalog`])
/// groups/group-<id>.json  one StructureGroup document per group
/// records/record-<id>.json
/// ```
///
/// A missing document is a per-id `Ok(None)`; an unreadable or undecodable
/// catalog is a store-connectivity failure and fatal for the run.
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn catalog(&self) -> Result<Catalog, StoreError> {
        let path = self.root.join("catalog.json");
        let content = fs::read_to_string(&path).map_err(|source| StoreError::Connectivity {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StoreError::Decode { path, source })
    }

    fn group_path(&self, id: GroupId) -> PathBuf {
        self.root.join("groups").join(format!("group-{id}.json"))
    }

    fn record_path(&self, id: RecordId) -> PathBuf {
        self.root.join("records").join(format!("record-{id}.json"))
    }

    fn read_document<T: DeserializeOwned>(&self, path: PathBuf) -> Result<Option<T>, StoreError> {
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Connectivity { path, source }),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StoreError::Decode { path, source })
    }

    /// Writer used by the harvesting side and by test fixtures; the engine
    /// itself only reads.
    pub fn write_fixture(
        root: &Path,
        groups: &[StructureGroup],
        records: &[StructureRecord],
    ) -> std::io::Result<()> {
        fs::create_dir_all(root.join("groups"))?;
        fs::create_dir_all(root.join("records"))?;

        let catalog = Catalog {
            groups: groups
                .iter()
                .map(|group| CatalogEntry {
                    group_id: group.group_id,
                    composition: group
                        .canonical_structure
                        .composition()
                        .reduced_formula_abc(),
                    spacegroup: group.canonical_key.spacegroup,
                })
                .collect(),
            record_ids: records.iter().map(|record| record.record_id).collect(),
        };
        write_json(&root.join("catalog.json"), &catalog)?;

        for group in groups {
            write_json(
                &root.join("groups").join(format!("group-{}.json", group.group_id)),
                group,
            )?;
        }
        for record in records {
            write_json(
                &root
                    .join("records")
                    .join(format!("record-{}.json", record.record_id)),
                record,
            )?;
        }
        Ok(())
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let content = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    fs::write(path, content)
}

impl RecordStore for JsonStore {
    fn duplicate_composition_batches(
        &self,
        scan_limit: Option<usize>,
    ) -> Result<Vec<CompositionBatch>, StoreError> {
        let catalog = self.catalog()?;
        Ok(batches_from_entries(&catalog.groups, scan_limit))
    }

    fn fetch_group(&self, id: GroupId) -> Result<Option<StructureGroup>, StoreError> {
        self.read_document(self.group_path(id))
    }

    fn fetch_record(&self, id: RecordId) -> Result<Option<StructureRecord>, StoreError> {
        self.read_document(self.record_path(id))
    }

    fn group_ids_in_range(&self, start: GroupId, end: GroupId) -> Result<Vec<GroupId>, StoreError> {
        let catalog = self.catalog()?;
        let mut ids: Vec<GroupId> = catalog
            .groups
            .iter()
            .map(|entry| entry.group_id)
            .filter(|id| *id >= start && *id < end)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    fn record_ids_in_range(
        &self,
        start: RecordId,
        end: RecordId,
    ) -> Result<Vec<RecordId>, StoreError> {
        let catalog = self.catalog()?;
        let mut ids: Vec<RecordId> = catalog
            .record_ids
            .iter()
            .copied()
            .filter(|id| *id >= start && *id < end)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}
