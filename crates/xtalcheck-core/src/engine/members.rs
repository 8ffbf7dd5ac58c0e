use crate::domain::{CheckError, CheckResult, GroupId};
use crate::matcher::{ComparatorVerdict, StructureComparator};
use crate::sink::{StreamPoint, VerdictSink};
use crate::store::RecordStore;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberCheckSummary {
    pub groups_checked: usize,
    pub members_compared: usize,
    pub matches: usize,
    pub skipped_members: usize,
    pub missing_groups: usize,
}

/// Per-group member verification: every non-canonical member record is
/// compared against its group's canonical structure. A group that no longer
/// matches its own members is a sign the upstream deduplication drifted.
pub struct GroupMemberChecker<'a, S: RecordStore, M: StructureComparator> {
    store: &'a S,
    matcher: &'a M,
    sink: &'a mut dyn VerdictSink,
}

impl<'a, S: RecordStore, M: StructureComparator> GroupMemberChecker<'a, S, M> {
    pub fn new(store: &'a S, matcher: &'a M, sink: &'a mut dyn VerdictSink) -> Self {
        Self {
            store,
            matcher,
            sink,
        }
    }

    /// Checks every group with an id in `[start, end)`.
    pub fn run(&mut self, start: GroupId, end: GroupId) -> CheckResult<MemberCheckSummary> {
        let ids = self
            .store
            .group_ids_in_range(start, end)
            .map_err(CheckError::from)?;

        self.sink
            .open()
            .map_err(|error| CheckError::sink("SINK.OPEN", error.to_string()))?;

        let mut summary = MemberCheckSummary::default();
        for id in ids {
            let group = match self.store.fetch_group(id) {
                Ok(Some(group)) => group,
                Ok(None) => {
                    warn!(group_id = %id, "group listed in range but not fetchable");
                    summary.missing_groups += 1;
                    continue;
                }
                Err(error) => {
                    warn!(group_id = %id, error = %error, "group fetch failed; skipping");
                    summary.missing_groups += 1;
                    continue;
                }
            };
            summary.groups_checked += 1;

            let num_members = group.member_record_ids.len();
            if num_members < 2 {
                debug!(group_id = %id, "group has no non-canonical members");
                continue;
            }

            // Offset spreads one group's points apart on the chart while
            // keeping them anchored near the canonical record id.
            let spread = 0.3 / num_members as f64;
            for (index, member_id) in group.member_record_ids.iter().enumerate() {
                if *member_id == group.canonical_record_id {
                    continue;
                }
                let record = match self.store.fetch_record(*member_id) {
                    Ok(Some(record)) => record,
                    Ok(None) => {
                        warn!(group_id = %id, record_id = %member_id, "member record missing");
                        summary.skipped_members += 1;
                        continue;
                    }
                    Err(error) => {
                        warn!(
                            group_id = %id,
                            record_id = %member_id,
                            error = %error,
                            "member record fetch failed; skipping"
                        );
                        summary.skipped_members += 1;
                        continue;
                    }
                };

                let outcome = match self
                    .matcher
                    .compare(&group.canonical_structure, &record.structure)
                {
                    Ok(outcome) => outcome,
                    Err(error) => {
                        warn!(
                            group_id = %id,
                            record_id = %member_id,
                            error = %error,
                            "comparator failure; skipping member"
                        );
                        summary.skipped_members += 1;
                        continue;
                    }
                };
                summary.members_compared += 1;
                let matched = matches!(outcome, ComparatorVerdict::Match);
                if matched {
                    summary.matches += 1;
                } else {
                    warn!(
                        group_id = %id,
                        record_id = %member_id,
                        canonical_record_id = %group.canonical_record_id,
                        "member does not match its group's canonical structure"
                    );
                }

                let offset = spread * index as f64;
                let point = StreamPoint {
                    x: group.canonical_record_id.0 as f64 + offset,
                    y: if matched { 1.0 } else { 0.0 } + offset,
                    text: format!("record_id: {member_id}"),
                };
                if let Err(error) = self.sink.write_point(&point) {
                    warn!(error = %error, "point write failed; continuing");
                }
            }
        }

        info!(
            groups_checked = summary.groups_checked,
            members_compared = summary.members_compared,
            matches = summary.matches,
            skipped_members = summary.skipped_members,
            missing_groups = summary.missing_groups,
            "group-member run finished"
        );
        if let Err(error) = self.sink.close() {
            warn!(error = %error, "sink close failed");
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::GroupMemberChecker;
    use crate::domain::{GroupId, GroupKey, RecordId, StructureGroup, StructureRecord};
    use crate::matcher::ToleranceMatcher;
    use crate::sink::testing::RecordingSink;
    use crate::store::MemoryStore;
    use crate::structure::{Lattice, Site, Structure};

    fn rocksalt(a: f64) -> Structure {
        Structure::new(
            Lattice::cubic(a),
            vec![
                Site::new("Na", [0.0, 0.0, 0.0]),
                Site::new("Cl", [0.5, 0.5, 0.5]),
            ],
        )
    }

    fn displaced_rocksalt(a: f64) -> Structure {
        Structure::new(
            Lattice::cubic(a),
            vec![
                Site::new("Na", [0.0, 0.0, 0.0]),
                Site::new("Cl", [0.5, 0.5, 0.1]),
            ],
        )
    }

    fn group(id: u64, members: &[u64], canonical: u64, structure: &Structure) -> StructureGroup {
        serde_json::from_value(serde_json::json!({
            "groupId": id,
            "memberRecordIds": members,
            "canonicalRecordId": canonical,
            "canonicalStructure": structure,
            "canonicalKey": GroupKey::new("Cl Na", 225),
        }))
        .expect("test group should be valid")
    }

    fn record(id: u64, structure: Structure) -> StructureRecord {
        StructureRecord {
            record_id: RecordId(id),
            spacegroup: 225,
            structure,
            group_key: GroupKey::new("Cl Na", 225),
        }
    }

    #[test]
    fn non_canonical_members_are_compared_against_the_canonical() {
        let canonical = rocksalt(5.64);
        let mut store = MemoryStore::new();
        store.insert_group(group(1, &[10, 11, 12], 10, &canonical));
        store.insert_record(record(10, canonical.clone()));
        store.insert_record(record(11, rocksalt(5.7)));
        store.insert_record(record(12, displaced_rocksalt(5.64)));

        let matcher = ToleranceMatcher::default();
        let mut sink = RecordingSink::new();
        let summary = GroupMemberChecker::new(&store, &matcher, &mut sink)
            .run(GroupId(0), GroupId(100))
            .expect("run should succeed");

        assert_eq!(summary.groups_checked, 1);
        assert_eq!(summary.members_compared, 2);
        assert_eq!(summary.matches, 1);
        assert_eq!(sink.points.len(), 2);

        // Offsets spread the members of one group: record 11 is index 1,
        // record 12 is index 2, with spread 0.3 / 3 = 0.1.
        let first = &sink.points[0];
        assert_eq!(first.text, "record_id: 11");
        assert!((first.x - 10.1).abs() < 1e-12);
        assert!((first.y - 1.1).abs() < 1e-12);
        let second = &sink.points[1];
        assert_eq!(second.text, "record_id: 12");
        assert!((second.x - 10.2).abs() < 1e-12);
        assert!((second.y - 0.2).abs() < 1e-12);
    }

    #[test]
    fn single_member_groups_emit_nothing() {
        let canonical = rocksalt(5.64);
        let mut store = MemoryStore::new();
        store.insert_group(group(1, &[10], 10, &canonical));
        store.insert_record(record(10, canonical));

        let matcher = ToleranceMatcher::default();
        let mut sink = RecordingSink::new();
        let summary = GroupMemberChecker::new(&store, &matcher, &mut sink)
            .run(GroupId(0), GroupId(100))
            .expect("run should succeed");

        assert_eq!(summary.groups_checked, 1);
        assert_eq!(summary.members_compared, 0);
        assert!(sink.points.is_empty());
    }

    #[test]
    fn missing_member_records_are_skipped_not_fatal() {
        let canonical = rocksalt(5.64);
        let mut store = MemoryStore::new();
        store.insert_group(group(1, &[10, 11, 12], 10, &canonical));
        store.insert_record(record(10, canonical.clone()));
        // Record 11 is absent; record 12 is present.
        store.insert_record(record(12, canonical));

        let matcher = ToleranceMatcher::default();
        let mut sink = RecordingSink::new();
        let summary = GroupMemberChecker::new(&store, &matcher, &mut sink)
            .run(GroupId(0), GroupId(100))
            .expect("run should succeed");

        assert_eq!(summary.members_compared, 1);
        assert_eq!(summary.skipped_members, 1);
        assert_eq!(sink.points.len(), 1);
        assert_eq!(sink.points[0].text, "record_id: 12");
    }

    #[test]
    fn range_bounds_are_half_open() {
        let canonical = rocksalt(5.64);
        let mut store = MemoryStore::new();
        for id in [3u64, 4, 5] {
            store.insert_group(group(id, &[id * 10], id * 10, &canonical));
        }

        let matcher = ToleranceMatcher::default();
        let mut sink = RecordingSink::new();
        let summary = GroupMemberChecker::new(&store, &matcher, &mut sink)
            .run(GroupId(3), GroupId(5))
            .expect("run should succeed");

        assert_eq!(summary.groups_checked, 2);
    }
}
