use crate::domain::{CheckError, CheckResult, GroupId};
use crate::matcher::{ComparatorVerdict, StructureComparator};
use crate::sink::{StreamPoint, VerdictSink};
use crate::store::{GroupResolver, RecordStore, Resolution};
use tracing::{debug, info, warn};

/// One keep-alive tick to the stream per this many fast-path skips, so long
/// stretches of key mismatches do not look like a dead channel.
const KEEP_ALIVE_EVERY: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanonicalCheckSummary {
    pub candidates: usize,
    pub compared: usize,
    pub matches: usize,
    pub fast_path_skips: usize,
    pub missing_groups: usize,
}

/// One-vs-many canonical check: a single primary group's canonical structure
/// against every secondary group in an id range. The group key acts as a
/// cheap pre-filter; the comparator only runs when composition and spacegroup
/// already agree.
pub struct CanonicalChecker<'a, S: RecordStore, M: StructureComparator> {
    store: &'a S,
    matcher: &'a M,
    sink: &'a mut dyn VerdictSink,
}

impl<'a, S: RecordStore, M: StructureComparator> CanonicalChecker<'a, S, M> {
    pub fn new(store: &'a S, matcher: &'a M, sink: &'a mut dyn VerdictSink) -> Self {
        Self {
            store,
            matcher,
            sink,
        }
    }

    pub fn run(
        &mut self,
        primary_id: GroupId,
        secondary_start: GroupId,
        secondary_end: GroupId,
    ) -> CheckResult<CanonicalCheckSummary> {
        let primary = match self.store.fetch_group(primary_id) {
            Ok(Some(group)) => group,
            Ok(None) => {
                return Err(CheckError::input_validation(
                    "GROUP.MISSING",
                    format!("primary group {primary_id} does not exist"),
                ));
            }
            Err(error) => return Err(CheckError::from(error)),
        };

        let secondary_ids: Vec<GroupId> = self
            .store
            .group_ids_in_range(secondary_start, secondary_end)
            .map_err(CheckError::from)?
            .into_iter()
            .filter(|id| *id != primary_id)
            .collect();

        self.sink
            .open()
            .map_err(|error| CheckError::sink("SINK.OPEN", error.to_string()))?;

        let mut resolver = GroupResolver::new(self.store, false);
        let mut summary = CanonicalCheckSummary {
            candidates: secondary_ids.len(),
            ..CanonicalCheckSummary::default()
        };
        let spread = if secondary_ids.is_empty() {
            0.0
        } else {
            0.3 / secondary_ids.len() as f64
        };

        for (index, secondary_id) in secondary_ids.iter().enumerate() {
            let secondary = match resolver.resolve(*secondary_id) {
                Resolution::Found(group) => group,
                Resolution::NotFound => {
                    summary.missing_groups += 1;
                    continue;
                }
            };

            if secondary.canonical_key != primary.canonical_key {
                summary.fast_path_skips += 1;
                if summary.fast_path_skips % KEEP_ALIVE_EVERY == 0 {
                    debug!(
                        skips = summary.fast_path_skips,
                        "still scanning; sending keep-alive"
                    );
                    if let Err(error) = self.sink.keep_alive() {
                        warn!(error = %error, "keep-alive failed; continuing");
                    }
                }
                continue;
            }

            let outcome = match self
                .matcher
                .compare(&primary.canonical_structure, &secondary.canonical_structure)
            {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(
                        primary = %primary_id,
                        secondary = %secondary_id,
                        error = %error,
                        "comparator failure; skipping candidate"
                    );
                    continue;
                }
            };
            summary.compared += 1;
            let matched = matches!(outcome, ComparatorVerdict::Match);
            if matched {
                summary.matches += 1;
                info!(
                    primary = %primary_id,
                    secondary = %secondary_id,
                    key = %primary.canonical_key,
                    "canonical structures match across groups"
                );
            }

            // The extra 0.1 on x keeps this mode's points off the member-check
            // columns when both land on one chart.
            let offset = spread * index as f64;
            let point = StreamPoint {
                x: primary_id.0 as f64 + offset + 0.1,
                y: if matched { 1.0 } else { 0.0 } + offset,
                text: format!("group_id: {secondary_id}"),
            };
            if let Err(error) = self.sink.write_point(&point) {
                warn!(error = %error, "point write failed; continuing");
            }
        }

        info!(
            candidates = summary.candidates,
            compared = summary.compared,
            matches = summary.matches,
            fast_path_skips = summary.fast_path_skips,
            missing_groups = summary.missing_groups,
            "canonical run finished"
        );
        if let Err(error) = self.sink.close() {
            warn!(error = %error, "sink close failed");
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::CanonicalChecker;
    use crate::domain::{CheckErrorCategory, GroupId, GroupKey, StructureGroup};
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

    fn group(id: u64, spacegroup: u16, structure: Structure) -> StructureGroup {
        let formula = structure.composition().reduced_formula_abc();
        serde_json::from_value(serde_json::json!({
            "groupId": id,
            "memberRecordIds": [id * 100],
            "canonicalRecordId": id * 100,
            "canonicalStructure": structure,
            "canonicalKey": GroupKey::new(formula, spacegroup),
        }))
        .expect("test group should be valid")
    }

    #[test]
    fn missing_primary_group_is_a_usage_error() {
        let store = MemoryStore::new();
        let matcher = ToleranceMatcher::default();
        let mut sink = RecordingSink::new();
        let error = CanonicalChecker::new(&store, &matcher, &mut sink)
            .run(GroupId(1), GroupId(0), GroupId(10))
            .expect_err("missing primary should be fatal");
        assert_eq!(error.category(), CheckErrorCategory::InputValidation);
    }

    #[test]
    fn key_mismatch_skips_the_comparator() {
        let mut store = MemoryStore::new();
        store.insert_group(group(1, 225, rocksalt(5.64)));
        // Same composition, different spacegroup: fast-path skip.
        store.insert_group(group(2, 221, rocksalt(5.64)));
        store.insert_group(group(3, 225, rocksalt(5.7)));

        let matcher = ToleranceMatcher::default();
        let mut sink = RecordingSink::new();
        let summary = CanonicalChecker::new(&store, &matcher, &mut sink)
            .run(GroupId(1), GroupId(0), GroupId(10))
            .expect("run should succeed");

        assert_eq!(summary.candidates, 2);
        assert_eq!(summary.fast_path_skips, 1);
        assert_eq!(summary.compared, 1);
        assert_eq!(summary.matches, 1);
        assert_eq!(sink.points.len(), 1);
    }

    #[test]
    fn primary_is_excluded_from_its_own_secondary_range() {
        let mut store = MemoryStore::new();
        store.insert_group(group(5, 225, rocksalt(5.64)));

        let matcher = ToleranceMatcher::default();
        let mut sink = RecordingSink::new();
        let summary = CanonicalChecker::new(&store, &matcher, &mut sink)
            .run(GroupId(5), GroupId(0), GroupId(10))
            .expect("run should succeed");

        assert_eq!(summary.candidates, 0);
        assert_eq!(summary.compared, 0);
        assert!(sink.points.is_empty());
    }

    #[test]
    fn point_offsets_follow_the_candidate_index() {
        let mut store = MemoryStore::new();
        store.insert_group(group(1, 225, rocksalt(5.64)));
        store.insert_group(group(2, 225, rocksalt(5.64)));
        store.insert_group(group(3, 225, rocksalt(9.0)));

        let matcher = ToleranceMatcher::default();
        let mut sink = RecordingSink::new();
        let summary = CanonicalChecker::new(&store, &matcher, &mut sink)
            .run(GroupId(1), GroupId(2), GroupId(4))
            .expect("run should succeed");

        assert_eq!(summary.candidates, 2);
        assert_eq!(sink.points.len(), 2);
        // spread = 0.3 / 2; candidate index 0 then 1.
        assert!((sink.points[0].x - 1.1).abs() < 1e-12);
        assert!((sink.points[0].y - 1.0).abs() < 1e-12);
        assert_eq!(sink.points[0].text, "group_id: 2");
        assert!((sink.points[1].x - 1.25).abs() < 1e-12);
        assert_eq!(sink.points[1].text, "group_id: 3");
    }
}
