use crate::domain::{CheckError, CheckResult, RecordId};
use crate::sink::{HeatmapCell, VerdictSink};
use crate::store::RecordStore;
use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;
use tracing::{info, warn};

const LENGTH_RTOL: f64 = 1.0e-3;
const ANGLE_TOL_DEG: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrystalSystem {
    Triclinic,
    Monoclinic,
    Orthorhombic,
    Tetragonal,
    Trigonal,
    Hexagonal,
    Cubic,
}

impl CrystalSystem {
    /// International Tables spacegroup numbers belonging to this system.
    pub const fn spacegroup_range(self) -> RangeInclusive<u16> {
        match self {
            Self::Triclinic => 1..=2,
            Self::Monoclinic => 3..=15,
            Self::Orthorhombic => 16..=74,
            Self::Tetragonal => 75..=142,
            Self::Trigonal => 143..=167,
            Self::Hexagonal => 168..=194,
            Self::Cubic => 195..=230,
        }
    }

    pub fn of_spacegroup(spacegroup: u16) -> Option<Self> {
        const SYSTEMS: [CrystalSystem; 7] = [
            CrystalSystem::Triclinic,
            CrystalSystem::Monoclinic,
            CrystalSystem::Orthorhombic,
            CrystalSystem::Tetragonal,
            CrystalSystem::Trigonal,
            CrystalSystem::Hexagonal,
            CrystalSystem::Cubic,
        ];
        SYSTEMS
            .into_iter()
            .find(|system| system.spacegroup_range().contains(&spacegroup))
    }

    /// Whether a spacegroup of this system can live on `lattice_system`.
    /// Trigonal spacegroups accept both settings: a hexagonal cell or a
    /// rhombohedral one (which classifies as `Trigonal` here).
    pub fn accepts_lattice(self, lattice_system: CrystalSystem) -> bool {
        match self {
            Self::Trigonal => matches!(lattice_system, Self::Trigonal | Self::Hexagonal),
            other => lattice_system == other,
        }
    }
}

impl Display for CrystalSystem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Triclinic => "triclinic",
            Self::Monoclinic => "monoclinic",
            Self::Orthorhombic => "orthorhombic",
            Self::Tetragonal => "tetragonal",
            Self::Trigonal => "trigonal",
            Self::Hexagonal => "hexagonal",
            Self::Cubic => "cubic",
        };
        f.write_str(name)
    }
}

fn lengths_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= LENGTH_RTOL * a.max(b)
}

fn angle_is(angle: f64, target: f64) -> bool {
    (angle - target).abs() <= ANGLE_TOL_DEG
}

/// Classifies a lattice into its crystal system from cell parameters alone.
/// Branches are ordered most-symmetric first so near-degenerate cells fall
/// into the highest symmetry their parameters support.
pub fn crystal_system(lattice: &crate::structure::Lattice) -> CrystalSystem {
    let [a, b, c] = lattice.lengths();
    let [alpha, beta, gamma] = lattice.angles();

    let ab = lengths_close(a, b);
    let bc = lengths_close(b, c);
    let all_lengths = ab && bc;
    let right = [alpha, beta, gamma].map(|angle| angle_is(angle, 90.0));
    let all_right = right.iter().all(|flag| *flag);

    if all_lengths && all_right {
        return CrystalSystem::Cubic;
    }
    if ab && all_right {
        return CrystalSystem::Tetragonal;
    }
    if ab && right[0] && right[1] && angle_is(gamma, 120.0) {
        return CrystalSystem::Hexagonal;
    }
    // Rhombohedral setting: equal edges, equal non-right angles.
    if all_lengths
        && angle_is(alpha, beta)
        && angle_is(beta, gamma)
        && !angle_is(alpha, 90.0)
    {
        return CrystalSystem::Trigonal;
    }
    if all_right {
        return CrystalSystem::Orthorhombic;
    }
    if right.iter().filter(|flag| **flag).count() == 2 {
        return CrystalSystem::Monoclinic;
    }
    CrystalSystem::Triclinic
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpacegroupAuditSummary {
    pub records: usize,
    pub consistent: usize,
    pub inconsistent: usize,
    pub missing_records: usize,
}

/// Spacegroup sanity audit: for each record the declared spacegroup number
/// must belong to a crystal system compatible with the record's lattice.
/// Each record becomes one heatmap cell, 1 for consistent and 0 otherwise.
pub struct SpacegroupAuditor<'a, S: RecordStore> {
    store: &'a S,
    sink: &'a mut dyn VerdictSink,
}

impl<'a, S: RecordStore> SpacegroupAuditor<'a, S> {
    pub fn new(store: &'a S, sink: &'a mut dyn VerdictSink) -> Self {
        Self { store, sink }
    }

    pub fn run(&mut self, start: RecordId, end: RecordId) -> CheckResult<SpacegroupAuditSummary> {
        let ids = self
            .store
            .record_ids_in_range(start, end)
            .map_err(CheckError::from)?;

        self.sink
            .open()
            .map_err(|error| CheckError::sink("SINK.OPEN", error.to_string()))?;

        let mut summary = SpacegroupAuditSummary::default();
        for (index, id) in ids.iter().enumerate() {
            let record = match self.store.fetch_record(*id) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    warn!(record_id = %id, "record listed in range but not fetchable");
                    summary.missing_records += 1;
                    continue;
                }
                Err(error) => {
                    warn!(record_id = %id, error = %error, "record fetch failed; skipping");
                    summary.missing_records += 1;
                    continue;
                }
            };
            summary.records += 1;

            let lattice_system = crystal_system(&record.structure.lattice);
            let consistent = match CrystalSystem::of_spacegroup(record.spacegroup) {
                Some(declared) => declared.accepts_lattice(lattice_system),
                None => {
                    warn!(
                        record_id = %id,
                        spacegroup = record.spacegroup,
                        "spacegroup number out of range 1..=230"
                    );
                    false
                }
            };
            if consistent {
                summary.consistent += 1;
            } else {
                summary.inconsistent += 1;
                warn!(
                    record_id = %id,
                    spacegroup = record.spacegroup,
                    lattice_system = %lattice_system,
                    "declared spacegroup inconsistent with lattice"
                );
            }

            let cell = HeatmapCell {
                row: 0,
                column: index,
                value: u8::from(consistent),
            };
            if let Err(error) = self.sink.write_cell(&cell) {
                warn!(error = %error, "cell write failed; continuing");
            }
        }

        info!(
            records = summary.records,
            consistent = summary.consistent,
            inconsistent = summary.inconsistent,
            missing_records = summary.missing_records,
            "spacegroup audit finished"
        );
        if let Err(error) = self.sink.close() {
            warn!(error = %error, "sink close failed");
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::{CrystalSystem, SpacegroupAuditor, crystal_system};
    use crate::domain::{GroupKey, RecordId, StructureRecord};
    use crate::sink::testing::RecordingSink;
    use crate::store::MemoryStore;
    use crate::structure::{Lattice, Site, Structure};

    fn hexagonal(a: f64, c: f64) -> Lattice {
        let half = 0.5 * a;
        let height = a * 3.0_f64.sqrt() / 2.0;
        Lattice::new([[a, 0.0, 0.0], [-half, height, 0.0], [0.0, 0.0, c]])
    }

    fn rhombohedral(a: f64, alpha_deg: f64) -> Lattice {
        // Three equal-length vectors around the threefold axis with pairwise
        // angle alpha.
        let cos = alpha_deg.to_radians().cos();
        let r = a * (2.0 / 3.0 * (1.0 - cos)).sqrt();
        let h = a * ((1.0 + 2.0 * cos) / 3.0).sqrt();
        let angles = [0.0_f64, 120.0, 240.0].map(|d| d.to_radians());
        Lattice::new(angles.map(|phi| [r * phi.cos(), r * phi.sin(), h]))
    }

    #[test]
    fn classification_covers_the_seven_systems() {
        let cases = [
            (Lattice::cubic(4.0), CrystalSystem::Cubic),
            (
                Lattice::orthorhombic(4.0, 4.0, 6.0),
                CrystalSystem::Tetragonal,
            ),
            (
                Lattice::orthorhombic(4.0, 5.0, 6.0),
                CrystalSystem::Orthorhombic,
            ),
            (hexagonal(3.2, 5.2), CrystalSystem::Hexagonal),
            (rhombohedral(5.0, 70.0), CrystalSystem::Trigonal),
            (
                // beta = 105 degrees, alpha = gamma = 90.
                Lattice::new([
                    [4.0, 0.0, 0.0],
                    [0.0, 5.0, 0.0],
                    [6.0 * 105.0_f64.to_radians().cos(), 0.0, 6.0 * 105.0_f64.to_radians().sin()],
                ]),
                CrystalSystem::Monoclinic,
            ),
            (
                Lattice::new([
                    [4.0, 0.0, 0.0],
                    [0.5, 5.0, 0.0],
                    [0.7, 0.9, 6.0],
                ]),
                CrystalSystem::Triclinic,
            ),
        ];
        for (lattice, expected) in cases {
            assert_eq!(crystal_system(&lattice), expected, "lattice {lattice:?}");
        }
    }

    #[test]
    fn spacegroup_number_maps_to_its_system() {
        let cases = [
            (1, Some(CrystalSystem::Triclinic)),
            (2, Some(CrystalSystem::Triclinic)),
            (3, Some(CrystalSystem::Monoclinic)),
            (15, Some(CrystalSystem::Monoclinic)),
            (16, Some(CrystalSystem::Orthorhombic)),
            (74, Some(CrystalSystem::Orthorhombic)),
            (75, Some(CrystalSystem::Tetragonal)),
            (142, Some(CrystalSystem::Tetragonal)),
            (143, Some(CrystalSystem::Trigonal)),
            (167, Some(CrystalSystem::Trigonal)),
            (168, Some(CrystalSystem::Hexagonal)),
            (194, Some(CrystalSystem::Hexagonal)),
            (195, Some(CrystalSystem::Cubic)),
            (230, Some(CrystalSystem::Cubic)),
            (0, None),
            (231, None),
        ];
        for (spacegroup, expected) in cases {
            assert_eq!(CrystalSystem::of_spacegroup(spacegroup), expected);
        }
    }

    #[test]
    fn trigonal_spacegroups_accept_both_lattice_settings() {
        assert!(CrystalSystem::Trigonal.accepts_lattice(CrystalSystem::Hexagonal));
        assert!(CrystalSystem::Trigonal.accepts_lattice(CrystalSystem::Trigonal));
        assert!(!CrystalSystem::Trigonal.accepts_lattice(CrystalSystem::Cubic));
        assert!(!CrystalSystem::Hexagonal.accepts_lattice(CrystalSystem::Trigonal));
    }

    fn record(id: u64, spacegroup: u16, lattice: Lattice) -> StructureRecord {
        StructureRecord {
            record_id: RecordId(id),
            spacegroup,
            structure: Structure::new(lattice, vec![Site::new("Si", [0.0, 0.0, 0.0])]),
            group_key: GroupKey::new("Si", spacegroup),
        }
    }

    #[test]
    fn audit_emits_one_cell_per_record_in_id_order() {
        let mut store = MemoryStore::new();
        store.insert_record(record(1, 225, Lattice::cubic(5.4)));
        store.insert_record(record(2, 225, Lattice::orthorhombic(4.0, 5.0, 6.0)));
        store.insert_record(record(3, 160, hexagonal(3.2, 5.2)));
        store.insert_record(record(4, 0, Lattice::cubic(5.4)));

        let mut sink = RecordingSink::new();
        let summary = SpacegroupAuditor::new(&store, &mut sink)
            .run(RecordId(0), RecordId(10))
            .expect("audit should succeed");

        assert_eq!(summary.records, 4);
        assert_eq!(summary.consistent, 2);
        assert_eq!(summary.inconsistent, 2);

        let values: Vec<(usize, u8)> = sink
            .cells
            .iter()
            .map(|cell| (cell.column, cell.value))
            .collect();
        assert_eq!(values, vec![(0, 1), (1, 0), (2, 1), (3, 0)]);
        assert!(sink.cells.iter().all(|cell| cell.row == 0));
    }
}
