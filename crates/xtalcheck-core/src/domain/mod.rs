pub mod errors;

pub use errors::{CheckError, CheckErrorCategory, CheckResult};

use crate::structure::Structure;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Composition plus symmetry signature used to bucket candidates before the
/// expensive pairwise comparison. Two groups with different keys can be
/// skipped without invoking the comparator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupKey {
    pub reduced_formula: String,
    pub spacegroup: u16,
}

impl GroupKey {
    pub fn new(reduced_formula: impl Into<String>, spacegroup: u16) -> Self {
        Self {
            reduced_formula: reduced_formula.into(),
            spacegroup,
        }
    }
}

impl Display for GroupKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}--{}", self.reduced_formula, self.spacegroup)
    }
}

/// One harvested structure record. Created upstream by the harvesting
/// pipeline; the engine never mutates these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureRecord {
    pub record_id: RecordId,
    pub spacegroup: u16,
    pub structure: Structure,
    pub group_key: GroupKey,
}

/// A cluster of records believed to represent the same physical structure,
/// anchored on one canonical member.
///
/// Deserialization enforces the group invariant: the member list contains the
/// canonical record id (and is therefore non-empty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawStructureGroup")]
pub struct StructureGroup {
    pub group_id: GroupId,
    pub member_record_ids: Vec<RecordId>,
    pub canonical_record_id: RecordId,
    pub canonical_structure: Structure,
    pub canonical_key: GroupKey,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStructureGroup {
    group_id: GroupId,
    member_record_ids: Vec<RecordId>,
    canonical_record_id: RecordId,
    canonical_structure: Structure,
    canonical_key: GroupKey,
}

impl TryFrom<RawStructureGroup> for StructureGroup {
    type Error = GroupInvariantError;

    fn try_from(raw: RawStructureGroup) -> Result<Self, Self::Error> {
        if !raw.member_record_ids.contains(&raw.canonical_record_id) {
            return Err(GroupInvariantError {
                group_id: raw.group_id,
                canonical_record_id: raw.canonical_record_id,
            });
        }
        Ok(Self {
            group_id: raw.group_id,
            member_record_ids: raw.member_record_ids,
            canonical_record_id: raw.canonical_record_id,
            canonical_structure: raw.canonical_structure,
            canonical_key: raw.canonical_key,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInvariantError {
    pub group_id: GroupId,
    pub canonical_record_id: RecordId,
}

impl Display for GroupInvariantError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "group {} does not list its canonical record {} as a member",
            self.group_id, self.canonical_record_id
        )
    }
}

impl Error for GroupInvariantError {}

/// Work item for the cross-checker: all groups sharing one composition
/// signature. The grouping query guarantees more than one group id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionBatch {
    pub composition: String,
    pub group_ids: Vec<GroupId>,
}

impl CompositionBatch {
    pub fn pair_count(&self) -> usize {
        let n = self.group_ids.len();
        n * (n.saturating_sub(1)) / 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Match,
    NoMatch,
    /// The canonical structures are not comparable at all, e.g. different
    /// reduced compositions. Reported separately from `NoMatch` so operators
    /// can tell "definitely different" from "not even comparable".
    Incomparable,
}

impl VerdictKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Match => "match",
            Self::NoMatch => "no_match",
            Self::Incomparable => "incomparable",
        }
    }

    pub const fn is_match(self) -> bool {
        matches!(self, Self::Match)
    }
}

impl Display for VerdictKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Outcome of comparing two groups' canonical structures. Streamed and
/// logged, never persisted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchVerdict {
    pub primary: GroupId,
    pub secondary: GroupId,
    pub kind: VerdictKind,
    pub primary_key: GroupKey,
    pub secondary_key: GroupKey,
}

impl MatchVerdict {
    pub fn log_line(&self) -> String {
        format!(
            "{}:{}, {}:{} = {}",
            self.primary, self.primary_key, self.secondary, self.secondary_key, self.kind
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CompositionBatch, GroupId, GroupKey, MatchVerdict, RecordId, StructureGroup, VerdictKind,
    };

    #[test]
    fn group_key_renders_formula_and_spacegroup() {
        let key = GroupKey::new("Cl Na", 225);
        assert_eq!(key.to_string(), "Cl Na--225");
    }

    #[test]
    fn group_deserialization_rejects_missing_canonical_member() {
        let json = r#"
        {
          "groupId": 7,
          "memberRecordIds": [10, 11],
          "canonicalRecordId": 12,
          "canonicalStructure": {
            "lattice": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            "sites": [{ "element": "Na", "frac": [0.0, 0.0, 0.0] }]
          },
          "canonicalKey": { "reducedFormula": "Na", "spacegroup": 229 }
        }
        "#;

        let error = serde_json::from_str::<StructureGroup>(json)
            .expect_err("group without canonical member should be rejected");
        assert!(error.to_string().contains("canonical record 12"));
    }

    #[test]
    fn group_deserialization_accepts_valid_documents() {
        let json = r#"
        {
          "groupId": 7,
          "memberRecordIds": [10, 11, 12],
          "canonicalRecordId": 12,
          "canonicalStructure": {
            "lattice": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            "sites": [{ "element": "Na", "frac": [0.0, 0.0, 0.0] }]
          },
          "canonicalKey": { "reducedFormula": "Na", "spacegroup": 229 }
        }
        "#;

        let group = serde_json::from_str::<StructureGroup>(json)
            .expect("valid group document should deserialize");
        assert_eq!(group.group_id, GroupId(7));
        assert_eq!(group.canonical_record_id, RecordId(12));
        assert_eq!(group.member_record_ids.len(), 3);
    }

    #[test]
    fn pair_count_is_upper_triangular() {
        for (k, expected) in [(0usize, 0usize), (1, 0), (2, 1), (5, 10), (100, 4950)] {
            let batch = CompositionBatch {
                composition: "X".to_string(),
                group_ids: (0..k as u64).map(GroupId).collect(),
            };
            assert_eq!(batch.pair_count(), expected, "k={k}");
        }
    }

    #[test]
    fn verdict_log_line_matches_operator_format() {
        let verdict = MatchVerdict {
            primary: GroupId(1),
            secondary: GroupId(2),
            kind: VerdictKind::Match,
            primary_key: GroupKey::new("Cl Na", 225),
            secondary_key: GroupKey::new("Cl Na", 225),
        };
        assert_eq!(verdict.log_line(), "1:Cl Na--225, 2:Cl Na--225 = match");
    }
}
