//! Tolerance-based structural comparison.
//!
//! [`ToleranceMatcher`] answers "same structure up to tolerance" for two
//! crystal structures: a reduced-composition gate, volume normalization,
//! lattice-parameter comparison, then a periodic site mapping under a set of
//! candidate origin shifts. The result is ternary; callers must not collapse
//! `Incomparable` into a boolean.

use crate::structure::Structure;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparatorVerdict {
    Match,
    NoMatch,
    Incomparable,
}

pub trait StructureComparator {
    /// Symmetric and deterministic for a fixed tolerance configuration:
    /// `compare(a, b)` and `compare(b, a)` yield the same verdict.
    fn compare(&self, a: &Structure, b: &Structure) -> Result<ComparatorVerdict, MatcherError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatcherError {
    #[error("structure has no sites")]
    EmptyStructure,
    #[error("lattice is degenerate (volume {volume:e})")]
    DegenerateLattice { volume: f64 },
}

/// Tolerances mirroring the production deduplication settings: fractional
/// length tolerance 0.2, site tolerance 0.3 (as a fraction of the ideal
/// inter-site spacing), angle tolerance 5 degrees, volume scaling enabled.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatcherConfig {
    #[serde(default = "default_ltol")]
    pub ltol: f64,
    #[serde(default = "default_stol")]
    pub stol: f64,
    #[serde(default = "default_angle_tol")]
    pub angle_tol: f64,
    #[serde(default = "default_scale")]
    pub scale: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            ltol: default_ltol(),
            stol: default_stol(),
            angle_tol: default_angle_tol(),
            scale: default_scale(),
        }
    }
}

fn default_ltol() -> f64 {
    0.2
}

fn default_stol() -> f64 {
    0.3
}

fn default_angle_tol() -> f64 {
    5.0
}

fn default_scale() -> bool {
    true
}

#[derive(Debug, Clone, Default)]
pub struct ToleranceMatcher {
    config: MatcherConfig,
}

impl ToleranceMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    fn compare_ordered(
        &self,
        reference: &Structure,
        candidate: &Structure,
    ) -> Result<ComparatorVerdict, MatcherError> {
        let reference_composition = reference.composition().reduced();
        let candidate_composition = candidate.composition().reduced();
        if reference_composition != candidate_composition {
            return Ok(ComparatorVerdict::Incomparable);
        }

        // TODO: reduce both cells to primitive form before site mapping so a
        // supercell and its primitive cell compare as a match.
        if reference.num_sites() != candidate.num_sites() {
            return Ok(ComparatorVerdict::NoMatch);
        }

        let candidate = if self.config.scale {
            let target = reference.lattice.volume();
            Structure::new(
                candidate.lattice.scaled_to_volume(target),
                candidate.sites.clone(),
            )
        } else {
            candidate.clone()
        };

        if !self.lattices_agree(reference, &candidate) {
            return Ok(ComparatorVerdict::NoMatch);
        }

        if self.sites_map(reference, &candidate) {
            Ok(ComparatorVerdict::Match)
        } else {
            Ok(ComparatorVerdict::NoMatch)
        }
    }

    fn lattices_agree(&self, reference: &Structure, candidate: &Structure) -> bool {
        let mut reference_lengths = reference.lattice.lengths();
        let mut candidate_lengths = candidate.lattice.lengths();
        sort_f64(&mut reference_lengths);
        sort_f64(&mut candidate_lengths);
        for (r, c) in reference_lengths.iter().zip(candidate_lengths.iter()) {
            if (r - c).abs() > self.config.ltol * r.max(*c) {
                return false;
            }
        }

        let mut reference_angles = reference.lattice.angles();
        let mut candidate_angles = candidate.lattice.angles();
        sort_f64(&mut reference_angles);
        sort_f64(&mut candidate_angles);
        reference_angles
            .iter()
            .zip(candidate_angles.iter())
            .all(|(r, c)| (r - c).abs() <= self.config.angle_tol)
    }

    /// Attempts a one-to-one site assignment under every candidate origin
    /// shift that moves the reference's first site onto a same-element
    /// candidate site (rigid-translation tolerance).
    fn sites_map(&self, reference: &Structure, candidate: &Structure) -> bool {
        let cutoff = self.config.stol * reference.volume_per_site().cbrt();
        let anchor = &reference.sites[0];

        let mut shifts: Vec<[f64; 3]> = vec![[0.0; 3]];
        for site in &candidate.sites {
            if site.element == anchor.element {
                shifts.push([
                    site.frac[0] - anchor.frac[0],
                    site.frac[1] - anchor.frac[1],
                    site.frac[2] - anchor.frac[2],
                ]);
            }
        }

        shifts
            .iter()
            .any(|shift| self.map_with_shift(reference, candidate, *shift, cutoff))
    }

    fn map_with_shift(
        &self,
        reference: &Structure,
        candidate: &Structure,
        shift: [f64; 3],
        cutoff: f64,
    ) -> bool {
        let mut used = vec![false; candidate.sites.len()];
        for site in &reference.sites {
            let shifted = [
                site.frac[0] + shift[0],
                site.frac[1] + shift[1],
                site.frac[2] + shift[2],
            ];
            let mut best: Option<(usize, f64)> = None;
            for (index, other) in candidate.sites.iter().enumerate() {
                if used[index] || other.element != site.element {
                    continue;
                }
                let distance = periodic_distance(reference, shifted, other.frac);
                if best.map_or(true, |(_, current)| distance < current) {
                    best = Some((index, distance));
                }
            }
            match best {
                Some((index, distance)) if distance <= cutoff => used[index] = true,
                _ => return false,
            }
        }
        true
    }
}

impl StructureComparator for ToleranceMatcher {
    fn compare(&self, a: &Structure, b: &Structure) -> Result<ComparatorVerdict, MatcherError> {
        for structure in [a, b] {
            if structure.sites.is_empty() {
                return Err(MatcherError::EmptyStructure);
            }
            if structure.lattice.is_degenerate() {
                return Err(MatcherError::DegenerateLattice {
                    volume: structure.lattice.volume(),
                });
            }
        }

        // Argument order must not affect the verdict; pick the mapping
        // direction from a canonical ordering of the two structures.
        if ordering_key(a) <= ordering_key(b) {
            self.compare_ordered(a, b)
        } else {
            self.compare_ordered(b, a)
        }
    }
}

fn ordering_key(structure: &Structure) -> (usize, [i64; 3], [i64; 3]) {
    let quantize = |values: [f64; 3]| {
        let mut sorted = values;
        sort_f64(&mut sorted);
        sorted.map(|value| (value * 1.0e6).round() as i64)
    };
    (
        structure.num_sites(),
        quantize(structure.lattice.lengths()),
        quantize(structure.lattice.angles()),
    )
}

fn sort_f64(values: &mut [f64; 3]) {
    values.sort_by(|a, b| a.total_cmp(b));
}

/// Minimum-image cartesian distance between two fractional positions.
fn periodic_distance(reference: &Structure, a: [f64; 3], b: [f64; 3]) -> f64 {
    let mut delta = [0.0; 3];
    for axis in 0..3 {
        let mut component = a[axis] - b[axis];
        component -= component.round();
        delta[axis] = component;
    }
    let cart = reference.lattice.cartesian(delta);
    (cart[0] * cart[0] + cart[1] * cart[1] + cart[2] * cart[2]).sqrt()
}
