//! Minimal crystal-structure representation: a lattice plus fractional sites.
//!
//! Records are read-only to the engine; everything here is a value type
//! deserialized from store documents.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Row-vector lattice: `matrix[i]` is the cartesian vector of lattice axis i.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lattice {
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    pub fn new(matrix: [[f64; 3]; 3]) -> Self {
        Self { matrix }
    }

    pub fn cubic(a: f64) -> Self {
        Self::new([[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]])
    }

    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Self {
        Self::new([[a, 0.0, 0.0], [0.0, b, 0.0], [0.0, 0.0, c]])
    }

    /// Axis lengths `[a, b, c]` in the row order of the matrix.
    pub fn lengths(&self) -> [f64; 3] {
        [
            norm(self.matrix[0]),
            norm(self.matrix[1]),
            norm(self.matrix[2]),
        ]
    }

    /// Cell angles `[alpha, beta, gamma]` in degrees; alpha is the angle
    /// between axes b and c.
    pub fn angles(&self) -> [f64; 3] {
        [
            angle_between(self.matrix[1], self.matrix[2]),
            angle_between(self.matrix[0], self.matrix[2]),
            angle_between(self.matrix[0], self.matrix[1]),
        ]
    }

    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.matrix;
        let bxc = cross(b, c);
        dot(a, bxc).abs()
    }

    pub fn is_degenerate(&self) -> bool {
        self.volume() < 1.0e-9
    }

    pub fn cartesian(&self, frac: [f64; 3]) -> [f64; 3] {
        let mut cart = [0.0; 3];
        for (axis, row) in self.matrix.iter().enumerate() {
            for component in 0..3 {
                cart[component] += frac[axis] * row[component];
            }
        }
        cart
    }

    /// Isotropically rescaled copy with the requested cell volume.
    pub fn scaled_to_volume(&self, target_volume: f64) -> Self {
        let factor = (target_volume / self.volume()).cbrt();
        let mut matrix = self.matrix;
        for row in &mut matrix {
            for component in row.iter_mut() {
                *component *= factor;
            }
        }
        Self { matrix }
    }
}

fn norm(v: [f64; 3]) -> f64 {
    dot(v, v).sqrt()
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn angle_between(a: [f64; 3], b: [f64; 3]) -> f64 {
    let cosine = (dot(a, b) / (norm(a) * norm(b))).clamp(-1.0, 1.0);
    cosine.acos().to_degrees()
}

/// One occupied site, element symbol plus fractional coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub element: String,
    pub frac: [f64; 3],
}

impl Site {
    pub fn new(element: impl Into<String>, frac: [f64; 3]) -> Self {
        Self {
            element: element.into(),
            frac,
        }
    }
}

/// Element counts of a cell, element-symbol keyed and therefore ordered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Composition {
    counts: BTreeMap<String, u64>,
}

impl Composition {
    pub fn from_sites(sites: &[Site]) -> Self {
        let mut counts = BTreeMap::new();
        for site in sites {
            *counts.entry(site.element.clone()).or_insert(0) += 1;
        }
        Self { counts }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Counts divided by their greatest common divisor, so one and two
    /// formula units of the same compound compare equal.
    pub fn reduced(&self) -> Self {
        let divisor = self.counts.values().copied().fold(0, gcd);
        if divisor <= 1 {
            return self.clone();
        }
        let counts = self
            .counts
            .iter()
            .map(|(element, count)| (element.clone(), count / divisor))
            .collect();
        Self { counts }
    }

    /// Alphabetical reduced formula, the composition signature used to bucket
    /// groups before pairwise comparison, e.g. `"O2 Ti"`.
    pub fn reduced_formula_abc(&self) -> String {
        let reduced = self.reduced();
        let mut parts = Vec::with_capacity(reduced.counts.len());
        for (element, count) in &reduced.counts {
            if *count == 1 {
                parts.push(element.clone());
            } else {
                parts.push(format!("{element}{count}"));
            }
        }
        parts.join(" ")
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub lattice: Lattice,
    pub sites: Vec<Site>,
}

impl Structure {
    pub fn new(lattice: Lattice, sites: Vec<Site>) -> Self {
        Self { lattice, sites }
    }

    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }

    pub fn composition(&self) -> Composition {
        Composition::from_sites(&self.sites)
    }

    pub fn volume_per_site(&self) -> f64 {
        self.lattice.volume() / self.sites.len().max(1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::{Composition, Lattice, Site, Structure};

    #[test]
    fn cubic_lattice_reports_lengths_angles_and_volume() {
        let lattice = Lattice::cubic(4.0);
        assert_eq!(lattice.lengths(), [4.0, 4.0, 4.0]);
        let angles = lattice.angles();
        for angle in angles {
            assert!((angle - 90.0).abs() < 1.0e-9, "angle was {angle}");
        }
        assert!((lattice.volume() - 64.0).abs() < 1.0e-9);
        assert!(!lattice.is_degenerate());
    }

    #[test]
    fn collinear_axes_are_degenerate() {
        let lattice = Lattice::new([[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        assert!(lattice.is_degenerate());
    }

    #[test]
    fn scaling_reaches_target_volume() {
        let lattice = Lattice::cubic(2.0).scaled_to_volume(64.0);
        assert!((lattice.volume() - 64.0).abs() < 1.0e-9);
        assert!((lattice.lengths()[0] - 4.0).abs() < 1.0e-9);
    }

    #[test]
    fn fractional_to_cartesian_uses_row_vectors() {
        let lattice = Lattice::orthorhombic(2.0, 3.0, 4.0);
        let cart = lattice.cartesian([0.5, 0.5, 0.25]);
        assert_eq!(cart, [1.0, 1.5, 1.0]);
    }

    #[test]
    fn reduced_formula_normalizes_formula_units() {
        let one_unit = Composition::from_sites(&[
            Site::new("Ti", [0.0; 3]),
            Site::new("O", [0.0; 3]),
            Site::new("O", [0.0; 3]),
        ]);
        let two_units = Composition::from_sites(&[
            Site::new("Ti", [0.0; 3]),
            Site::new("Ti", [0.0; 3]),
            Site::new("O", [0.0; 3]),
            Site::new("O", [0.0; 3]),
            Site::new("O", [0.0; 3]),
            Site::new("O", [0.0; 3]),
        ]);

        assert_eq!(one_unit.reduced_formula_abc(), "O2 Ti");
        assert_eq!(two_units.reduced_formula_abc(), "O2 Ti");
        assert_eq!(one_unit.reduced(), two_units.reduced());
    }

    #[test]
    fn volume_per_site_divides_by_site_count() {
        let structure = Structure::new(
            Lattice::cubic(4.0),
            vec![Site::new("Na", [0.0; 3]), Site::new("Cl", [0.5; 3])],
        );
        assert!((structure.volume_per_site() - 32.0).abs() < 1.0e-9);
    }
}
