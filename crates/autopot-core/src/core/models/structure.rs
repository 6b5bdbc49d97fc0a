use nalgebra::{Matrix3, Point3, Vector3};
use std::collections::BTreeMap;

/// A single atomic configuration as exchanged with the external labeling,
/// fitting and exploration services.
///
/// Candidate structures coming back from exploration carry geometry only;
/// energy, virial and forces are filled in once the structure has been
/// labeled by the reference method.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    /// Chemical symbol per atom (e.g. "Te", "Pb").
    pub species: Vec<String>,
    /// Cartesian positions in Angstroms.
    pub positions: Vec<Point3<f64>>,
    /// Cell vectors, one per row.
    pub lattice: Matrix3<f64>,
    /// Periodic-boundary flag per cell vector.
    pub pbc: [bool; 3],
    /// Total energy of the configuration, if labeled.
    pub energy: Option<f64>,
    /// 3x3 virial/stress tensor, if labeled.
    pub virial: Option<Matrix3<f64>>,
    /// Per-atom force vectors, if labeled.
    pub forces: Option<Vec<Vector3<f64>>>,
}

impl Structure {
    /// Creates an unlabeled structure from geometry alone.
    pub fn new(species: Vec<String>, positions: Vec<Point3<f64>>, lattice: Matrix3<f64>) -> Self {
        Self {
            species,
            positions,
            lattice,
            pbc: [true; 3],
            energy: None,
            virial: None,
            forces: None,
        }
    }

    /// Number of atoms in the configuration.
    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// True once the reference method has provided energy and forces.
    pub fn is_labeled(&self) -> bool {
        self.energy.is_some() && self.forces.is_some()
    }

    /// Counts atoms per chemical symbol, in sorted symbol order.
    pub fn element_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for symbol in &self.species {
            *counts.entry(symbol.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_atom_structure() -> Structure {
        Structure::new(
            vec!["Te".to_string(), "Pb".to_string()],
            vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)],
            Matrix3::identity() * 5.0,
        )
    }

    #[test]
    fn new_structure_is_unlabeled() {
        let structure = two_atom_structure();
        assert_eq!(structure.len(), 2);
        assert!(!structure.is_labeled());
        assert_eq!(structure.energy, None);
        assert_eq!(structure.forces, None);
        assert_eq!(structure.pbc, [true; 3]);
    }

    #[test]
    fn labeling_requires_energy_and_forces() {
        let mut structure = two_atom_structure();
        structure.energy = Some(-1.5);
        assert!(!structure.is_labeled());
        structure.forces = Some(vec![Vector3::zeros(), Vector3::zeros()]);
        assert!(structure.is_labeled());
    }

    #[test]
    fn element_counts_are_sorted_by_symbol() {
        let structure = Structure::new(
            vec!["Te".into(), "Pb".into(), "Te".into()],
            vec![Point3::origin(); 3],
            Matrix3::identity(),
        );
        let counts: Vec<_> = structure.element_counts().into_iter().collect();
        assert_eq!(counts, vec![("Pb", 1), ("Te", 2)]);
    }
}
