use crate::core::models::structure::Structure;
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ShiftError {
    #[error("no structures to shift")]
    Empty,

    #[error("structure {index} has no energy to shift")]
    MissingEnergy { index: usize },

    #[error("least-squares solve for atomic reference energies failed: {reason}")]
    Solve { reason: &'static str },
}

/// Outcome of an energy shift over a training set.
#[derive(Debug, Clone)]
pub struct ShiftReport {
    /// Fitted per-element atomic reference energy.
    pub reference_energies: BTreeMap<String, f64>,
    pub mean_energy: f64,
    pub max_abs_energy: f64,
}

/// Shifts every structure's energy by its composition-weighted atomic
/// reference energies.
///
/// The reference energies are the least-squares solution of
/// `composition * x = energy` over all frames, solved through an SVD. When
/// the composition matrix is rank-deficient (all frames share one
/// stoichiometry, for instance) the system is regularized with one
/// `e_i - e_j = 0` constraint row per element pair before solving. Forces
/// and virials are left untouched.
pub fn shift_energies(structures: &mut [Structure]) -> Result<ShiftReport, ShiftError> {
    if structures.is_empty() {
        return Err(ShiftError::Empty);
    }

    let mut elements: Vec<String> = structures
        .iter()
        .flat_map(|s| s.species.iter().cloned())
        .collect();
    elements.sort();
    elements.dedup();

    let frames = structures.len();
    let mut composition = DMatrix::<f64>::zeros(frames, elements.len());
    let mut energies = DVector::<f64>::zeros(frames);
    for (i, structure) in structures.iter().enumerate() {
        let counts = structure.element_counts();
        for (j, element) in elements.iter().enumerate() {
            composition[(i, j)] = counts.get(element.as_str()).copied().unwrap_or(0) as f64;
        }
        energies[i] = structure
            .energy
            .ok_or(ShiftError::MissingEnergy { index: i })?;
    }

    let probe = composition.clone().svd(false, false);
    let rank = probe.rank(1e-10 * probe.singular_values.max());
    if rank < elements.len() {
        warn!(
            rank,
            elements = elements.len(),
            "composition matrix is underdetermined, adding element-pair constraints"
        );
        let mut constrained = composition.clone().resize_vertically(
            frames + elements.len() * (elements.len() - 1) / 2,
            0.0,
        );
        let mut row = frames;
        for i in 0..elements.len() {
            for j in (i + 1)..elements.len() {
                constrained[(row, i)] = 1.0;
                constrained[(row, j)] = -1.0;
                row += 1;
            }
        }
        composition = constrained;
        energies = energies.resize_vertically(row, 0.0);
    }

    let svd = composition.clone().svd(true, true);
    let solve_eps = 1e-10 * svd.singular_values.max();
    let reference = svd
        .solve(&energies, solve_eps)
        .map_err(|reason| ShiftError::Solve { reason })?;

    let mut mean = 0.0;
    let mut max_abs = 0.0f64;
    for (i, structure) in structures.iter_mut().enumerate() {
        let baseline: f64 = (0..elements.len())
            .map(|j| composition[(i, j)] * reference[j])
            .sum();
        let shifted = energies[i] - baseline;
        structure.energy = Some(shifted);
        mean += shifted;
        max_abs = max_abs.max(shifted.abs());
    }
    mean /= frames as f64;

    let reference_energies: BTreeMap<String, f64> = elements
        .iter()
        .cloned()
        .zip(reference.iter().copied())
        .collect();
    info!(
        mean_energy = mean,
        max_abs_energy = max_abs,
        ?reference_energies,
        "energies shifted"
    );

    Ok(ShiftReport {
        reference_energies,
        mean_energy: mean,
        max_abs_energy: max_abs,
    })
}
