use crate::core::io::active_set::ActiveSetInverse;
use crate::core::models::descriptors::DescriptorError;
use crate::core::models::structure::Structure;
use nalgebra::DMatrix;

/// A structure is worth labeling once any atom's gamma exceeds this.
pub const EXTRAPOLATION_THRESHOLD: f64 = 1.0;

/// Per-atom extrapolation grades of one structure.
#[derive(Debug, Clone)]
pub struct StructureGrade {
    pub gammas: Vec<f64>,
}

impl StructureGrade {
    pub fn max_gamma(&self) -> f64 {
        self.gammas.iter().copied().fold(0.0, f64::max)
    }

    pub fn is_extrapolating(&self) -> bool {
        self.max_gamma() > EXTRAPOLATION_THRESHOLD
    }
}

/// Grades candidate structures against a stored active set.
///
/// For every atom, `gamma = max_j |projection_row * inverse[element]|`. Atoms
/// of elements without a stored active set keep a gamma of zero. This is a
/// pure function of its inputs; it holds no state between calls.
pub fn grade_structures(
    structures: &[Structure],
    projections: &[DMatrix<f64>],
    asi: &ActiveSetInverse,
) -> Result<Vec<StructureGrade>, DescriptorError> {
    if structures.len() != projections.len() {
        return Err(DescriptorError::LengthMismatch {
            expected: structures.len(),
            found: projections.len(),
        });
    }

    let mut grades = Vec::with_capacity(structures.len());
    for (index, (structure, projection)) in structures.iter().zip(projections).enumerate() {
        if projection.nrows() != structure.len() {
            return Err(DescriptorError::AtomCountMismatch {
                structure: index,
                atoms: structure.len(),
                rows: projection.nrows(),
            });
        }

        let mut gammas = Vec::with_capacity(structure.len());
        for (atom, symbol) in structure.species.iter().enumerate() {
            let Some(inverse) = asi.get(symbol) else {
                gammas.push(0.0);
                continue;
            };
            if inverse.nrows() != projection.ncols() {
                return Err(DescriptorError::WidthMismatch {
                    expected: inverse.nrows(),
                    found: projection.ncols(),
                });
            }
            let projected = projection.row(atom) * inverse;
            gammas.push(projected.amax());
        }
        grades.push(StructureGrade { gammas });
    }

    Ok(grades)
}

/// Indices of the structures whose maximum gamma exceeds the extrapolation
/// threshold.
pub fn extrapolating_indices(grades: &[StructureGrade]) -> Vec<usize> {
    grades
        .iter()
        .enumerate()
        .filter(|(_, grade)| grade.is_extrapolating())
        .map(|(index, _)| index)
        .collect()
}
