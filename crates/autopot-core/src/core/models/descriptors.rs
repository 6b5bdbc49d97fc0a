use super::structure::Structure;
use nalgebra::DMatrix;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("expected {expected} projection matrices, got {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("structure {structure} has {atoms} atoms but its projection has {rows} rows")]
    AtomCountMismatch {
        structure: usize,
        atoms: usize,
        rows: usize,
    },

    #[error("descriptor width mismatch: expected {expected} components, got {found}")]
    WidthMismatch { expected: usize, found: usize },

    #[error("element {element} is not supported by the fitted potential")]
    UnsupportedElement { element: String },
}

/// All descriptor rows of one chemical element, in encounter order, together
/// with the index of the structure each row originated from.
#[derive(Debug, Clone)]
pub struct DescriptorSet {
    pub element: String,
    /// One row per atomic environment; columns are descriptor components.
    pub matrix: DMatrix<f64>,
    /// `sources[i]` is the structure index that produced row `i`.
    pub sources: Vec<usize>,
}

impl DescriptorSet {
    pub fn rows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn cols(&self) -> usize {
        self.matrix.ncols()
    }
}

/// Per-element descriptor matrices assembled from the per-structure
/// projection matrices returned by the surrogate potential.
#[derive(Debug, Clone)]
pub struct DescriptorPool {
    sets: Vec<DescriptorSet>,
}

impl DescriptorPool {
    /// Groups per-atom descriptor rows by chemical element.
    ///
    /// `projections[i]` must have one row per atom of `structures[i]`; every
    /// atom's species must be one of `elements`. Elements with no atoms in
    /// the input still receive an (empty) set, so that downstream selection
    /// can report the missing-environments precondition per element.
    pub fn from_projections(
        structures: &[Structure],
        projections: &[DMatrix<f64>],
        elements: &[String],
    ) -> Result<Self, DescriptorError> {
        if structures.len() != projections.len() {
            return Err(DescriptorError::LengthMismatch {
                expected: structures.len(),
                found: projections.len(),
            });
        }

        let width = projections.iter().map(|p| p.ncols()).max().unwrap_or(0);

        let mut rows: BTreeMap<&str, (Vec<f64>, Vec<usize>)> = BTreeMap::new();
        let mut sorted_elements: Vec<&str> = elements.iter().map(String::as_str).collect();
        sorted_elements.sort_unstable();
        sorted_elements.dedup();
        for &element in &sorted_elements {
            rows.insert(element, (Vec::new(), Vec::new()));
        }

        for (index, (structure, projection)) in structures.iter().zip(projections).enumerate() {
            if projection.nrows() != structure.len() {
                return Err(DescriptorError::AtomCountMismatch {
                    structure: index,
                    atoms: structure.len(),
                    rows: projection.nrows(),
                });
            }
            if projection.ncols() != width {
                return Err(DescriptorError::WidthMismatch {
                    expected: width,
                    found: projection.ncols(),
                });
            }
            for (atom, symbol) in structure.species.iter().enumerate() {
                let (values, sources) =
                    rows.get_mut(symbol.as_str())
                        .ok_or_else(|| DescriptorError::UnsupportedElement {
                            element: symbol.clone(),
                        })?;
                values.extend(projection.row(atom).iter());
                sources.push(index);
            }
        }

        let sets = rows
            .into_iter()
            .map(|(element, (values, sources))| DescriptorSet {
                element: element.to_string(),
                matrix: DMatrix::from_row_slice(sources.len(), width, &values),
                sources,
            })
            .collect();

        Ok(Self { sets })
    }

    /// Per-element sets, sorted by chemical symbol.
    pub fn sets(&self) -> &[DescriptorSet] {
        &self.sets
    }
}
