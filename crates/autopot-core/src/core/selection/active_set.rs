use super::batched::{SelectionOptions, select_rows};
use super::maxvol::SelectionError;
use super::pseudo_inverse;
use crate::core::io::active_set::ActiveSetInverse;
use crate::core::models::descriptors::DescriptorPool;
use nalgebra::DMatrix;
use std::collections::BTreeSet;
use tracing::info;

/// The selected active set of one chemical element.
#[derive(Debug, Clone)]
pub struct ElementActiveSet {
    pub element: String,
    /// The selected square submatrix of descriptor rows.
    pub basis: DMatrix<f64>,
    /// Pseudo-inverse of `basis`.
    pub inverse: DMatrix<f64>,
    /// Selected row positions within the element's descriptor set.
    pub rows: Vec<usize>,
    /// Structure index each selected row originated from.
    pub sources: Vec<usize>,
    /// False when refinement returned the best set without converging.
    pub converged: bool,
}

/// Active sets for every element plus the union of contributing structures.
#[derive(Debug, Clone)]
pub struct ActiveSetSelection {
    /// Per-element results, sorted by chemical symbol.
    pub elements: Vec<ElementActiveSet>,
    /// Deduplicated, ascending indices of every structure that contributed a
    /// selected environment to any element.
    pub structures: Vec<usize>,
}

impl ActiveSetSelection {
    /// The per-element pseudo-inverse map in its serializable form.
    pub fn inverse_map(&self) -> ActiveSetInverse {
        self.elements
            .iter()
            .map(|set| (set.element.clone(), set.inverse.clone()))
            .collect()
    }

    pub fn fully_converged(&self) -> bool {
        self.elements.iter().all(|set| set.converged)
    }
}

/// Runs MaxVol selection independently for every element of the pool.
///
/// Elements are processed in sorted symbol order; cross-element interactions
/// are not modeled. An element with fewer environments than descriptor
/// components cannot form a square active set and fails the aggregation.
pub fn select_active_set(
    pool: &DescriptorPool,
    options: &SelectionOptions,
) -> Result<ActiveSetSelection, SelectionError> {
    let mut elements = Vec::with_capacity(pool.sets().len());
    let mut structures = BTreeSet::new();

    for set in pool.sets() {
        if set.rows() < set.cols() {
            return Err(SelectionError::NotEnoughEnvironments {
                element: set.element.clone(),
                rows: set.rows(),
                cols: set.cols(),
            });
        }

        let selection = select_rows(&set.matrix, options)?;
        let basis = set.matrix.select_rows(selection.rows.iter());
        let inverse = pseudo_inverse(&basis)?;
        let sources: Vec<usize> = selection.rows.iter().map(|&row| set.sources[row]).collect();
        structures.extend(sources.iter().copied());

        info!(
            element = %set.element,
            environments = set.rows(),
            active = basis.nrows(),
            converged = selection.converged,
            "active set selected"
        );

        elements.push(ElementActiveSet {
            element: set.element.clone(),
            basis,
            inverse,
            rows: selection.rows,
            sources,
            converged: selection.converged,
        });
    }

    Ok(ActiveSetSelection {
        elements,
        structures: structures.into_iter().collect(),
    })
}
