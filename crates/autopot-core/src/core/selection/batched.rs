use super::maxvol::{MaxVolBackend, SelectionError};
use super::pseudo_inverse;
use nalgebra::DMatrix;
use serde::Deserialize;
use std::collections::HashSet;
use std::ops::Range;
use tracing::{debug, info, warn};

/// Tuning knobs shared by every selection entry point.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionOptions {
    /// MaxVol accuracy parameter, >= 1.
    pub gamma_tol: f64,
    /// Maximum number of row swaps per MaxVol call.
    pub max_iter: usize,
    /// Rows per batch for the cumulative pass; `None` disables batching.
    pub batch_size: Option<usize>,
    /// Maximum number of refinement rounds after the cumulative pass.
    pub refinement_rounds: usize,
    pub backend: MaxVolBackend,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            gamma_tol: 1.001,
            max_iter: 1000,
            batch_size: Some(10_000),
            refinement_rounds: 10,
            backend: MaxVolBackend::default(),
        }
    }
}

/// Rows of the input matrix chosen as the active set.
///
/// `converged` is false when the refinement budget ran out before the
/// maximum gamma dropped below tolerance; the selection is then the best
/// one found, which callers may still use.
#[derive(Debug, Clone)]
pub struct RowSelection {
    pub rows: Vec<usize>,
    pub converged: bool,
}

/// Selects a maximal-volume row subset, batching the work when the input has
/// more rows than `batch_size`.
///
/// Batched operation runs in two stages. The cumulative stage walks the
/// batches in order, each time re-selecting from the union of the rows kept
/// so far and the new batch, which bounds the size of any single MaxVol call
/// while still considering every row. The refinement stage then checks every
/// row's gamma against the pseudo-inverse of the current active submatrix
/// and re-selects from the union of the active rows and any row above
/// tolerance, until the maximum gamma is below tolerance or the round budget
/// is spent.
pub fn select_rows(
    matrix: &DMatrix<f64>,
    options: &SelectionOptions,
) -> Result<RowSelection, SelectionError> {
    let (rows, cols) = matrix.shape();
    if rows <= cols {
        return Err(SelectionError::NotTall { rows, cols });
    }

    let Some(batch_size) = options.batch_size else {
        let result = options
            .backend
            .select(matrix, options.gamma_tol, options.max_iter)?;
        return Ok(RowSelection {
            rows: result.indices,
            converged: true,
        });
    };

    // Stage 1 - cumulative selection over contiguous batches.
    let mut selected: Vec<usize> = Vec::new();
    for (batch, range) in split_batches(rows, batch_size).into_iter().enumerate() {
        let joint: Vec<usize> = selected.iter().copied().chain(range).collect();
        let joint_matrix = matrix.select_rows(joint.iter());
        let result = options
            .backend
            .select(&joint_matrix, options.gamma_tol, options.max_iter)?;

        let carried = selected.len();
        let added = result.indices.iter().filter(|&&i| i >= carried).count();
        selected = result.indices.into_iter().map(|i| joint[i]).collect();
        debug!(batch, added, "cumulative batch selected");
    }

    // Stage 2 - refinement against the full matrix.
    for round in 0..options.refinement_rounds {
        let basis = matrix.select_rows(selected.iter());
        let inverse = pseudo_inverse(&basis)?;
        let gamma = (matrix * &inverse).abs();

        let kept: HashSet<usize> = selected.iter().copied().collect();
        let mut max_gamma = 0.0f64;
        let mut flagged = Vec::new();
        for row in 0..rows {
            let value = gamma.row(row).max();
            max_gamma = max_gamma.max(value);
            if value > options.gamma_tol && !kept.contains(&row) {
                flagged.push(row);
            }
        }
        info!(
            round,
            out_of_set = flagged.len(),
            max_gamma,
            "refinement round"
        );

        if max_gamma < options.gamma_tol {
            debug!("refinement done");
            return Ok(RowSelection {
                rows: selected,
                converged: true,
            });
        }
        if flagged.is_empty() {
            // Every offending row is already in the active set; another
            // round cannot change the candidate pool.
            warn!(max_gamma, "refinement stalled inside the active set");
            return Ok(RowSelection {
                rows: selected,
                converged: false,
            });
        }

        let pool: Vec<usize> = selected.iter().copied().chain(flagged).collect();
        let pool_matrix = matrix.select_rows(pool.iter());
        let result = options
            .backend
            .select(&pool_matrix, options.gamma_tol, options.max_iter)?;
        selected = result.indices.into_iter().map(|i| pool[i]).collect();
    }

    warn!(
        rounds = options.refinement_rounds,
        "refinement budget exhausted, returning the best active set found"
    );
    Ok(RowSelection {
        rows: selected,
        converged: false,
    })
}

/// Contiguous near-equal partition of `0..rows`, matching
/// `numpy.array_split` over `ceil(rows / batch_size)` batches.
fn split_batches(rows: usize, batch_size: usize) -> Vec<Range<usize>> {
    let count = rows.div_ceil(batch_size.max(1)).max(1);
    let base = rows / count;
    let remainder = rows % count;

    let mut ranges = Vec::with_capacity(count);
    let mut start = 0;
    for batch in 0..count {
        let len = base + usize::from(batch < remainder);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}
