use nalgebra::DMatrix;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("descriptor matrix must be tall: {rows} rows, {cols} columns")]
    NotTall { rows: usize, cols: usize },

    #[error("selected submatrix is singular")]
    SingularSubmatrix,

    #[error("not enough environments for element {element}: {rows} rows, {cols} columns")]
    NotEnoughEnvironments {
        element: String,
        rows: usize,
        cols: usize,
    },
}

/// Interchangeable MaxVol implementations behind one contract.
///
/// `Incremental` applies a rank-1 correction to the coefficient matrix after
/// every row swap; `Direct` re-solves for the coefficients from scratch. Both
/// walk the same swap sequence, `Direct` trades speed for numerical
/// robustness on long swap chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxVolBackend {
    #[default]
    Incremental,
    Direct,
}

impl MaxVolBackend {
    pub fn select(
        &self,
        matrix: &DMatrix<f64>,
        gamma_tol: f64,
        max_iter: usize,
    ) -> Result<MaxVolResult, SelectionError> {
        match self {
            MaxVolBackend::Incremental => maxvol(matrix, gamma_tol, max_iter),
            MaxVolBackend::Direct => maxvol_direct(matrix, gamma_tol, max_iter),
        }
    }
}

/// Outcome of a MaxVol run over a tall matrix `A` of shape `[n, r]`: the `r`
/// selected row indices `I` and the coefficient matrix `B` of shape `[n, r]`
/// with `A = B * A[I, :]` and `B = A * A[I, :]^-1`.
#[derive(Debug, Clone)]
pub struct MaxVolResult {
    pub indices: Vec<usize>,
    pub coefficients: DMatrix<f64>,
}

/// Computes a near-maximal-volume square submatrix of a tall matrix.
///
/// `gamma_tol` is the accuracy parameter (>= 1). At exactly 1 the iteration
/// runs until a true local maximum of the submatrix volume is reached; values
/// in the 1.01 - 1.1 range stop earlier, trading a slightly smaller volume
/// for fewer swaps. `max_iter` bounds the number of row swaps.
///
/// The basic algorithm is described in: Goreinov S., Oseledets I.,
/// Savostyanov D., Tyrtyshnikov E., Zamarashkin N. "How to find a good
/// submatrix". Matrix Methods: Theory, Algorithms And Applications (2010),
/// 247-256.
pub fn maxvol(
    matrix: &DMatrix<f64>,
    gamma_tol: f64,
    max_iter: usize,
) -> Result<MaxVolResult, SelectionError> {
    let (mut indices, mut b) = initialize(matrix)?;

    for _ in 0..max_iter {
        let (i, j) = b.iamax_full();
        let pivot = b[(i, j)];
        if pivot.abs() <= gamma_tol {
            break;
        }

        indices[j] = i;

        // Rank-1 update: B -= outer(B[:, j], B'[i, :]) / B[i, j], where
        // B' is B with 1 subtracted at column j.
        let bj = b.column(j).clone_owned();
        let mut bi = b.row(i).clone_owned();
        bi[j] -= 1.0;
        bi /= pivot;
        b.gemm(-1.0, &bj, &bi, 1.0);
    }

    Ok(MaxVolResult {
        indices,
        coefficients: b,
    })
}

fn maxvol_direct(
    matrix: &DMatrix<f64>,
    gamma_tol: f64,
    max_iter: usize,
) -> Result<MaxVolResult, SelectionError> {
    let (mut indices, mut b) = initialize(matrix)?;

    for _ in 0..max_iter {
        let (i, j) = b.iamax_full();
        if b[(i, j)].abs() <= gamma_tol {
            break;
        }
        indices[j] = i;
        b = coefficients_for(matrix, &indices)?;
    }

    Ok(MaxVolResult {
        indices,
        coefficients: b,
    })
}

fn initialize(matrix: &DMatrix<f64>) -> Result<(Vec<usize>, DMatrix<f64>), SelectionError> {
    let (rows, cols) = matrix.shape();
    if rows <= cols {
        return Err(SelectionError::NotTall { rows, cols });
    }
    let indices = pivot_rows(matrix);
    let b = coefficients_for(matrix, &indices)?;
    Ok((indices, b))
}

/// Greedy initial row set from partial-pivoting Gaussian elimination: the
/// rows picked as leading pivots of the first `r` columns.
fn pivot_rows(matrix: &DMatrix<f64>) -> Vec<usize> {
    let (rows, cols) = matrix.shape();
    let mut work = matrix.clone();
    let mut order: Vec<usize> = (0..rows).collect();

    for col in 0..cols {
        let mut pivot_row = col;
        let mut best = work[(col, col)].abs();
        for row in (col + 1)..rows {
            let value = work[(row, col)].abs();
            if value > best {
                best = value;
                pivot_row = row;
            }
        }
        if pivot_row != col {
            work.swap_rows(col, pivot_row);
            order.swap(col, pivot_row);
        }

        let pivot = work[(col, col)];
        if pivot.abs() < f64::EPSILON {
            continue;
        }
        for row in (col + 1)..rows {
            let factor = work[(row, col)] / pivot;
            for k in (col + 1)..cols {
                work[(row, k)] -= factor * work[(col, k)];
            }
        }
    }

    order.truncate(cols);
    order
}

/// Solves `A[I, :]^T B^T = A^T` for the coefficient matrix `B`.
fn coefficients_for(
    matrix: &DMatrix<f64>,
    indices: &[usize],
) -> Result<DMatrix<f64>, SelectionError> {
    let submatrix = matrix.select_rows(indices.iter());
    let lu = submatrix.transpose().lu();
    let transposed = lu
        .solve(&matrix.transpose())
        .ok_or(SelectionError::SingularSubmatrix)?;
    Ok(transposed.transpose())
}
