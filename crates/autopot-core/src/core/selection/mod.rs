pub mod active_set;
pub mod batched;
pub mod gamma;
pub mod maxvol;

use self::maxvol::SelectionError;
use nalgebra::DMatrix;

// Relative cutoff for discarded singular values; kept loose because the
// downstream MD engines evaluate the potential in single precision.
const PINV_RCOND: f64 = 1e-8;

/// Moore-Penrose pseudo-inverse via SVD with a relative singular-value
/// cutoff.
pub fn pseudo_inverse(matrix: &DMatrix<f64>) -> Result<DMatrix<f64>, SelectionError> {
    if matrix.is_empty() {
        return Err(SelectionError::SingularSubmatrix);
    }
    let svd = matrix.clone().svd(true, true);
    let cutoff = PINV_RCOND * svd.singular_values.max();
    svd.pseudo_inverse(cutoff)
        .map_err(|_| SelectionError::SingularSubmatrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pseudo_inverse_of_invertible_matrix_matches_inverse() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 7.0, 2.0, 6.0]);
        let pinv = pseudo_inverse(&m).unwrap();
        let product = &m * &pinv;
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((product[(i, j)] - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn pseudo_inverse_of_empty_matrix_is_rejected() {
        let m = DMatrix::<f64>::zeros(0, 0);
        assert!(pseudo_inverse(&m).is_err());
    }
}
