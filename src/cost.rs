//! Bilinear gain model.
//!
//! \(\Phi = X A Y^\top\), i.e. \(\Phi_{ij} = \sum_{k,l} X_{ik} A_{kl} Y_{jl}\).
//!
//! Row `i` of `X` and row `j` of `Y` are feature vectors of the two
//! populations; `A` weighs every (X-feature, Y-feature) interaction.

use crate::{Error, Result};
use ndarray::Array2;

/// Pairwise gain matrix `X · A · Yᵀ` (shape `rows(X) × rows(Y)`).
///
/// # Errors
///
/// [`Error::DimensionMismatch`] if `cols(X) != rows(A)` or `cols(Y) != cols(A)`.
///
/// # Example
///
/// ```rust
/// use bilot::bilinear_cost;
/// use ndarray::array;
///
/// let x = array![[1.0, 0.0], [0.0, 1.0]];
/// let y = array![[1.0], [2.0], [3.0]];
/// let a = array![[1.0], [-1.0]];
///
/// let phi = bilinear_cost(&x, &y, &a).unwrap();
/// assert_eq!(phi.dim(), (2, 3));
/// assert_eq!(phi[[1, 2]], -3.0);
/// ```
pub fn bilinear_cost(x: &Array2<f64>, y: &Array2<f64>, a: &Array2<f64>) -> Result<Array2<f64>> {
    check_compatible(x, y, a)?;
    Ok(x.dot(a).dot(&y.t()))
}

/// Shape contract shared by the cost model and the fitter.
pub(crate) fn check_compatible(x: &Array2<f64>, y: &Array2<f64>, a: &Array2<f64>) -> Result<()> {
    if x.ncols() != a.nrows() {
        return Err(Error::DimensionMismatch {
            what: "rows of A vs feature count of X",
            expected: x.ncols(),
            got: a.nrows(),
        });
    }
    if y.ncols() != a.ncols() {
        return Err(Error::DimensionMismatch {
            what: "columns of A vs feature count of Y",
            expected: y.ncols(),
            got: a.ncols(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    fn matrix(rows: usize, cols: usize) -> impl Strategy<Value = Array2<f64>> {
        prop::collection::vec(-3.0f64..3.0, rows * cols)
            .prop_map(move |v| Array2::from_shape_vec((rows, cols), v).unwrap())
    }

    #[test]
    fn zero_parameter_gives_zero_cost() {
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]];
        let a = Array2::zeros((2, 2));
        let phi = bilinear_cost(&x, &x, &a).unwrap();
        assert_eq!(phi.dim(), (4, 4));
        assert!(phi.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn matches_explicit_double_sum() {
        let x = array![[1.0, 2.0], [-1.0, 0.5]];
        let y = array![[0.0, 1.0, 2.0], [3.0, -1.0, 1.0], [1.0, 1.0, 1.0]];
        let a = array![[1.0, 0.0, -2.0], [0.5, 1.0, 0.0]];
        let phi = bilinear_cost(&x, &y, &a).unwrap();
        for i in 0..2 {
            for j in 0..3 {
                let mut s = 0.0;
                for k in 0..2 {
                    for l in 0..3 {
                        s += x[[i, k]] * a[[k, l]] * y[[j, l]];
                    }
                }
                assert!((phi[[i, j]] - s).abs() < 1e-12, "({i},{j}): {} vs {}", phi[[i, j]], s);
            }
        }
    }

    #[test]
    fn rejects_wrong_row_count() {
        let x = Array2::zeros((3, 2));
        let y = Array2::zeros((3, 2));
        let a = Array2::zeros((3, 2));
        let err = bilinear_cost(&x, &y, &a).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, got: 3, .. }), "{err}");
    }

    #[test]
    fn rejects_wrong_column_count() {
        let x = Array2::zeros((3, 2));
        let y = Array2::zeros((4, 5));
        let a = Array2::zeros((2, 4));
        let err = bilinear_cost(&x, &y, &a).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 5, got: 4, .. }), "{err}");
    }

    proptest! {
        #[test]
        fn additive_in_parameter(
            x in matrix(4, 3),
            y in matrix(5, 2),
            a1 in matrix(3, 2),
            a2 in matrix(3, 2),
        ) {
            let lhs = bilinear_cost(&x, &y, &(&a1 + &a2)).unwrap();
            let rhs = bilinear_cost(&x, &y, &a1).unwrap() + bilinear_cost(&x, &y, &a2).unwrap();
            for (l, r) in lhs.iter().zip(rhs.iter()) {
                prop_assert!((l - r).abs() < 1e-9);
            }
        }

        #[test]
        fn homogeneous_in_features(
            x in matrix(3, 2),
            y in matrix(3, 4),
            a in matrix(2, 4),
            c in -5.0f64..5.0,
        ) {
            let scaled = bilinear_cost(&(&x * c), &y, &a).unwrap();
            let base = bilinear_cost(&x, &y, &a).unwrap() * c;
            for (s, b) in scaled.iter().zip(base.iter()) {
                prop_assert!((s - b).abs() < 1e-9);
            }
        }
    }
}
