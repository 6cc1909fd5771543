//! Target couplings: the matching the fitted affinity should reproduce.
//!
//! The fitter never assumes a particular matching. It asks a
//! [`TargetCoupling`] for a `rows × cols` matrix once per fit.

use crate::{Error, Result};
use ndarray::Array2;

/// Supplies the observed/assumed coupling \(\hat\pi\).
pub trait TargetCoupling {
    /// Build the target for `rows` X-entities and `cols` Y-entities.
    fn target(&self, rows: usize, cols: usize) -> Result<Array2<f64>>;
}

/// Row `i` of X is matched with row `i` of Y, for `i < min(rows, cols)`,
/// each pair carrying mass `1 / min(rows, cols)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagonalTarget;

impl TargetCoupling for DiagonalTarget {
    fn target(&self, rows: usize, cols: usize) -> Result<Array2<f64>> {
        let size = rows.min(cols);
        if size == 0 {
            return Err(Error::invalid("target", "needs at least one row on each side"));
        }
        let mut pi = Array2::zeros((rows, cols));
        let mass = 1.0 / size as f64;
        for i in 0..size {
            pi[[i, i]] = mass;
        }
        Ok(pi)
    }
}

/// A caller-supplied target matrix, used as is.
#[derive(Debug, Clone)]
pub struct FixedTarget(pub Array2<f64>);

impl TargetCoupling for FixedTarget {
    fn target(&self, rows: usize, cols: usize) -> Result<Array2<f64>> {
        if self.0.nrows() != rows {
            return Err(Error::DimensionMismatch {
                what: "target coupling rows vs rows of X",
                expected: rows,
                got: self.0.nrows(),
            });
        }
        if self.0.ncols() != cols {
            return Err(Error::DimensionMismatch {
                what: "target coupling columns vs rows of Y",
                expected: cols,
                got: self.0.ncols(),
            });
        }
        if self.0.iter().any(|&v| !(v >= 0.0) || !v.is_finite()) {
            return Err(Error::invalid("target", "entries must be non-negative and finite"));
        }
        Ok(self.0.clone())
    }
}

/// Row `i` of X is matched with row `perm[i]` of Y, uniform mass `1 / perm.len()`.
///
/// Useful when the two populations are not stored in the same order.
#[derive(Debug, Clone)]
pub struct PermutationTarget(pub Vec<usize>);

impl TargetCoupling for PermutationTarget {
    fn target(&self, rows: usize, cols: usize) -> Result<Array2<f64>> {
        let perm = &self.0;
        if perm.is_empty() {
            return Err(Error::invalid("target", "permutation must not be empty"));
        }
        if perm.len() > rows {
            return Err(Error::DimensionMismatch {
                what: "matched pairs vs rows of X",
                expected: rows,
                got: perm.len(),
            });
        }
        let mut seen = vec![false; cols];
        for &j in perm {
            if j >= cols {
                return Err(Error::DimensionMismatch {
                    what: "matched column index vs rows of Y",
                    expected: cols,
                    got: j,
                });
            }
            if std::mem::replace(&mut seen[j], true) {
                return Err(Error::invalid("target", "a Y row is matched more than once"));
            }
        }

        let mut pi = Array2::zeros((rows, cols));
        let mass = 1.0 / perm.len() as f64;
        for (i, &j) in perm.iter().enumerate() {
            pi[[i, j]] = mass;
        }
        Ok(pi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn diagonal_uses_smaller_side() {
        let pi = DiagonalTarget.target(3, 5).unwrap();
        assert_eq!(pi.dim(), (3, 5));
        for i in 0..3 {
            for j in 0..5 {
                let expected = if i == j { 1.0 / 3.0 } else { 0.0 };
                assert_eq!(pi[[i, j]], expected);
            }
        }
        assert!((pi.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn diagonal_tall() {
        let pi = DiagonalTarget.target(4, 2).unwrap();
        assert_eq!(pi[[0, 0]], 0.5);
        assert_eq!(pi[[1, 1]], 0.5);
        assert_eq!(pi.row(2).sum(), 0.0);
        assert_eq!(pi.row(3).sum(), 0.0);
    }

    #[test]
    fn diagonal_rejects_empty() {
        assert!(DiagonalTarget.target(0, 3).is_err());
    }

    #[test]
    fn fixed_checks_shape() {
        let t = FixedTarget(array![[0.5, 0.0], [0.0, 0.5]]);
        assert!(t.target(2, 2).is_ok());
        assert!(matches!(
            t.target(2, 3),
            Err(Error::DimensionMismatch { expected: 3, got: 2, .. })
        ));
        assert!(matches!(
            t.target(3, 2),
            Err(Error::DimensionMismatch { expected: 3, got: 2, .. })
        ));
    }

    #[test]
    fn fixed_rejects_negative_mass() {
        let t = FixedTarget(array![[0.5, -0.1], [0.0, 0.6]]);
        assert!(matches!(t.target(2, 2), Err(Error::InvalidConfiguration { .. })));
    }

    #[test]
    fn permutation_places_mass() {
        let pi = PermutationTarget(vec![2, 0, 1]).target(3, 4).unwrap();
        let third = 1.0 / 3.0;
        assert_eq!(pi[[0, 2]], third);
        assert_eq!(pi[[1, 0]], third);
        assert_eq!(pi[[2, 1]], third);
        assert!((pi.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn permutation_rejects_repeats_and_out_of_range() {
        assert!(matches!(
            PermutationTarget(vec![0, 0]).target(2, 2),
            Err(Error::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            PermutationTarget(vec![0, 5]).target(2, 3),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(matches!(
            PermutationTarget(vec![0, 1, 2]).target(2, 3),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
