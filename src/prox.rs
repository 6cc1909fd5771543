//! Nuclear-norm proximal operator.
//!
//! \[
//! \mathrm{prox}_{\tau\|\cdot\|_*}(A) = U\,\mathrm{diag}\big((s - \tau)_+\big)\,V^\top,
//! \quad A = U\,\mathrm{diag}(s)\,V^\top
//! \]
//!
//! Soft-thresholding the singular values is what pulls the fitted affinity
//! matrix toward low rank. The SVD is done with `nalgebra`; inputs and outputs
//! stay `ndarray`.

use crate::{Error, Result};
use nalgebra::DMatrix;
use ndarray::Array2;

/// Soft-threshold the singular values of `a` by `threshold`.
///
/// `threshold == 0` returns `a` unchanged (no SVD round trip).
///
/// # Errors
///
/// [`Error::InvalidConfiguration`] for a negative or non-finite threshold;
/// [`Error::NumericalInstability`] if `a` is not finite or the SVD fails.
///
/// # Example
///
/// ```rust
/// use bilot::soft_threshold_singular_values;
/// use ndarray::array;
///
/// let a = array![[3.0, 0.0], [0.0, 1.0]];
/// let shrunk = soft_threshold_singular_values(&a, 1.5).unwrap();
/// assert!((shrunk[[0, 0]] - 1.5).abs() < 1e-10);
/// assert!(shrunk[[1, 1]].abs() < 1e-10);
/// ```
pub fn soft_threshold_singular_values(a: &Array2<f64>, threshold: f64) -> Result<Array2<f64>> {
    if !(threshold >= 0.0) || !threshold.is_finite() {
        return Err(Error::invalid("threshold", "must be non-negative and finite"));
    }
    if threshold == 0.0 || a.is_empty() {
        return Ok(a.clone());
    }

    let mut svd = to_nalgebra(a)?
        .try_svd(true, true, f64::EPSILON, 0)
        .ok_or(Error::NumericalInstability {
            iteration: 0,
            reason: "SVD did not converge",
        })?;

    for s in svd.singular_values.iter_mut() {
        *s = (*s - threshold).max(0.0);
    }

    let shrunk = svd.recompose().map_err(|reason| Error::NumericalInstability { iteration: 0, reason })?;
    Ok(from_nalgebra(&shrunk))
}

/// Nuclear norm \(\|A\|_* = \sum_k s_k\).
pub fn nuclear_norm(a: &Array2<f64>) -> Result<f64> {
    if a.is_empty() {
        return Ok(0.0);
    }
    let s = singular_values(a)?;
    Ok(s.iter().sum())
}

/// Number of singular values above `tol`.
pub fn numerical_rank(a: &Array2<f64>, tol: f64) -> Result<usize> {
    if a.is_empty() {
        return Ok(0);
    }
    let s = singular_values(a)?;
    Ok(s.iter().filter(|&&v| v > tol).count())
}

fn singular_values(a: &Array2<f64>) -> Result<Vec<f64>> {
    let svd = to_nalgebra(a)?
        .try_svd(false, false, f64::EPSILON, 0)
        .ok_or(Error::NumericalInstability {
            iteration: 0,
            reason: "SVD did not converge",
        })?;
    Ok(svd.singular_values.iter().copied().collect())
}

fn to_nalgebra(a: &Array2<f64>) -> Result<DMatrix<f64>> {
    if a.iter().any(|v| !v.is_finite()) {
        return Err(Error::NumericalInstability {
            iteration: 0,
            reason: "parameter matrix has non-finite entries",
        });
    }
    Ok(DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]]))
}

fn from_nalgebra(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}
