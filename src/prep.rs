//! Input preparation: standardization, marginals, warm starts.
//!
//! None of this is required by the fitter; it is the small amount of glue a
//! caller typically runs between loading paired survey rows and fitting.

use crate::{Error, Result};
use ndarray::{concatenate, Array1, Array2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

/// Pooled z-scoring of two feature matrices with the same columns.
///
/// Mean and population standard deviation are taken over the rows of `x` and
/// `y` stacked together, so both sides end up on one scale.
///
/// # Errors
///
/// - [`Error::DimensionMismatch`] if the column counts differ
/// - [`Error::InvalidConfiguration`] if either side is empty or has non-finite values
/// - [`Error::ConstantFeature`] for a column with zero pooled variance
pub fn standardize_pair(x: &Array2<f64>, y: &Array2<f64>) -> Result<(Array2<f64>, Array2<f64>)> {
    if x.ncols() != y.ncols() {
        return Err(Error::DimensionMismatch {
            what: "feature count of Y vs feature count of X",
            expected: x.ncols(),
            got: y.ncols(),
        });
    }
    if x.nrows() == 0 || y.nrows() == 0 {
        return Err(Error::invalid("features", "need at least one row on each side"));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(Error::invalid("features", "values must be finite"));
    }

    let pooled = concatenate(Axis(0), &[x.view(), y.view()])
        .map_err(|_| Error::invalid("features", "cannot stack X and Y"))?;
    let mean = pooled.mean_axis(Axis(0)).ok_or(Error::invalid("features", "no rows"))?;
    let std = pooled.std_axis(Axis(0), 0.0);

    if let Some(col) = std.iter().position(|&s| s == 0.0) {
        return Err(Error::ConstantFeature(col));
    }

    let x = (x - &mean) / &std;
    let y = (y - &mean) / &std;
    Ok((x, y))
}

/// Uniform marginal `1/n` of length `n`.
pub fn uniform_marginal(n: usize) -> Result<Array1<f64>> {
    if n == 0 {
        return Err(Error::invalid("marginal", "length must be >= 1"));
    }
    Ok(Array1::from_elem(n, 1.0 / n as f64))
}

/// Check a marginal's length and values.
pub fn validate_marginal(mu: &Array1<f64>, expected_len: usize) -> Result<()> {
    if mu.len() != expected_len {
        return Err(Error::DimensionMismatch {
            what: "marginal length vs number of entities",
            expected: expected_len,
            got: mu.len(),
        });
    }
    check_marginal_values(mu)
}

pub(crate) fn check_marginal_values(mu: &Array1<f64>) -> Result<()> {
    if mu.iter().any(|&m| !(m >= 0.0) || !m.is_finite()) {
        return Err(Error::invalid("marginal", "entries must be non-negative and finite"));
    }
    if !(mu.sum() > 0.0) {
        return Err(Error::invalid("marginal", "total mass must be positive"));
    }
    Ok(())
}

/// Seeded Gaussian warm start, entries `scale · N(0, 1)`.
///
/// Same seed, same matrix.
pub fn random_parameter(rows: usize, cols: usize, scale: f64, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array2::from_shape_simple_fn((rows, cols), || {
        let z: f64 = StandardNormal.sample(&mut rng);
        scale * z
    })
}
