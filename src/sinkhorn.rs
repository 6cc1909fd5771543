//! Sinkhorn scaling for entropic optimal transport on a gain matrix.
//!
//! Given a gain matrix \(\Phi\) (higher = more compatible), the Gibbs kernel is
//! \(K_{ij} = \exp(\Phi_{ij}/\sigma)\) and the coupling is
//! \(\pi = \mathrm{diag}(a)\,K\,\mathrm{diag}(b)\). The scalings are found by
//! alternating
//!
//! ```text
//! a ← μ1 ⊘ (K b)
//! b ← μ2 ⊘ (Kᵀ a)
//! ```
//!
//! starting from `b = 1`. After each `b` update the column marginals are exact;
//! the row marginals converge linearly.
//!
//! By default the loop runs exactly `max_iter` sweeps. An optional tolerance
//! turns on an early exit on the row-marginal error.

use crate::{Error, Result};
use ndarray::{Array1, Array2, Axis};

/// What to do when a Sinkhorn denominator (`K b` or `Kᵀ a`) vanishes.
///
/// This happens when `σ` is small relative to the spread of `Φ` and whole
/// kernel rows/columns underflow to zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ZeroGuard {
    /// Report [`Error::NumericalInstability`].
    #[default]
    Fail,
    /// Replace denominators below the given floor by the floor and continue.
    Clamp(f64),
}

/// Configuration for [`sinkhorn_scalings`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SinkhornConfig {
    /// Number of scaling sweeps (upper bound when `tol` is set).
    pub max_iter: usize,
    /// Optional early exit on the max absolute row-marginal error.
    pub tol: Option<f64>,
    /// Check the marginal error every this many sweeps (only with `tol`).
    pub check_every: usize,
    /// Zero-denominator policy.
    pub zero_guard: ZeroGuard,
}

impl Default for SinkhornConfig {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tol: None,
            check_every: 10,
            zero_guard: ZeroGuard::Fail,
        }
    }
}

impl SinkhornConfig {
    /// Set the number of sweeps.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Enable the marginal-error early exit.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = Some(tol);
        self
    }

    /// Set how often the marginal error is checked.
    pub fn with_check_every(mut self, check_every: usize) -> Self {
        self.check_every = check_every;
        self
    }

    /// Set the zero-denominator policy.
    pub fn with_zero_guard(mut self, zero_guard: ZeroGuard) -> Self {
        self.zero_guard = zero_guard;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(Error::invalid("sinkhorn.max_iter", "must be >= 1"));
        }
        if let Some(tol) = self.tol {
            if !(tol > 0.0) || !tol.is_finite() {
                return Err(Error::invalid("sinkhorn.tol", "must be positive and finite"));
            }
            if self.check_every == 0 {
                return Err(Error::invalid("sinkhorn.check_every", "must be >= 1"));
            }
        }
        if let ZeroGuard::Clamp(floor) = self.zero_guard {
            if !(floor > 0.0) || !floor.is_finite() {
                return Err(Error::invalid("sinkhorn.zero_guard", "clamp floor must be positive and finite"));
            }
        }
        Ok(())
    }
}

/// Scaling vectors returned by [`sinkhorn_scalings`].
#[derive(Debug, Clone)]
pub struct Scalings {
    /// Row scaling (length `rows(Φ)`).
    pub a: Array1<f64>,
    /// Column scaling (length `cols(Φ)`).
    pub b: Array1<f64>,
    /// Number of sweeps actually performed.
    pub iterations: usize,
}

/// Gibbs kernel `K = exp(Φ / σ)`.
///
/// # Errors
///
/// [`Error::InvalidConfiguration`] for a non-positive `sigma`;
/// [`Error::NumericalInstability`] if any kernel entry overflows.
pub fn gibbs_kernel(phi: &Array2<f64>, sigma: f64) -> Result<Array2<f64>> {
    check_sigma(sigma)?;
    let k = phi.mapv(|p| (p / sigma).exp());
    if k.iter().any(|v| !v.is_finite()) {
        return Err(Error::NumericalInstability {
            iteration: 0,
            reason: "Gibbs kernel overflowed; increase sigma or rescale the gain matrix",
        });
    }
    Ok(k)
}

/// Sinkhorn fixed point for the scalings `(a, b)`.
///
/// # Arguments
///
/// * `mu1` - Row marginal (length `m`, non-negative, positive mass)
/// * `mu2` - Column marginal (length `n`, non-negative, positive mass)
/// * `phi` - Gain matrix Φ (`m × n`)
/// * `sigma` - Entropic regularization σ (> 0)
/// * `cfg` - Sweep count, optional tolerance, zero guard
///
/// # Example
///
/// ```rust
/// use bilot::{coupling, sinkhorn_scalings, SinkhornConfig};
/// use ndarray::{array, Array2};
///
/// let mu = array![0.5, 0.5];
/// let phi = Array2::zeros((2, 2));
/// let s = sinkhorn_scalings(&mu, &mu, &phi, 0.1, &SinkhornConfig::default()).unwrap();
/// let plan = coupling(&s.a, &s.b, &phi, 0.1).unwrap();
/// assert!((plan[[0, 1]] - 0.25).abs() < 1e-12);
/// ```
pub fn sinkhorn_scalings(
    mu1: &Array1<f64>,
    mu2: &Array1<f64>,
    phi: &Array2<f64>,
    sigma: f64,
    cfg: &SinkhornConfig,
) -> Result<Scalings> {
    cfg.validate()?;
    check_marginals_against(mu1, mu2, phi)?;
    let k = gibbs_kernel(phi, sigma)?;
    scale_kernel(mu1, mu2, &k, cfg)
}

/// Sinkhorn sweeps on a precomputed kernel.
pub(crate) fn scale_kernel(
    mu1: &Array1<f64>,
    mu2: &Array1<f64>,
    k: &Array2<f64>,
    cfg: &SinkhornConfig,
) -> Result<Scalings> {
    let mut a = Array1::zeros(mu1.len());
    let mut b = Array1::ones(mu2.len());

    for iter in 0..cfg.max_iter {
        let kb = k.dot(&b);
        divide_guarded(&mut a, mu1, &kb, cfg.zero_guard, iter)?;

        let kta = k.t().dot(&a);
        divide_guarded(&mut b, mu2, &kta, cfg.zero_guard, iter)?;

        if let Some(tol) = cfg.tol {
            if (iter + 1) % cfg.check_every == 0 || iter + 1 == cfg.max_iter {
                let err = row_marginal_error(&a, &b, k, mu1);
                if err < tol {
                    tracing::trace!(iterations = iter + 1, err, "sinkhorn converged");
                    return Ok(Scalings { a, b, iterations: iter + 1 });
                }
            }
        }
    }

    Ok(Scalings {
        a,
        b,
        iterations: cfg.max_iter,
    })
}

/// `out ← num ⊘ den` under the zero-guard policy.
fn divide_guarded(
    out: &mut Array1<f64>,
    num: &Array1<f64>,
    den: &Array1<f64>,
    guard: ZeroGuard,
    iteration: usize,
) -> Result<()> {
    for ((o, &n), &d) in out.iter_mut().zip(num.iter()).zip(den.iter()) {
        if !d.is_finite() {
            return Err(Error::NumericalInstability {
                iteration,
                reason: "non-finite Sinkhorn denominator",
            });
        }
        let d = match guard {
            ZeroGuard::Fail if d == 0.0 => {
                return Err(Error::NumericalInstability {
                    iteration,
                    reason: "zero Sinkhorn denominator (kernel underflow); increase sigma",
                });
            }
            ZeroGuard::Fail => d,
            ZeroGuard::Clamp(floor) if d < floor => {
                tracing::warn!(iteration, denominator = d, floor, "clamping Sinkhorn denominator");
                floor
            }
            ZeroGuard::Clamp(_) => d,
        };
        *o = n / d;
        if !o.is_finite() {
            return Err(Error::NumericalInstability {
                iteration,
                reason: "non-finite Sinkhorn scaling",
            });
        }
    }
    Ok(())
}

/// `max_i |a_i (K b)_i − μ1_i|`.
fn row_marginal_error(a: &Array1<f64>, b: &Array1<f64>, k: &Array2<f64>, mu1: &Array1<f64>) -> f64 {
    let kb = k.dot(b);
    a.iter()
        .zip(kb.iter())
        .zip(mu1.iter())
        .map(|((&ai, &kbi), &m)| (ai * kbi - m).abs())
        .fold(0.0, f64::max)
}

/// Transport plan `π = diag(a) · exp(Φ/σ) · diag(b)`.
///
/// # Errors
///
/// Same as [`gibbs_kernel`], plus [`Error::DimensionMismatch`] when the
/// scalings do not fit `phi`.
pub fn coupling(a: &Array1<f64>, b: &Array1<f64>, phi: &Array2<f64>, sigma: f64) -> Result<Array2<f64>> {
    check_len("row scaling length vs rows of the gain matrix", phi.nrows(), a.len())?;
    check_len("column scaling length vs columns of the gain matrix", phi.ncols(), b.len())?;
    let k = gibbs_kernel(phi, sigma)?;
    Ok(plan_from_kernel(a, b, &k))
}

pub(crate) fn plan_from_kernel(a: &Array1<f64>, b: &Array1<f64>, k: &Array2<f64>) -> Array2<f64> {
    let mut plan = k.clone();
    for (mut row, &ai) in plan.axis_iter_mut(Axis(0)).zip(a.iter()) {
        row *= ai;
        row *= b;
    }
    plan
}

/// Max absolute deviation of the plan's row sums from `mu1` and column sums from `mu2`.
pub fn marginal_error(plan: &Array2<f64>, mu1: &Array1<f64>, mu2: &Array1<f64>) -> f64 {
    let rows = plan.sum_axis(Axis(1));
    let cols = plan.sum_axis(Axis(0));
    let row_err = rows.iter().zip(mu1.iter()).map(|(r, m)| (r - m).abs());
    let col_err = cols.iter().zip(mu2.iter()).map(|(c, m)| (c - m).abs());
    row_err.chain(col_err).fold(0.0, f64::max)
}

fn check_sigma(sigma: f64) -> Result<()> {
    if !(sigma > 0.0) || !sigma.is_finite() {
        return Err(Error::invalid("sigma", "must be positive and finite"));
    }
    Ok(())
}

fn check_len(what: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(Error::DimensionMismatch { what, expected, got });
    }
    Ok(())
}

fn check_marginals_against(mu1: &Array1<f64>, mu2: &Array1<f64>, phi: &Array2<f64>) -> Result<()> {
    check_len("row marginal length vs rows of the gain matrix", phi.nrows(), mu1.len())?;
    check_len("column marginal length vs columns of the gain matrix", phi.ncols(), mu2.len())?;
    crate::prep::check_marginal_values(mu1)?;
    crate::prep::check_marginal_values(mu2)?;
    Ok(())
}
