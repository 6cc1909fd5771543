//! # bilot
//!
//! Bilinear affinity estimation by entropic optimal transport.
//!
//! ## The Problem
//!
//! Two populations (say, the two partners of each surveyed couple) are
//! described by feature matrices `X` (`m × p`) and `Y` (`n × q`). Row `i` of `X`
//! is known to be matched with row `i` of `Y`. Which combinations of features
//! make two people likely to match?
//!
//! Model the joint gain of pairing `x` with `y` as \(x^\top A y\), i.e. the gain
//! matrix \(\Phi = X A Y^\top\), and assume matches follow the entropic optimal
//! transport plan for that gain. Fitting `A` so that plan reproduces the
//! observed matching is *inverse optimal transport*.
//!
//! ## Key Functions
//!
//! | Function | Role | Complexity |
//! |----------|------|------------|
//! | [`bilinear_cost`] | Gain matrix `X A Yᵀ` | O(mpq + mnq) |
//! | [`sinkhorn_scalings`] | Entropic OT scalings `(a, b)` | O(m × n × iterations) |
//! | [`coupling`] | Plan `diag(a) exp(Φ/σ) diag(b)` | O(m × n) |
//! | [`soft_threshold_singular_values`] | Nuclear-norm prox | O(pq · min(p, q)) |
//! | [`ProximalFitter`] / [`fit`] | Outer proximal-gradient loop | steps × (Sinkhorn + SVD) |
//!
//! ## Quick Start
//!
//! ```rust
//! use bilot::{fit, uniform_marginal, FitConfig};
//! use ndarray::{array, Array2};
//!
//! let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]];
//! let mu = uniform_marginal(4).unwrap();
//! let cfg = FitConfig::new().with_sigma(0.5).with_steps(50);
//!
//! let result = fit(&Array2::zeros((2, 2)), &x, &mu, &x, &mu, &cfg).unwrap();
//! let (first, last) = (result.history.gradient[0], result.history.gradient[49]);
//! assert!(last < first);
//! ```
//!
//! ## What Can Go Wrong
//!
//! 1. **Kernel underflow / overflow**: `exp(Φ/σ)` leaves the f64 range when
//!    `σ` is small relative to the spread of `Φ`. Increase `σ`, standardize the
//!    features ([`standardize_pair`]), or use [`ZeroGuard::Clamp`].
//! 2. **Step too large**: the discrepancy oscillates. Lower `step`.
//! 3. **Unreachable target**: rows with identical features cannot be told
//!    apart, so the diagonal target is only approached, never met; the gradient
//!    shrinks without reaching zero.
//! 4. **Marginal mismatch**: marginals are not renormalized. Their masses
//!    should agree (both sum to 1 by convention).
//!
//! ## References
//!
//! - Cuturi (2013). "Sinkhorn Distances: Lightspeed Computation of Optimal Transport"
//! - Dupuy & Galichon (2014). "Personality Traits and the Marriage Market"
//! - Dupuy, Galichon & Sun (2019). "Estimating Matching Affinity Matrices under Low-Rank Constraints"
//! - Parikh & Boyd (2014). "Proximal Algorithms"

use thiserror::Error;

pub mod cost;
pub mod fit;
pub mod prep;
pub mod prox;
pub mod sinkhorn;
pub mod target;

pub use cost::bilinear_cost;
pub use fit::{
    fit, ConvergenceHistory, Fit, FitConfig, FitObserver, FnObserver, LogObserver, NoopObserver, ProximalFitter,
};
pub use prep::{random_parameter, standardize_pair, uniform_marginal, validate_marginal};
pub use prox::{nuclear_norm, numerical_rank, soft_threshold_singular_values};
pub use sinkhorn::{coupling, gibbs_kernel, marginal_error, sinkhorn_scalings, Scalings, SinkhornConfig, ZeroGuard};
pub use target::{DiagonalTarget, FixedTarget, PermutationTarget, TargetCoupling};

/// Error variants for estimation.
#[derive(Debug, Error)]
pub enum Error {
    /// Matrix/vector shapes do not fit the algebra.
    #[error("dimension mismatch ({what}): expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// Division by zero, overflow or a failed decomposition.
    ///
    /// `iteration` is the Sinkhorn sweep, or the outer step for failures
    /// outside the sweeps.
    #[error("numerical instability at iteration {iteration}: {reason}")]
    NumericalInstability { iteration: usize, reason: &'static str },

    /// A parameter or input value is outside its domain.
    #[error("invalid configuration for `{param}`: {reason}")]
    InvalidConfiguration { param: &'static str, reason: &'static str },

    /// A feature column has zero variance and cannot be standardized.
    #[error("feature column {0} is constant")]
    ConstantFeature(usize),
}

impl Error {
    pub(crate) fn invalid(param: &'static str, reason: &'static str) -> Self {
        Error::InvalidConfiguration { param, reason }
    }
}

/// Result type for estimation.
pub type Result<T> = std::result::Result<T, Error>;
