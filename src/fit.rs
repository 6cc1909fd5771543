//! Proximal-gradient fit of the bilinear affinity matrix.
//!
//! Inverse optimal transport: find `A` such that the entropic coupling of the
//! gain \(\Phi = X A Y^\top\) reproduces an observed matching \(\hat\pi\).
//! Each outer step
//!
//! 1. solves the inner entropic OT problem for \(\pi_A\) (Sinkhorn),
//! 2. moves `A` along \(-X^\top(\pi_A - \hat\pi)Y\),
//! 3. optionally soft-thresholds the singular values of `A` (nuclear-norm prox).
//!
//! The gradient is that of the convex function
//! \(A \mapsto \mathrm{OT}_\sigma(\Phi_A) - \langle \Phi_A, \hat\pi \rangle\),
//! so with a small enough step the discrepancy shrinks.
//!
//! The loop runs a fixed number of steps unless `grad_tol` is set.

use crate::cost::{bilinear_cost, check_compatible};
use crate::prep::validate_marginal;
use crate::prox::soft_threshold_singular_values;
use crate::sinkhorn::{gibbs_kernel, plan_from_kernel, scale_kernel, SinkhornConfig};
use crate::target::{DiagonalTarget, TargetCoupling};
use crate::{Error, Result};
use ndarray::{Array1, Array2};
use tracing::{debug, info, instrument};

/// Configuration for [`ProximalFitter`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitConfig {
    /// Gradient step size `t`.
    pub step: f64,
    /// Nuclear-norm weight `λ` (only used with `low_rank`).
    pub reg_weight: f64,
    /// Entropic regularization `σ`.
    pub sigma: f64,
    /// Number of outer steps.
    pub n_steps: usize,
    /// Apply the singular-value shrinkage after every gradient step.
    pub low_rank: bool,
    /// Inner solver settings.
    pub sinkhorn: SinkhornConfig,
    /// Stop once the total absolute gradient falls below this.
    pub grad_tol: Option<f64>,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            step: 0.1,
            reg_weight: 0.1,
            sigma: 0.1,
            n_steps: 100,
            low_rank: false,
            sinkhorn: SinkhornConfig::default(),
            grad_tol: None,
        }
    }
}

impl FitConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the step size.
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Set the nuclear-norm weight.
    pub fn with_reg_weight(mut self, reg_weight: f64) -> Self {
        self.reg_weight = reg_weight;
        self
    }

    /// Set the entropic regularization.
    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    /// Set the number of outer steps.
    pub fn with_steps(mut self, n_steps: usize) -> Self {
        self.n_steps = n_steps;
        self
    }

    /// Turn the low-rank proximal step on or off.
    pub fn with_low_rank(mut self, low_rank: bool) -> Self {
        self.low_rank = low_rank;
        self
    }

    /// Set the inner solver settings.
    pub fn with_sinkhorn(mut self, sinkhorn: SinkhornConfig) -> Self {
        self.sinkhorn = sinkhorn;
        self
    }

    /// Enable the gradient-based early stop.
    pub fn with_grad_tol(mut self, grad_tol: f64) -> Self {
        self.grad_tol = Some(grad_tol);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.step > 0.0) || !self.step.is_finite() {
            return Err(Error::invalid("step", "must be positive and finite"));
        }
        if !(self.sigma > 0.0) || !self.sigma.is_finite() {
            return Err(Error::invalid("sigma", "must be positive and finite"));
        }
        if !(self.reg_weight >= 0.0) || !self.reg_weight.is_finite() {
            return Err(Error::invalid("reg_weight", "must be non-negative and finite"));
        }
        if let Some(tol) = self.grad_tol {
            if !(tol > 0.0) || !tol.is_finite() {
                return Err(Error::invalid("grad_tol", "must be positive and finite"));
            }
        }
        self.sinkhorn.validate()
    }
}

/// Per-iteration diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConvergenceHistory {
    /// `Σ |π_A − π̂|` per step.
    pub discrepancy: Vec<f64>,
    /// `Σ |∇|` per step.
    pub gradient: Vec<f64>,
}

impl ConvergenceHistory {
    fn with_capacity(n: usize) -> Self {
        Self {
            discrepancy: Vec::with_capacity(n),
            gradient: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, discrepancy: f64, gradient: f64) {
        self.discrepancy.push(discrepancy);
        self.gradient.push(gradient);
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.discrepancy.len()
    }

    /// True before the first step.
    pub fn is_empty(&self) -> bool {
        self.discrepancy.is_empty()
    }

    /// `(discrepancy, gradient)` of the latest step.
    pub fn last(&self) -> Option<(f64, f64)> {
        Some((*self.discrepancy.last()?, *self.gradient.last()?))
    }
}

/// Result of a fit.
#[derive(Debug, Clone)]
pub struct Fit {
    /// Fitted affinity matrix (`features(X) × features(Y)`).
    pub a: Array2<f64>,
    /// One entry per completed step.
    pub history: ConvergenceHistory,
}

/// Side channel called once per outer step, after the history is updated.
pub trait FitObserver {
    /// `iteration` is zero-based; `a` is the parameter after the step.
    fn on_iteration(&mut self, iteration: usize, a: &Array2<f64>, history: &ConvergenceHistory);
}

/// Observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl FitObserver for NoopObserver {
    fn on_iteration(&mut self, _: usize, _: &Array2<f64>, _: &ConvergenceHistory) {}
}

/// Emits an `info` event every `every` steps.
#[derive(Debug, Clone, Copy)]
pub struct LogObserver {
    pub every: usize,
}

impl Default for LogObserver {
    fn default() -> Self {
        Self { every: 10 }
    }
}

impl LogObserver {
    /// `every == 0` silences the observer.
    fn fires(&self, iteration: usize) -> bool {
        self.every != 0 && (iteration + 1) % self.every == 0
    }
}

impl FitObserver for LogObserver {
    fn on_iteration(&mut self, iteration: usize, _: &Array2<f64>, history: &ConvergenceHistory) {
        if !self.fires(iteration) {
            return;
        }
        if let Some((discrepancy, gradient)) = history.last() {
            info!(step = iteration + 1, discrepancy, gradient, "fit progress");
        }
    }
}

/// Wraps a closure `(iteration, a, history)` as an observer.
pub struct FnObserver<F>(pub F);

impl<F> FitObserver for FnObserver<F>
where
    F: FnMut(usize, &Array2<f64>, &ConvergenceHistory),
{
    fn on_iteration(&mut self, iteration: usize, a: &Array2<f64>, history: &ConvergenceHistory) {
        (self.0)(iteration, a, history)
    }
}

/// Outer proximal-gradient loop.
///
/// ```rust
/// use bilot::{FitConfig, ProximalFitter, uniform_marginal};
/// use ndarray::{array, Array2};
///
/// let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
/// let mu = uniform_marginal(3).unwrap();
/// let cfg = FitConfig::new().with_sigma(0.5).with_steps(20);
///
/// let fit = ProximalFitter::new(cfg)
///     .fit(&Array2::zeros((2, 2)), &x, &mu, &x, &mu)
///     .unwrap();
/// assert_eq!(fit.a.dim(), (2, 2));
/// assert_eq!(fit.history.len(), 20);
/// ```
pub struct ProximalFitter {
    config: FitConfig,
    target: Box<dyn TargetCoupling + Send + Sync>,
}

impl ProximalFitter {
    /// Fitter with the diagonal target.
    pub fn new(config: FitConfig) -> Self {
        Self {
            config,
            target: Box::new(DiagonalTarget),
        }
    }

    /// Replace the target coupling.
    pub fn with_target(mut self, target: impl TargetCoupling + Send + Sync + 'static) -> Self {
        self.target = Box::new(target);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Fit without an observer.
    pub fn fit(
        &self,
        a0: &Array2<f64>,
        x: &Array2<f64>,
        mu1: &Array1<f64>,
        y: &Array2<f64>,
        mu2: &Array1<f64>,
    ) -> Result<Fit> {
        self.fit_observed(a0, x, mu1, y, mu2, &mut NoopObserver)
    }

    /// Fit, calling `observer` after every outer step.
    ///
    /// # Errors
    ///
    /// All preconditions are checked before the first step:
    /// [`Error::InvalidConfiguration`] for bad parameters or marginals,
    /// [`Error::DimensionMismatch`] for inconsistent shapes. During the loop
    /// [`Error::NumericalInstability`] from the inner solver is propagated.
    #[instrument(skip_all, fields(m = x.nrows(), n = y.nrows(), p = x.ncols(), q = y.ncols()))]
    pub fn fit_observed(
        &self,
        a0: &Array2<f64>,
        x: &Array2<f64>,
        mu1: &Array1<f64>,
        y: &Array2<f64>,
        mu2: &Array1<f64>,
        observer: &mut impl FitObserver,
    ) -> Result<Fit> {
        let cfg = &self.config;
        cfg.validate()?;
        if x.nrows() == 0 || y.nrows() == 0 {
            return Err(Error::invalid("features", "need at least one row on each side"));
        }
        check_compatible(x, y, a0)?;
        validate_marginal(mu1, x.nrows())?;
        validate_marginal(mu2, y.nrows())?;

        // Invariant across steps.
        let target = self.target.target(x.nrows(), y.nrows())?;

        let shrink = cfg.low_rank && cfg.reg_weight != 0.0;
        let mut a = a0.clone();
        let mut history = ConvergenceHistory::with_capacity(cfg.n_steps);

        for iter in 0..cfg.n_steps {
            let phi = bilinear_cost(x, y, &a)?;
            let k = gibbs_kernel(&phi, cfg.sigma).map_err(|e| at_step(e, iter))?;
            let s = scale_kernel(mu1, mu2, &k, &cfg.sinkhorn)?;
            let plan = plan_from_kernel(&s.a, &s.b, &k);

            let delta = plan - &target;
            let grad = x.t().dot(&delta).dot(y);

            a.scaled_add(-cfg.step, &grad);
            if shrink {
                a = soft_threshold_singular_values(&a, cfg.step * cfg.reg_weight).map_err(|e| at_step(e, iter))?;
            }

            let discrepancy = delta.iter().fold(0.0, |s, v| s + v.abs());
            let grad_mass = grad.iter().fold(0.0, |s, v| s + v.abs());
            history.push(discrepancy, grad_mass);
            debug!(step = iter, discrepancy, gradient = grad_mass, sinkhorn_iters = s.iterations);

            observer.on_iteration(iter, &a, &history);

            if let Some(tol) = cfg.grad_tol {
                if grad_mass < tol {
                    debug!(step = iter, "gradient below tolerance, stopping");
                    break;
                }
            }
        }

        Ok(Fit { a, history })
    }
}

/// Fit with the diagonal target and no observer.
pub fn fit(
    a0: &Array2<f64>,
    x: &Array2<f64>,
    mu1: &Array1<f64>,
    y: &Array2<f64>,
    mu2: &Array1<f64>,
    config: &FitConfig,
) -> Result<Fit> {
    ProximalFitter::new(config.clone()).fit(a0, x, mu1, y, mu2)
}

/// Attach the outer step index to an instability raised outside the Sinkhorn sweeps.
fn at_step(err: Error, step: usize) -> Error {
    match err {
        Error::NumericalInstability { reason, .. } => Error::NumericalInstability { iteration: step, reason },
        other => other,
    }
}
