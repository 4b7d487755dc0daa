use crate::error::{ImputeError, Result};
use crate::model::linear::{fitted, Centered, LinearModel};
use crate::model::Estimator;
use crate::utils::random::seeded_rng;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::seq::SliceRandom;
use tracing::{debug, warn};

/// Outcome of one coordinate descent run
#[derive(Debug, Clone)]
struct DescentResult {
    coef: Array1<f64>,
    n_iter: usize,
    converged: bool,
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// Cyclic coordinate descent for `(1/2n)‖y − Xw‖² + α‖w‖₁`
///
/// `start` warm-starts the coefficients. Stops when the largest coefficient
/// update is below `tol` relative to the largest coefficient.
fn coordinate_descent(
    x: &Array2<f64>,
    y: &Array1<f64>,
    alpha: f64,
    max_iter: usize,
    tol: f64,
    start: Option<&Array1<f64>>,
) -> DescentResult {
    let (n, p) = x.dim();
    let mut coef = start.cloned().unwrap_or_else(|| Array1::zeros(p));
    let mut residual = y - &x.dot(&coef);
    let col_sq: Vec<f64> = x.axis_iter(Axis(1)).map(|c| c.dot(&c)).collect();
    let threshold = alpha * n as f64;

    if p == 0 {
        return DescentResult {
            coef,
            n_iter: 0,
            converged: true,
        };
    }

    for iter in 1..=max_iter {
        let mut max_delta: f64 = 0.0;
        let mut max_coef: f64 = 0.0;

        for j in 0..p {
            if col_sq[j] == 0.0 {
                continue;
            }
            let column = x.column(j);
            let old = coef[j];
            let rho = column.dot(&residual) + col_sq[j] * old;
            let new = soft_threshold(rho, threshold) / col_sq[j];

            if new != old {
                residual.scaled_add(old - new, &column);
                coef[j] = new;
            }
            max_delta = max_delta.max((new - old).abs());
            max_coef = max_coef.max(new.abs());
        }

        if max_coef == 0.0 || max_delta / max_coef < tol {
            return DescentResult {
                coef,
                n_iter: iter,
                converged: true,
            };
        }
    }

    DescentResult {
        coef,
        n_iter: max_iter,
        converged: false,
    }
}

/// Largest alpha for which the lasso solution is not all zero
fn alpha_max(data: &Centered) -> f64 {
    let n = data.n_samples() as f64;
    data.x
        .axis_iter(Axis(1))
        .map(|c| c.dot(&data.y).abs() / n)
        .fold(0.0, f64::max)
}

/// L1-penalized least squares
#[derive(Debug, Clone)]
pub struct Lasso {
    alpha: f64,
    fit_intercept: bool,
    max_iter: usize,
    tol: f64,
    n_iter: Option<usize>,
    model: Option<LinearModel>,
}

impl Lasso {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            fit_intercept: true,
            max_iter: 1000,
            tol: 1e-4,
            n_iter: None,
            model: None,
        }
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Iterations used by the last fit
    pub fn n_iter(&self) -> Option<usize> {
        self.n_iter
    }
}

impl Estimator for Lasso {
    fn name(&self) -> &'static str {
        "lasso"
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        if !(self.alpha >= 0.0) {
            return Err(ImputeError::Estimator(format!("lasso alpha must be non-negative, got {}", self.alpha)));
        }
        let data = Centered::new(x, y, self.fit_intercept)?;
        let result = coordinate_descent(&data.x, &data.y, self.alpha, self.max_iter, self.tol, None);
        if !result.converged {
            warn!(
                "lasso did not converge in {} iterations (alpha {})",
                self.max_iter, self.alpha
            );
        }
        self.n_iter = Some(result.n_iter);
        self.model = Some(data.into_model(result.coef));
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        fitted(&self.model, self.name())?.predict(x)
    }

    fn alpha(&self) -> Option<f64> {
        Some(self.alpha)
    }

    fn intercept(&self) -> Option<f64> {
        self.model.as_ref().map(|m| m.intercept)
    }

    fn coef(&self) -> Option<&Array1<f64>> {
        self.model.as_ref().map(|m| &m.coef)
    }
}

/// Lasso with k-fold selection of alpha along a log-spaced path
#[derive(Debug, Clone)]
pub struct LassoCv {
    n_alphas: usize,
    eps: f64,
    folds: usize,
    seed: u64,
    fit_intercept: bool,
    max_iter: usize,
    tol: f64,
    best_alpha: Option<f64>,
    model: Option<LinearModel>,
}

impl LassoCv {
    pub fn new() -> Self {
        Self {
            n_alphas: 30,
            eps: 1e-3,
            folds: 5,
            seed: 2026,
            fit_intercept: true,
            max_iter: 1000,
            tol: 1e-4,
            best_alpha: None,
            model: None,
        }
    }

    pub fn with_path(mut self, n_alphas: usize, eps: f64) -> Self {
        self.n_alphas = n_alphas;
        self.eps = eps;
        self
    }

    pub fn with_folds(mut self, folds: usize, seed: u64) -> Self {
        self.folds = folds;
        self.seed = seed;
        self
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Descending alphas from `alpha_max` to `alpha_max * eps`
    fn alpha_path(&self, alpha_max: f64) -> Vec<f64> {
        let top = if alpha_max > 0.0 { alpha_max } else { f64::EPSILON };
        if self.n_alphas == 1 {
            return vec![top];
        }
        let step = self.eps.ln() / (self.n_alphas - 1) as f64;
        (0..self.n_alphas).map(|k| top * (step * k as f64).exp()).collect()
    }

    /// Shuffled fold assignment of `n` observations
    fn fold_ids(&self, n: usize) -> Vec<Vec<usize>> {
        let k = self.folds.min(n);
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut seeded_rng(self.seed));
        let mut folds = vec![Vec::new(); k];
        for (pos, idx) in order.into_iter().enumerate() {
            folds[pos % k].push(idx);
        }
        folds
    }

    /// Summed validation squared error per alpha over all folds
    fn path_errors(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, alphas: &[f64]) -> Result<Vec<f64>> {
        let n = x.nrows();
        let mut errors = vec![0.0; alphas.len()];

        for held_out in self.fold_ids(n) {
            let train: Vec<usize> = (0..n).filter(|i| !held_out.contains(i)).collect();
            let data = Centered::new(
                x.select(Axis(0), &train).view(),
                y.select(Axis(0), &train).view(),
                self.fit_intercept,
            )?;
            let x_val = x.select(Axis(0), &held_out);
            let y_val = y.select(Axis(0), &held_out);

            let mut warm: Option<Array1<f64>> = None;
            for (a, &alpha) in alphas.iter().enumerate() {
                let result = coordinate_descent(&data.x, &data.y, alpha, self.max_iter, self.tol, warm.as_ref());
                let intercept = data.y_mean - data.x_mean.dot(&result.coef);
                let predicted = x_val.dot(&result.coef) + intercept;
                errors[a] += (&y_val - &predicted).mapv(|r| r * r).sum();
                warm = Some(result.coef);
            }
        }
        Ok(errors)
    }
}

impl Default for LassoCv {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator for LassoCv {
    fn name(&self) -> &'static str {
        "lasso-cv"
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        if self.n_alphas == 0 || self.folds < 2 {
            return Err(ImputeError::Estimator("lasso-cv needs at least one alpha and two folds".into()));
        }
        let data = Centered::new(x, y, self.fit_intercept)?;
        if data.n_samples() < 2 {
            return Err(ImputeError::Estimator("lasso-cv needs at least two observations".into()));
        }

        let alphas = self.alpha_path(alpha_max(&data));
        let errors = self.path_errors(x, y, &alphas)?;
        let best = errors
            .iter()
            .enumerate()
            .fold(0, |best, (i, &e)| if e < errors[best] { i } else { best });
        let alpha = alphas[best];
        debug!("lasso-cv selected alpha {:.3e} from {} candidates", alpha, alphas.len());

        let result = coordinate_descent(&data.x, &data.y, alpha, self.max_iter, self.tol, None);
        if !result.converged {
            warn!("lasso-cv refit did not converge (alpha {:.3e})", alpha);
        }
        self.best_alpha = Some(alpha);
        self.model = Some(data.into_model(result.coef));
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        fitted(&self.model, self.name())?.predict(x)
    }

    fn alpha(&self) -> Option<f64> {
        self.best_alpha
    }

    fn intercept(&self) -> Option<f64> {
        self.model.as_ref().map(|m| m.intercept)
    }

    fn coef(&self) -> Option<&Array1<f64>> {
        self.model.as_ref().map(|m| &m.coef)
    }
}
