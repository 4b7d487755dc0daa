use crate::error::{ImputeError, Result};
use crate::model::linear::{fitted, lstsq, to_array, to_dmatrix, to_dvector, Centered, LinearModel};
use crate::model::Estimator;
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use ndarray::{Array1, ArrayView1, ArrayView2};
use tracing::debug;

/// Solve the ridge system on centered data
///
/// Uses the primal normal equations when there are at least as many
/// observations as features and the dual (kernel) form otherwise.
fn solve_ridge(data: &Centered, alpha: f64) -> Result<Array1<f64>> {
    let (n, p) = (data.n_samples(), data.n_features());
    if p == 0 {
        return Ok(Array1::zeros(0));
    }

    let x = to_dmatrix(&data.x);
    let y = to_dvector(&data.y);

    let coef = if n >= p {
        let gram = x.transpose() * &x + DMatrix::<f64>::identity(p, p) * alpha;
        let rhs = x.transpose() * &y;
        solve_spd(gram, &rhs)?
    } else {
        let kernel = &x * x.transpose() + DMatrix::<f64>::identity(n, n) * alpha;
        let dual = solve_spd(kernel, &y)?;
        x.transpose() * dual
    };
    Ok(to_array(&coef))
}

/// Cholesky solve with an SVD fallback for singular systems
fn solve_spd(a: DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    match a.clone().cholesky() {
        Some(chol) => Ok(chol.solve(b)),
        None => {
            debug!("Cholesky failed, falling back to SVD");
            lstsq(a, b)
        }
    }
}

/// L2-penalized least squares
#[derive(Debug, Clone)]
pub struct Ridge {
    alpha: f64,
    fit_intercept: bool,
    model: Option<LinearModel>,
}

impl Ridge {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            fit_intercept: true,
            model: None,
        }
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }
}

impl Estimator for Ridge {
    fn name(&self) -> &'static str {
        "ridge"
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        if !(self.alpha >= 0.0) {
            return Err(ImputeError::Estimator(format!("ridge alpha must be non-negative, got {}", self.alpha)));
        }
        let data = Centered::new(x, y, self.fit_intercept)?;
        let coef = solve_ridge(&data, self.alpha)?;
        self.model = Some(data.into_model(coef));
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

/// Ridge with leave-one-out selection of alpha
///
/// The LOO residuals for every candidate come from one eigendecomposition of
/// the Gram matrix `X Xᵀ`: with `G = X Xᵀ + αI`, the residual of observation
/// `i` is `(G⁻¹y)ᵢ / (G⁻¹)ᵢᵢ`.
#[derive(Debug, Clone)]
pub struct RidgeCv {
    alphas: Vec<f64>,
    fit_intercept: bool,
    best_alpha: Option<f64>,
    model: Option<LinearModel>,
}

impl RidgeCv {
    pub fn new(alphas: Vec<f64>) -> Self {
        Self {
            alphas,
            fit_intercept: true,
            best_alpha: None,
            model: None,
        }
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Mean squared LOO error for each candidate alpha
    fn loo_errors(&self, data: &Centered) -> Vec<f64> {
        let n = data.n_samples();
        let x = to_dmatrix(&data.x);
        let y = to_dvector(&data.y);
        let eigen = SymmetricEigen::new(&x * x.transpose());
        let q = &eigen.eigenvectors;
        let qty = q.transpose() * &y;

        self.alphas
            .iter()
            .map(|&alpha| {
                let inv: Vec<f64> = eigen
                    .eigenvalues
                    .iter()
                    .map(|&l| 1.0 / (l.max(0.0) + alpha))
                    .collect();
                let mut total = 0.0;
                for i in 0..n {
                    let mut c = 0.0;
                    let mut g_diag = 0.0;
                    for (k, &w) in inv.iter().enumerate() {
                        let qik = q[(i, k)];
                        c += qik * w * qty[k];
                        g_diag += qik * qik * w;
                    }
                    total += (c / g_diag).powi(2);
                }
                total / n as f64
            })
            .collect()
    }
}

impl Estimator for RidgeCv {
    fn name(&self) -> &'static str {
        "ridge-cv"
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        if self.alphas.is_empty() || self.alphas.iter().any(|&a| !(a > 0.0)) {
            return Err(ImputeError::Estimator(format!(
                "ridge-cv alphas must be positive and non-empty, got {:?}",
                self.alphas
            )));
        }
        let data = Centered::new(x, y, self.fit_intercept)?;
        let errors = self.loo_errors(&data);

        let (best_idx, best_err) = errors
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_finite())
            .fold((0, f64::INFINITY), |best, (i, &e)| if e < best.1 { (i, e) } else { best });
        let alpha = self.alphas[best_idx];
        debug!("ridge-cv selected alpha {} (loo mse {:.6})", alpha, best_err);

        let coef = solve_ridge(&data, alpha)?;
        self.best_alpha = Some(alpha);
        self.model = Some(data.into_model(coef));
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
