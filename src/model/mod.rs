pub mod lasso;
pub mod linear;
pub mod metrics;
pub mod ridge;

use crate::error::{ImputeError, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

pub use lasso::{Lasso, LassoCv};
pub use linear::{LinearModel, LinearRegression};
pub use ridge::{Ridge, RidgeCv};

/// Capability set of a regression estimator
///
/// `fit`, `predict` and `score` are required. Hyperparameter and parameter
/// accessors return `None` when the estimator has no such value or has not
/// been fitted.
pub trait Estimator {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Fit on `x` (observations x features) and target `y`
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()>;

    /// Predict one value per row of `x`
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>>;

    /// R² of the predictions on (`x`, `y`)
    fn score(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<f64> {
        let predicted = self.predict(x)?;
        if predicted.len() != y.len() {
            return Err(ImputeError::Estimator(format!(
                "score: {} predictions for {} targets",
                predicted.len(),
                y.len()
            )));
        }
        Ok(metrics::r2_score(y, predicted.view()))
    }

    /// Regularization strength in effect after fitting
    fn alpha(&self) -> Option<f64> {
        None
    }

    /// Fitted intercept
    fn intercept(&self) -> Option<f64> {
        None
    }

    /// Fitted coefficients, one per feature
    fn coef(&self) -> Option<&Array1<f64>> {
        None
    }
}

/// Available estimator families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EstimatorKind {
    /// Ordinary least squares
    Linear,
    /// L2-penalized least squares with fixed alpha
    Ridge,
    /// Ridge with leave-one-out alpha selection
    RidgeCv,
    /// L1-penalized least squares with fixed alpha
    Lasso,
    /// Lasso with k-fold alpha selection
    LassoCv,
}

impl EstimatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimatorKind::Linear => "linear",
            EstimatorKind::Ridge => "ridge",
            EstimatorKind::RidgeCv => "ridge-cv",
            EstimatorKind::Lasso => "lasso",
            EstimatorKind::LassoCv => "lasso-cv",
        }
    }

    /// Whether the estimator exposes an alpha after fitting
    pub fn has_alpha(&self) -> bool {
        !matches!(self, EstimatorKind::Linear)
    }
}

impl std::fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Estimator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Estimator family
    pub kind: EstimatorKind,
    /// Fixed alpha for ridge and lasso
    pub alpha: f64,
    /// Candidate alphas for ridge-cv
    pub alphas: Vec<f64>,
    /// Fit an intercept by centering
    pub fit_intercept: bool,
    /// Coordinate descent iteration cap
    pub max_iter: usize,
    /// Coordinate descent tolerance
    pub tol: f64,
    /// Path length for lasso-cv
    pub n_alphas: usize,
    /// Ratio of smallest to largest alpha on the lasso-cv path
    pub eps: f64,
    /// Folds for lasso-cv
    pub cv_folds: usize,
    /// Fold shuffling seed
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: EstimatorKind::RidgeCv,
            alpha: 1.0,
            alphas: vec![0.1, 1.0, 10.0],
            fit_intercept: true,
            max_iter: 1000,
            tol: 1e-4,
            n_alphas: 30,
            eps: 1e-3,
            cv_folds: 5,
            seed: 2026,
        }
    }
}

impl ModelConfig {
    pub fn new(kind: EstimatorKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_alphas(mut self, alphas: Vec<f64>) -> Self {
        self.alphas = alphas;
        self
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let config_err = |msg: String| -> Result<()> { Err(ImputeError::Config(msg)) };
        match self.kind {
            EstimatorKind::Ridge | EstimatorKind::Lasso if !(self.alpha >= 0.0) => {
                config_err(format!("alpha must be non-negative, got {}", self.alpha))
            }
            EstimatorKind::RidgeCv if self.alphas.is_empty() => {
                config_err("ridge-cv needs at least one candidate alpha".into())
            }
            EstimatorKind::RidgeCv if self.alphas.iter().any(|&a| !(a > 0.0)) => {
                config_err(format!("ridge-cv alphas must be positive, got {:?}", self.alphas))
            }
            EstimatorKind::LassoCv if self.cv_folds < 2 => {
                config_err(format!("cv_folds must be at least 2, got {}", self.cv_folds))
            }
            EstimatorKind::LassoCv if self.n_alphas == 0 || !(self.eps > 0.0 && self.eps < 1.0) => {
                config_err("lasso-cv needs n_alphas > 0 and 0 < eps < 1".into())
            }
            _ => Ok(()),
        }
    }

    /// Build a fresh estimator
    pub fn build(&self) -> Result<Box<dyn Estimator>> {
        self.validate()?;
        let estimator: Box<dyn Estimator> = match self.kind {
            EstimatorKind::Linear => Box::new(LinearRegression::new().with_fit_intercept(self.fit_intercept)),
            EstimatorKind::Ridge => Box::new(Ridge::new(self.alpha).with_fit_intercept(self.fit_intercept)),
            EstimatorKind::RidgeCv => Box::new(
                RidgeCv::new(self.alphas.clone()).with_fit_intercept(self.fit_intercept),
            ),
            EstimatorKind::Lasso => Box::new(
                Lasso::new(self.alpha)
                    .with_fit_intercept(self.fit_intercept)
                    .with_max_iter(self.max_iter)
                    .with_tol(self.tol),
            ),
            EstimatorKind::LassoCv => Box::new(
                LassoCv::new()
                    .with_fit_intercept(self.fit_intercept)
                    .with_path(self.n_alphas, self.eps)
                    .with_folds(self.cv_folds, self.seed)
                    .with_max_iter(self.max_iter)
                    .with_tol(self.tol),
            ),
        };
        Ok(estimator)
    }
}
