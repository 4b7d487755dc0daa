use crate::error::{ImputeError, Result};
use crate::model::Estimator;
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Fitted linear model `y = x · coef + intercept`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    pub coef: Array1<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coef.len() {
            return Err(ImputeError::Estimator(format!(
                "model has {} features but input has {}",
                self.coef.len(),
                x.ncols()
            )));
        }
        Ok(x.dot(&self.coef) + self.intercept)
    }
}

/// Training data after optional mean-centering
#[derive(Debug, Clone)]
pub(crate) struct Centered {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub x_mean: Array1<f64>,
    pub y_mean: f64,
}

impl Centered {
    /// Validate shapes and values, then center when fitting an intercept
    pub fn new(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, fit_intercept: bool) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(ImputeError::Estimator(format!(
                "x has {} rows but y has {} values",
                x.nrows(),
                y.len()
            )));
        }
        if x.nrows() == 0 {
            return Err(ImputeError::Estimator("cannot fit on zero observations".into()));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(ImputeError::Estimator("input contains NaN or infinite values".into()));
        }

        if !fit_intercept {
            return Ok(Self {
                x: x.to_owned(),
                y: y.to_owned(),
                x_mean: Array1::zeros(x.ncols()),
                y_mean: 0.0,
            });
        }

        let x_mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(x.ncols()));
        let y_mean = y.sum() / y.len() as f64;
        Ok(Self {
            x: &x - &x_mean,
            y: &y - y_mean,
            x_mean,
            y_mean,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// Recover the intercept for coefficients fitted on centered data
    pub fn into_model(self, coef: Array1<f64>) -> LinearModel {
        let intercept = self.y_mean - self.x_mean.dot(&coef);
        LinearModel { coef, intercept }
    }
}

pub(crate) fn to_dmatrix(x: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| x[[i, j]])
}

pub(crate) fn to_dvector(y: &Array1<f64>) -> DVector<f64> {
    DVector::from_iterator(y.len(), y.iter().copied())
}

pub(crate) fn to_array(v: &DVector<f64>) -> Array1<f64> {
    v.iter().copied().collect()
}

/// Minimum-norm least squares solution of `a · w = b` via SVD
pub(crate) fn lstsq(a: DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    let (rows, cols) = a.shape();
    let svd = a.svd(true, true);
    let max_sv = svd.singular_values.max();
    let eps = max_sv * rows.max(cols) as f64 * f64::EPSILON;
    let w = svd
        .solve(b, eps)
        .map_err(|e| ImputeError::Estimator(format!("least squares solve failed: {}", e)))?;
    if w.iter().any(|v| !v.is_finite()) {
        return Err(ImputeError::Estimator("least squares produced non-finite coefficients".into()));
    }
    Ok(w)
}

pub(crate) fn fitted<'a>(model: &'a Option<LinearModel>, name: &str) -> Result<&'a LinearModel> {
    model
        .as_ref()
        .ok_or_else(|| ImputeError::Estimator(format!("{} must be fitted before predict", name)))
}

/// Ordinary least squares
#[derive(Debug, Clone)]
pub struct LinearRegression {
    fit_intercept: bool,
    model: Option<LinearModel>,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            fit_intercept: true,
            model: None,
        }
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn model(&self) -> Option<&LinearModel> {
        self.model.as_ref()
    }
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator for LinearRegression {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        let data = Centered::new(x, y, self.fit_intercept)?;
        let coef = if data.n_features() == 0 {
            Array1::zeros(0)
        } else {
            to_array(&lstsq(to_dmatrix(&data.x), &to_dvector(&data.y))?)
        };
        self.model = Some(data.into_model(coef));
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        fitted(&self.model, self.name())?.predict(x)
    }

    fn intercept(&self) -> Option<f64> {
        self.model.as_ref().map(|m| m.intercept)
    }

    fn coef(&self) -> Option<&Array1<f64>> {
        self.model.as_ref().map(|m| &m.coef)
    }
}
