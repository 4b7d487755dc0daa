//! Row-wise regression driver
//!
//! Every sample row with a missing beta gets its own fit: the target is that
//! region's beta across the training samples, the inputs are the shared design
//! matrices. Nothing carries over from one row to the next.

pub mod callbacks;

use crate::data::feature_engineering::DesignMatrices;
use crate::error::{ImputeError, Result};
use crate::model::Estimator;
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use callbacks::{CallbackManager, ProgressBarCallback, ProgressLoggerCallback, TimerCallback};

/// Fitted-estimator values to collect per row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Diagnostics {
    pub alpha: bool,
    pub intercept: bool,
    pub coef: bool,
}

/// Driver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// Diagnostics to record alongside predictions
    pub diagnostics: Diagnostics,
    /// Log the row index whenever it is a multiple of this
    pub progress_every: Option<usize>,
    /// Show a terminal progress bar
    pub progress_bar: bool,
    /// Skip rows whose training betas contain NaN instead of failing
    pub skip_incomplete_rows: bool,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            diagnostics: Diagnostics::default(),
            progress_every: Some(10_000),
            progress_bar: false,
            skip_incomplete_rows: false,
        }
    }
}

/// Per-row results, parallel vectors in fitting order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegressionOutputs {
    /// Sample row index of each fit
    pub rows: Vec<usize>,
    pub predictions: Vec<f64>,
    /// R² on the training pair of each fit
    pub scores: Vec<f64>,
    pub alphas: Option<Vec<f64>>,
    pub intercepts: Option<Vec<f64>>,
    pub coefs: Option<Vec<Array1<f64>>>,
}

impl RegressionOutputs {
    /// Empty outputs collecting the requested diagnostics
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self {
            alphas: diagnostics.alpha.then(Vec::new),
            intercepts: diagnostics.intercept.then(Vec::new),
            coefs: diagnostics.coef.then(Vec::new),
            ..Self::default()
        }
    }

    /// Number of fitted rows
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }
}

/// Fits one regression per missing sample row
pub struct RowRegressor {
    config: RegressionConfig,
    callbacks: CallbackManager,
}

impl RowRegressor {
    /// Create a driver with the callbacks implied by the configuration
    pub fn new(config: RegressionConfig) -> Self {
        let mut callbacks = CallbackManager::new();
        if let Some(every) = config.progress_every {
            callbacks.add_callback(ProgressLoggerCallback::new(every));
        }
        if config.progress_bar {
            callbacks.add_callback(ProgressBarCallback::new());
        }
        callbacks.add_callback(TimerCallback::new());
        Self { config, callbacks }
    }

    /// Create a driver with caller-supplied callbacks only
    pub fn with_callbacks(config: RegressionConfig, callbacks: CallbackManager) -> Self {
        Self { config, callbacks }
    }

    pub fn config(&self) -> &RegressionConfig {
        &self.config
    }

    /// Fit, predict and score every row in `missing_rows`, appending to `outputs`
    ///
    /// Diagnostics requested by the configuration but absent from empty
    /// `outputs` are switched on; non-empty outputs must already carry them.
    pub fn run(
        &mut self,
        estimator: &mut dyn Estimator,
        train_beta: ArrayView2<'_, f64>,
        missing_rows: &[usize],
        design: &DesignMatrices,
        outputs: &mut RegressionOutputs,
    ) -> Result<()> {
        if design.train_x.nrows() != train_beta.ncols() {
            return Err(ImputeError::Schema(format!(
                "design has {} training observations but beta matrix has {} samples",
                design.train_x.nrows(),
                train_beta.ncols()
            )));
        }
        if design.sample_x.nrows() != 1 {
            return Err(ImputeError::Schema(format!(
                "sample design must be a single row, got {}",
                design.sample_x.nrows()
            )));
        }
        if let Some(&row) = missing_rows.iter().find(|&&r| r >= train_beta.nrows()) {
            return Err(ImputeError::Schema(format!(
                "row {} outside training table of {} rows",
                row,
                train_beta.nrows()
            )));
        }

        self.prepare_outputs(outputs)?;

        info!(
            "Running {} regression on {} rows",
            estimator.name(),
            missing_rows.len()
        );

        let train_x = design.train_x.view();
        let sample_x = design.sample_x.view();
        let mut skipped = 0usize;

        self.callbacks.on_run_begin(missing_rows.len());

        for (position, &row) in missing_rows.iter().enumerate() {
            self.callbacks.on_row_begin(position, row);
            let y = train_beta.row(row);
            if self.config.skip_incomplete_rows && y.iter().any(|v| v.is_nan()) {
                debug!("Skipping row {} with incomplete training betas", row);
                skipped += 1;
                self.callbacks.on_row_end(position, row);
                continue;
            }

            estimator.fit(train_x, y).map_err(|e| at_row(e, row))?;
            let predicted = estimator.predict(sample_x).map_err(|e| at_row(e, row))?;
            let score = estimator.score(train_x, y).map_err(|e| at_row(e, row))?;

            outputs.rows.push(row);
            outputs.predictions.push(predicted[0]);
            outputs.scores.push(score);

            if let Some(alphas) = outputs.alphas.as_mut() {
                alphas.push(estimator.alpha().ok_or_else(|| not_exposed(&*estimator, "alpha"))?);
            }
            if let Some(intercepts) = outputs.intercepts.as_mut() {
                intercepts.push(estimator.intercept().ok_or_else(|| not_exposed(&*estimator, "intercept"))?);
            }
            if let Some(coefs) = outputs.coefs.as_mut() {
                coefs.push(estimator.coef().cloned().ok_or_else(|| not_exposed(&*estimator, "coefficients"))?);
            }

            self.callbacks.on_row_end(position, row);
        }

        if skipped > 0 {
            warn!("Skipped {} rows with incomplete training betas", skipped);
        }
        self.callbacks.on_run_end(outputs);
        Ok(())
    }

    fn prepare_outputs(&self, outputs: &mut RegressionOutputs) -> Result<()> {
        let wanted = self.config.diagnostics;
        let fresh = outputs.is_empty();
        let lacking = |requested: bool, recorded: bool, what: &str| -> Result<bool> {
            match (requested, recorded) {
                (true, false) if fresh => Ok(true),
                (true, false) => Err(ImputeError::Config(format!(
                    "{} diagnostics requested but outputs already hold {} rows without them",
                    what,
                    outputs.len()
                ))),
                _ => Ok(false),
            }
        };

        let alpha = lacking(wanted.alpha, outputs.alphas.is_some(), "alpha")?;
        let intercept = lacking(wanted.intercept, outputs.intercepts.is_some(), "intercept")?;
        let coef = lacking(wanted.coef, outputs.coefs.is_some(), "coefficient")?;

        if alpha {
            outputs.alphas = Some(Vec::new());
        }
        if intercept {
            outputs.intercepts = Some(Vec::new());
        }
        if coef {
            outputs.coefs = Some(Vec::new());
        }
        Ok(())
    }
}

fn at_row(err: ImputeError, row: usize) -> ImputeError {
    match err {
        ImputeError::Estimator(msg) => ImputeError::Estimator(format!("row {}: {}", row, msg)),
        other => other,
    }
}

fn not_exposed(estimator: &dyn Estimator, what: &str) -> ImputeError {
    ImputeError::Estimator(format!("{} estimator does not expose {}", estimator.name(), what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinearRegression, Ridge};
    use super::callbacks::RegressionCallback;
    use ndarray::{array, Array2};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Predicts the training target mean and counts fits
    #[derive(Default)]
    struct MeanEstimator {
        mean: Option<f64>,
        fits: usize,
    }

    impl Estimator for MeanEstimator {
        fn name(&self) -> &'static str {
            "mean"
        }

        fn fit(&mut self, _x: ArrayView2<'_, f64>, y: ndarray::ArrayView1<'_, f64>) -> Result<()> {
            self.mean = y.mean();
            self.fits += 1;
            Ok(())
        }

        fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
            let mean = self.mean.ok_or_else(|| ImputeError::Estimator("unfitted".into()))?;
            Ok(Array1::from_elem(x.nrows(), mean))
        }
    }

    fn design(train_x: Array2<f64>, sample_x: Array2<f64>) -> DesignMatrices {
        let sites = (0..train_x.ncols()).collect();
        DesignMatrices {
            train_x,
            sample_x,
            sites,
        }
    }

    fn quiet() -> RowRegressor {
        RowRegressor::with_callbacks(RegressionConfig::default(), CallbackManager::new())
    }

    #[test]
    fn test_one_fit_per_missing_row() {
        let train_beta = array![[0.1, 0.3], [0.5, 0.7], [0.2, 0.2]];
        let design = design(Array2::zeros((2, 0)), Array2::zeros((1, 0)));
        let mut estimator = MeanEstimator::default();
        let mut outputs = RegressionOutputs::default();

        quiet()
            .run(&mut estimator, train_beta.view(), &[0, 2], &design, &mut outputs)
            .unwrap();

        assert_eq!(estimator.fits, 2);
        assert_eq!(outputs.rows, vec![0, 2]);
        assert!((outputs.predictions[0] - 0.2).abs() < 1e-12);
        assert!((outputs.predictions[1] - 0.2).abs() < 1e-12);
        assert_eq!(outputs.scores.len(), 2);
        assert!(outputs.alphas.is_none());
    }

    #[test]
    fn test_records_requested_diagnostics() {
        // training samples as rows, two feature sites
        let train_x = array![[0.1, 0.9], [0.4, 0.6], [0.8, 0.3], [0.5, 0.5]];
        let train_beta = array![[0.2, 0.5, 0.9, 0.6], [0.9, 0.6, 0.2, 0.5]];
        let design = design(train_x, array![[0.3, 0.7]]);

        let mut estimator = Ridge::new(0.5);
        let mut outputs = RegressionOutputs::new(Diagnostics {
            alpha: true,
            intercept: true,
            coef: true,
        });
        quiet()
            .run(&mut estimator, train_beta.view(), &[0, 1], &design, &mut outputs)
            .unwrap();

        assert_eq!(outputs.alphas, Some(vec![0.5, 0.5]));
        assert_eq!(outputs.intercepts.as_ref().map(Vec::len), Some(2));
        let coefs = outputs.coefs.as_ref().unwrap();
        assert_eq!(coefs.len(), 2);
        assert!(coefs.iter().all(|c| c.len() == 2));
    }

    #[test]
    fn test_missing_alpha_is_estimator_error() {
        let train_beta = array![[0.2, 0.4, 0.6]];
        let design = design(array![[0.0], [1.0], [2.0]], array![[1.5]]);
        let mut estimator = LinearRegression::new();
        let mut outputs = RegressionOutputs::new(Diagnostics {
            alpha: true,
            ..Diagnostics::default()
        });

        let err = quiet()
            .run(&mut estimator, train_beta.view(), &[0], &design, &mut outputs)
            .unwrap_err();
        assert!(matches!(err, ImputeError::Estimator(_)));
    }

    #[test]
    fn test_shape_checks() {
        let train_beta = array![[0.2, 0.4, 0.6]];
        let mut estimator = MeanEstimator::default();
        let mut outputs = RegressionOutputs::default();

        let wrong_obs = design(Array2::zeros((2, 0)), Array2::zeros((1, 0)));
        assert!(matches!(
            quiet().run(&mut estimator, train_beta.view(), &[0], &wrong_obs, &mut outputs),
            Err(ImputeError::Schema(_))
        ));

        let two_rows = design(Array2::zeros((3, 0)), Array2::zeros((2, 0)));
        assert!(matches!(
            quiet().run(&mut estimator, train_beta.view(), &[0], &two_rows, &mut outputs),
            Err(ImputeError::Schema(_))
        ));

        let ok = design(Array2::zeros((3, 0)), Array2::zeros((1, 0)));
        assert!(matches!(
            quiet().run(&mut estimator, train_beta.view(), &[5], &ok, &mut outputs),
            Err(ImputeError::Schema(_))
        ));
    }

    #[test]
    fn test_skip_incomplete_rows() {
        let train_beta = array![[0.2, f64::NAN, 0.6], [0.1, 0.2, 0.3]];
        let design = design(Array2::zeros((3, 0)), Array2::zeros((1, 0)));
        let config = RegressionConfig {
            skip_incomplete_rows: true,
            ..RegressionConfig::default()
        };
        let mut driver = RowRegressor::with_callbacks(config, CallbackManager::new());
        let mut estimator = LinearRegression::new();
        let mut outputs = RegressionOutputs::default();

        driver
            .run(&mut estimator, train_beta.view(), &[0, 1], &design, &mut outputs)
            .unwrap();
        assert_eq!(outputs.rows, vec![1]);
        assert!((outputs.predictions[0] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_config_diagnostics_are_recorded() {
        let train_x = array![[0.1, 0.9], [0.4, 0.6], [0.8, 0.3], [0.5, 0.5]];
        let train_beta = array![[0.2, 0.5, 0.9, 0.6]];
        let design = design(train_x, array![[0.3, 0.7]]);
        let config = RegressionConfig {
            diagnostics: Diagnostics {
                alpha: true,
                ..Diagnostics::default()
            },
            ..RegressionConfig::default()
        };
        let mut estimator = Ridge::new(0.5);
        let mut outputs = RegressionOutputs::default();

        RowRegressor::with_callbacks(config.clone(), CallbackManager::new())
            .run(&mut estimator, train_beta.view(), &[0], &design, &mut outputs)
            .unwrap();
        assert_eq!(outputs.alphas, Some(vec![0.5]));
        assert!(outputs.coefs.is_none());

        // outputs already holding rows cannot gain a column halfway
        let mut partial = RegressionOutputs {
            rows: vec![0],
            predictions: vec![0.5],
            scores: vec![1.0],
            ..RegressionOutputs::default()
        };
        let err = RowRegressor::with_callbacks(config, CallbackManager::new())
            .run(&mut estimator, train_beta.view(), &[0], &design, &mut partial)
            .unwrap_err();
        assert!(matches!(err, ImputeError::Config(_)));
    }

    struct FailingEstimator;

    impl Estimator for FailingEstimator {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn fit(&mut self, _x: ArrayView2<'_, f64>, _y: ndarray::ArrayView1<'_, f64>) -> Result<()> {
            Err(ImputeError::Estimator("singular".into()))
        }

        fn predict(&self, _x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
            Err(ImputeError::Estimator("unfitted".into()))
        }
    }

    struct RowEvents(Rc<RefCell<Vec<(&'static str, usize)>>>);

    impl RegressionCallback for RowEvents {
        fn on_row_begin(&mut self, _position: usize, row: usize) {
            self.0.borrow_mut().push(("begin", row));
        }

        fn on_row_end(&mut self, _position: usize, row: usize) {
            self.0.borrow_mut().push(("end", row));
        }
    }

    #[test]
    fn test_row_begin_fires_before_failing_fit() {
        let train_beta = array![[0.2, 0.4, 0.6], [0.1, 0.1, 0.1]];
        let design = design(Array2::zeros((3, 0)), Array2::zeros((1, 0)));
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut callbacks = CallbackManager::new();
        callbacks.add_callback(RowEvents(Rc::clone(&events)));
        let mut outputs = RegressionOutputs::default();

        let err = RowRegressor::with_callbacks(RegressionConfig::default(), callbacks)
            .run(&mut FailingEstimator, train_beta.view(), &[0, 1], &design, &mut outputs)
            .unwrap_err();

        assert!(matches!(err, ImputeError::Estimator(msg) if msg.starts_with("row 0")));
        assert_eq!(*events.borrow(), vec![("begin", 0)]);
        assert!(outputs.is_empty());
    }
}
