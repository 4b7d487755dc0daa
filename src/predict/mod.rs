//! Evaluation of imputed values against held-out ground truth

pub mod report;

use crate::data::SplitColumns;
use crate::error::{ImputeError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// A prediction that could be checked against a known value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Index into the prediction sequence
    pub position: usize,
    /// Row of the sample/test tables
    pub row: usize,
    pub prediction: f64,
    pub true_value: f64,
}

/// Aggregate error of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Mean squared error over compared rows
    pub mse: f64,
    /// Population variance of the compared true values
    pub variance: f64,
    pub compared: Vec<Comparison>,
}

impl Evaluation {
    /// Fraction of the true-value variance explained by the predictions
    pub fn r_squared(&self) -> f64 {
        1.0 - self.mse / self.variance
    }

    pub fn n_compared(&self) -> usize {
        self.compared.len()
    }

    /// Log the headline numbers
    pub fn print(&self) {
        info!("=== Imputation Error ===");
        info!("Compared rows: {}", self.n_compared());
        info!("MSE:           {:.6}", self.mse);
        info!("Variance:      {:.6}", self.variance);
        info!("R²:            {:.4}", self.r_squared());
    }
}

/// Compare predictions with the test table
///
/// `rows[i]` is the sample row that produced `predictions[i]`. Rows whose
/// true value is missing are left out of both the error and the variance.
pub fn evaluate(predictions: &[f64], rows: &[usize], test: &SplitColumns) -> Result<Evaluation> {
    evaluate_values(predictions, rows, &test.beta)
}

/// Same as [`evaluate`] on a bare truth column
pub fn evaluate_values(predictions: &[f64], rows: &[usize], truth: &Array1<f64>) -> Result<Evaluation> {
    if predictions.len() != rows.len() {
        return Err(ImputeError::Schema(format!(
            "{} predictions for {} missing rows",
            predictions.len(),
            rows.len()
        )));
    }

    let mut compared = Vec::new();
    for (position, (&prediction, &row)) in predictions.iter().zip(rows).enumerate() {
        let true_value = *truth.get(row).ok_or_else(|| {
            ImputeError::Schema(format!("row {} outside test table of {} rows", row, truth.len()))
        })?;
        if true_value.is_nan() {
            continue;
        }
        compared.push(Comparison {
            position,
            row,
            prediction,
            true_value,
        });
    }

    if compared.is_empty() {
        warn!("No imputed row has a known true value; error is undefined");
        return Ok(Evaluation {
            mse: f64::NAN,
            variance: f64::NAN,
            compared,
        });
    }

    let n = compared.len() as f64;
    let mse = compared
        .iter()
        .map(|c| (c.prediction - c.true_value).powi(2))
        .sum::<f64>()
        / n;
    let mean = compared.iter().map(|c| c.true_value).sum::<f64>() / n;
    let variance = compared.iter().map(|c| (c.true_value - mean).powi(2)).sum::<f64>() / n;

    Ok(Evaluation {
        mse,
        variance,
        compared,
    })
}
