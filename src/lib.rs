//! # betaimpute: methylation beta value imputation
//!
//! Loads per-chromosome train/sample/test region tables, finds the sample
//! regions whose beta value is missing, and predicts each one with its own
//! regression against a panel of reference samples.
//!
//! ## Features
//!
//! - Plain or gzipped tab-separated input
//! - Linear, ridge and lasso estimators, with cross-validated alpha selection
//! - Error against held-out truth and a plain-text report
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use betaimpute::data::loader::DataLoader;
//! use betaimpute::data::preprocessing::{ColumnExtractor, ExtractConfig};
//! use betaimpute::data::feature_engineering::FeatureBuilder;
//! use betaimpute::data::{Dataset, SplitPaths};
//! use betaimpute::model::ModelConfig;
//! use betaimpute::regression::{RegressionConfig, RegressionOutputs, RowRegressor};
//!
//! let paths = SplitPaths::for_chromosome("data", "1");
//! let dataset = Dataset::load("1", &paths, &DataLoader::new()).unwrap();
//! let extracted = ColumnExtractor::new(ExtractConfig::default()).extract(&dataset).unwrap();
//! let design = FeatureBuilder::new().observed_sites(&extracted).unwrap();
//!
//! let mut estimator = ModelConfig::default().build().unwrap();
//! let mut outputs = RegressionOutputs::default();
//! RowRegressor::new(RegressionConfig::default())
//!     .run(
//!         estimator.as_mut(),
//!         extracted.train.beta.view(),
//!         extracted.sample.missing.missing(),
//!         &design,
//!         &mut outputs,
//!     )
//!     .unwrap();
//!
//! let eval = betaimpute::predict::evaluate(&outputs.predictions, &outputs.rows, &extracted.test).unwrap();
//! println!("mse = {}", eval.mse);
//! ```

pub mod cli;
pub mod data;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod predict;
pub mod regression;
pub mod utils;

/// Re-export commonly used types
pub use data::loader::DataLoader;
pub use data::{Dataset, ExtractedData, MissingIndex, SplitPaths};
pub use error::{ImputeError, Result};
pub use model::{Estimator, EstimatorKind, ModelConfig};
pub use pipeline::{RunConfig, RunSummary};
pub use predict::{evaluate, Evaluation};
pub use regression::{RegressionOutputs, RowRegressor};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!(
        "{} v{} - methylation beta value imputation",
        NAME, VERSION
    )
}
