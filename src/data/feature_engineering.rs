//! Design matrices for the row-wise regressions
//!
//! Each training sample becomes one observation and each genomic site where the
//! held-out sample is observed becomes one feature. A regression fitted on the
//! training betas of a region then predicts the sample's beta at that region
//! from the sample's observed sites.

use crate::data::ExtractedData;
use crate::error::{ImputeError, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Feature construction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Skip sites where any training beta is missing
    pub drop_incomplete_sites: bool,
    /// Keep at most this many sites, in genomic order
    pub max_sites: Option<usize>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            drop_incomplete_sites: true,
            max_sites: None,
        }
    }
}

/// Regression inputs shared by every row fit
#[derive(Debug, Clone)]
pub struct DesignMatrices {
    /// One row per training sample, one column per feature site
    pub train_x: Array2<f64>,
    /// Single row holding the sample's betas at the feature sites
    pub sample_x: Array2<f64>,
    /// Row indices of the feature sites
    pub sites: Vec<usize>,
}

impl DesignMatrices {
    pub fn n_features(&self) -> usize {
        self.sites.len()
    }
}

/// Builds design matrices from extracted columns
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// Use the sample's observed sites as features
    ///
    /// Sample row `i` is train row `i`; the sample may stop short of the end
    /// of the train table but never run past it.
    pub fn observed_sites(&self, data: &ExtractedData) -> Result<DesignMatrices> {
        let n_regions = data.train.beta.nrows();
        if data.sample.beta.len() > n_regions {
            return Err(ImputeError::Schema(format!(
                "sample has {} regions but train has only {}",
                data.sample.beta.len(),
                n_regions
            )));
        }

        let mut sites: Vec<usize> = data
            .sample
            .missing
            .present()
            .iter()
            .copied()
            .filter(|&i| {
                !self.config.drop_incomplete_sites
                    || data.train.beta.row(i).iter().all(|v| !v.is_nan())
            })
            .collect();

        if let Some(max) = self.config.max_sites {
            sites.truncate(max);
        }

        let dropped = data.sample.missing.present().len() - sites.len();
        if dropped > 0 {
            debug!("Dropped {} observed sites from the design", dropped);
        }

        let train_x = data.train.beta.select(Axis(0), &sites).reversed_axes();
        let sample_x = data
            .sample
            .beta
            .select(Axis(0), &sites)
            .insert_axis(Axis(0));

        info!(
            "Design: {} training samples x {} feature sites",
            train_x.nrows(),
            train_x.ncols()
        );

        Ok(DesignMatrices {
            train_x,
            sample_x,
            sites,
        })
    }
}
