//! End-to-end imputation run for one chromosome

use crate::data::feature_engineering::{FeatureBuilder, FeatureConfig};
use crate::data::loader::{DataLoader, LoaderConfig};
use crate::data::preprocessing::{ColumnExtractor, ExtractConfig};
use crate::data::{Dataset, SplitPaths};
use crate::error::{ImputeError, Result};
use crate::model::ModelConfig;
use crate::predict::report::{ReportColumns, ReportWriter};
use crate::predict::evaluate;
use crate::regression::{Diagnostics, RegressionConfig, RegressionOutputs, RowRegressor};
use crate::utils::{ensure_dir, format_duration, validation};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Everything needed to impute one chromosome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory holding the train/sample/test tables
    pub data_dir: PathBuf,
    /// Chromosome label substituted into the file names
    pub chromosome: String,
    /// File name prefix, `{chr}` is replaced by the chromosome
    pub prefix: String,
    /// Report destination; defaults to `prediction_chr{chr}.txt` in the data directory
    pub output: Option<PathBuf>,
    /// Optional JSON run summary destination
    pub summary: Option<PathBuf>,
    /// Log table dimensions after loading
    pub detail: bool,
    pub loader: LoaderConfig,
    pub extract: ExtractConfig,
    pub features: FeatureConfig,
    pub model: ModelConfig,
    pub regression: RegressionConfig,
    pub report: ReportColumns,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            chromosome: "1".to_string(),
            prefix: SplitPaths::DEFAULT_PREFIX.to_string(),
            output: None,
            summary: None,
            detail: false,
            loader: LoaderConfig::default(),
            extract: ExtractConfig::default(),
            features: FeatureConfig::default(),
            model: ModelConfig::default(),
            regression: RegressionConfig::default(),
            report: ReportColumns::default(),
        }
    }
}

impl RunConfig {
    /// Load from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ImputeError::file(path, format!("cannot read config: {}", e)))?;
        serde_json::from_str(&text)
            .map_err(|e| ImputeError::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Save as pretty JSON
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ImputeError::Config(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.chromosome.trim().is_empty() {
            return Err(ImputeError::Config("chromosome must not be empty".into()));
        }
        if let Some(every) = self.regression.progress_every {
            validation::positive(every, "progress_every")?;
        }
        if let Some(max_sites) = self.features.max_sites {
            validation::positive(max_sites, "max_sites")?;
        }
        validation::in_range(self.model.tol, 0.0, 1.0, "tol")?;
        self.extract.validate()?;
        self.model.validate()?;
        Ok(())
    }

    pub fn split_paths(&self) -> SplitPaths {
        SplitPaths::with_prefix(&self.data_dir, &self.prefix, &self.chromosome)
    }

    /// Report path, explicit or derived from the chromosome
    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => self.data_dir.join(format!("prediction_chr{}.txt", self.chromosome)),
        }
    }

    /// Diagnostics the driver must record for the configured report
    fn diagnostics(&self) -> Diagnostics {
        let requested = self.regression.diagnostics;
        let reported = self.report.diagnostics();
        Diagnostics {
            alpha: requested.alpha || reported.alpha,
            intercept: requested.intercept || reported.intercept,
            coef: requested.coef || reported.coef,
        }
    }
}

/// Outcome of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub chromosome: String,
    pub estimator: String,
    pub n_regions: usize,
    pub n_missing: usize,
    pub n_imputed: usize,
    pub n_compared: usize,
    pub n_features: usize,
    pub mse: f64,
    pub variance: f64,
    pub r_squared: f64,
    pub elapsed_secs: f64,
    pub report: PathBuf,
}

impl RunSummary {
    /// Write as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ImputeError::Config(format!("cannot serialize summary: {}", e)))?;
        std::fs::write(path, json)?;
        info!("Run summary saved to {}", path.display());
        Ok(())
    }

    pub fn print(&self) {
        info!("=== chr{} ===", self.chromosome);
        info!("Estimator:  {}", self.estimator);
        info!("Regions:    {}", self.n_regions);
        info!("Missing:    {}", self.n_missing);
        info!("Imputed:    {}", self.n_imputed);
        info!("Compared:   {}", self.n_compared);
        info!("Features:   {}", self.n_features);
        info!("MSE:        {:.6}", self.mse);
        info!("R²:         {:.4}", self.r_squared);
        info!("Elapsed:    {}", format_duration(self.elapsed_secs));
    }
}

/// Load, extract, fit every missing row, evaluate and write the report
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    let start = Instant::now();
    config.validate()?;

    let paths = config.split_paths();
    let loader = DataLoader::with_config(config.loader.clone());
    let dataset = Dataset::load(&config.chromosome, &paths, &loader)?;
    if config.detail {
        dataset.log_details();
    }

    let extracted = ColumnExtractor::new(config.extract.clone()).extract(&dataset)?;
    let design = FeatureBuilder::with_config(config.features.clone()).observed_sites(&extracted)?;

    let mut estimator = config.model.build()?;
    let mut outputs = RegressionOutputs::new(config.diagnostics());
    let mut regressor = RowRegressor::new(config.regression.clone());
    regressor.run(
        estimator.as_mut(),
        extracted.train.beta.view(),
        extracted.sample.missing.missing(),
        &design,
        &mut outputs,
    )?;

    let evaluation = evaluate(&outputs.predictions, &outputs.rows, &extracted.test)?;
    evaluation.print();

    let report = config.output_path();
    ReportWriter::new(config.report).write(&report, &outputs, &evaluation)?;

    let summary = RunSummary {
        chromosome: config.chromosome.clone(),
        estimator: config.model.kind.to_string(),
        n_regions: extracted.sample.missing.len(),
        n_missing: extracted.sample.missing.missing().len(),
        n_imputed: outputs.len(),
        n_compared: evaluation.n_compared(),
        n_features: design.n_features(),
        mse: evaluation.mse,
        variance: evaluation.variance,
        r_squared: evaluation.r_squared(),
        elapsed_secs: start.elapsed().as_secs_f64(),
        report,
    };

    if let Some(path) = &config.summary {
        summary.save(path)?;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EstimatorKind;
    use std::fs;

    const PREFIX: &str = "chr{chr}_";

    fn write_tables(dir: &Path) {
        let train = "\
chr1\t100\t101\t+\t0.10\t0.20\t0.30\t0.40\t1
chr1\t200\t201\t-\t0.20\t0.40\t0.60\t0.80\t1
chr1\t300\t301\t+\t0.90\t0.80\t0.70\t0.60\t1
";
        let sample = "\
chr1\t100\t101\t+\t0.25\t2
chr1\t200\t201\t-\tnan\t2
chr1\t300\t301\t+\t0.75\t2
";
        let test = "\
chr1\t100\t101\t+\t0.25\t2
chr1\t200\t201\t-\t0.5\t2
chr1\t300\t301\t+\t0.75\t2
";
        fs::write(dir.join("chr1_train_revised.bed"), train).unwrap();
        fs::write(dir.join("chr1_sample.bed"), sample).unwrap();
        fs::write(dir.join("chr1_test.bed"), test).unwrap();
    }

    fn config(dir: &Path) -> RunConfig {
        let mut config = RunConfig {
            data_dir: dir.to_path_buf(),
            prefix: PREFIX.to_string(),
            output: Some(dir.join("out").join("report.txt")),
            summary: Some(dir.join("out").join("summary.json")),
            ..RunConfig::default()
        };
        config.extract.n_train_betas = 4;
        config.regression.progress_every = Some(1);
        config
    }

    #[test]
    fn test_end_to_end_single_missing_row() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(dir.path());
        let config = config(dir.path());

        let summary = run(&config).unwrap();
        assert_eq!(summary.n_regions, 3);
        assert_eq!(summary.n_missing, 1);
        assert_eq!(summary.n_imputed, 1);
        assert_eq!(summary.n_compared, 1);
        assert_eq!(summary.n_features, 2);
        assert!(summary.mse.is_finite());

        let report = fs::read_to_string(dir.path().join("out").join("report.txt")).unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "prediction    true_val   score");
        let fields: Vec<&str> = lines[1].split_whitespace().collect();
        assert_eq!(fields.len(), 3);
        assert!(fields[0].parse::<f64>().unwrap().is_finite());
        assert_eq!(fields[1], "0.5");

        let json = fs::read_to_string(dir.path().join("out").join("summary.json")).unwrap();
        let saved: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(saved["n_imputed"], 1);
    }

    #[test]
    fn test_sample_covering_first_train_region_only() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(dir.path());
        fs::write(dir.path().join("chr1_sample.bed"), "chr1\t100\t101\t+\tnan\t2\n").unwrap();
        fs::write(dir.path().join("chr1_test.bed"), "chr1\t100\t101\t+\t0.25\t2\n").unwrap();
        let config = config(dir.path());

        let summary = run(&config).unwrap();
        assert_eq!(summary.n_regions, 1);
        assert_eq!(summary.n_imputed, 1);
        assert_eq!(summary.n_features, 0);

        let report = fs::read_to_string(config.output_path()).unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 2);
        let fields: Vec<&str> = lines[1].split_whitespace().collect();
        // no features left, so the fit falls back to the training mean
        assert!((fields[0].parse::<f64>().unwrap() - 0.25).abs() < 1e-9);
        assert_eq!(fields[1], "0.25");
    }

    #[test]
    fn test_report_columns_drive_recorded_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        write_tables(dir.path());
        let mut config = config(dir.path());
        config.model = ModelConfig::new(EstimatorKind::Ridge).with_alpha(0.5);
        config.report = ReportColumns {
            score: false,
            alpha: true,
            intercept: true,
            coef: true,
        };

        run(&config).unwrap();
        let report = fs::read_to_string(config.output_path()).unwrap();
        let mut lines = report.lines();
        assert_eq!(
            lines.next(),
            Some("prediction    true_val   alpha   intercept   coefficient_1   coefficient_2")
        );
        let fields: Vec<&str> = lines.next().unwrap().split_whitespace().collect();
        assert_eq!(fields.len(), 6);
        assert_eq!(fields[2], "0.5");
    }

    #[test]
    fn test_missing_table_is_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        assert!(matches!(run(&config), Err(ImputeError::File { .. })));
    }

    #[test]
    fn test_config_json_roundtrip_and_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let mut config = config(dir.path());
        config.chromosome = "X".to_string();
        config.to_json_file(&path).unwrap();

        let loaded = RunConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded.chromosome, "X");
        assert_eq!(loaded.prefix, PREFIX);
        assert_eq!(loaded.output, config.output);
        assert_eq!(loaded.extract.n_train_betas, 4);
        assert_eq!(loaded.model.kind, config.model.kind);
        assert!(loaded.split_paths().train.ends_with("chrX_train_revised.bed"));

        let partial: RunConfig = serde_json::from_str(r#"{"chromosome": "7"}"#).unwrap();
        assert_eq!(partial.prefix, SplitPaths::DEFAULT_PREFIX);
        assert_eq!(partial.output_path(), PathBuf::from(".").join("prediction_chr7.txt"));

        let bad = RunConfig {
            chromosome: " ".to_string(),
            ..RunConfig::default()
        };
        assert!(matches!(bad.validate(), Err(ImputeError::Config(_))));
    }
}
