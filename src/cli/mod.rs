use crate::data::preprocessing::StrandEncoding;
use crate::error::Result;
use crate::model::EstimatorKind;
use crate::pipeline::RunConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// betaimpute: per-region regression imputation of methylation beta values
#[derive(Parser, Debug)]
#[command(name = "betaimpute")]
#[command(about = "Impute missing methylation beta values by per-region regression")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Impute one chromosome and write the report
    Run(RunArgs),

    /// Load a chromosome and log table dimensions and missing counts
    Inspect(InspectArgs),
}

/// Imputation arguments
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Directory holding the train/sample/test tables
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Chromosome label
    #[arg(short, long, required_unless_present = "config")]
    pub chromosome: Option<String>,

    /// File name prefix, `{chr}` is replaced by the chromosome
    #[arg(long)]
    pub prefix: Option<String>,

    /// Report file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JSON run configuration; flags given here override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Estimator family
    #[arg(short, long, value_enum)]
    pub model: Option<EstimatorKind>,

    /// Fixed alpha for ridge and lasso
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Candidate alphas for ridge-cv, comma separated
    #[arg(long, value_delimiter = ',')]
    pub alphas: Option<Vec<f64>>,

    /// Fit without an intercept
    #[arg(long)]
    pub no_intercept: bool,

    /// Number of beta columns in the training table
    #[arg(long)]
    pub train_betas: Option<usize>,

    /// Min-max scale start/end positions
    #[arg(long)]
    pub normalize: bool,

    /// Lower bound of the position range
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    pub range_min: f64,

    /// Upper bound of the position range
    #[arg(long, default_value = "1.0", allow_hyphen_values = true)]
    pub range_max: f64,

    /// Map strand symbols to numeric codes
    #[arg(long)]
    pub strand: bool,

    /// Code for the "-" strand
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    pub minus_code: f64,

    /// Code for the "+" strand
    #[arg(long, default_value = "1.0", allow_hyphen_values = true)]
    pub plus_code: f64,

    /// Log progress whenever the row index is a multiple of this
    #[arg(long)]
    pub progress_every: Option<usize>,

    /// Show a progress bar
    #[arg(long)]
    pub progress_bar: bool,

    /// Skip rows with missing training betas instead of failing
    #[arg(long)]
    pub skip_incomplete_rows: bool,

    /// Leave the score column out of the report
    #[arg(long)]
    pub no_score: bool,

    /// Report the fitted alpha
    #[arg(long)]
    pub record_alpha: bool,

    /// Report the fitted intercept
    #[arg(long)]
    pub record_intercept: bool,

    /// Report the fitted coefficients
    #[arg(long)]
    pub record_coef: bool,

    /// Write a JSON run summary here
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Log table dimensions after loading
    #[arg(long)]
    pub detail: bool,
}

impl RunArgs {
    /// Build the run configuration: config file (or defaults) plus flags
    pub fn to_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)?,
            None => RunConfig::default(),
        };

        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(chromosome) = &self.chromosome {
            config.chromosome = chromosome.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.prefix = prefix.clone();
        }
        if self.output.is_some() {
            config.output = self.output.clone();
        }
        if self.summary.is_some() {
            config.summary = self.summary.clone();
        }
        config.detail |= self.detail;

        if let Some(kind) = self.model {
            config.model.kind = kind;
        }
        if let Some(alpha) = self.alpha {
            config.model.alpha = alpha;
        }
        if let Some(alphas) = &self.alphas {
            config.model.alphas = alphas.clone();
        }
        if self.no_intercept {
            config.model.fit_intercept = false;
        }

        if let Some(n) = self.train_betas {
            config.extract.n_train_betas = n;
        }
        if self.normalize {
            config.extract.position_range = Some((self.range_min, self.range_max));
        }
        if self.strand {
            config.extract.strand = Some(StrandEncoding::new(self.minus_code, self.plus_code));
        }

        if self.progress_every.is_some() {
            config.regression.progress_every = self.progress_every;
        }
        config.regression.progress_bar |= self.progress_bar;
        config.regression.skip_incomplete_rows |= self.skip_incomplete_rows;

        if self.no_score {
            config.report.score = false;
        }
        config.report.alpha |= self.record_alpha;
        config.report.intercept |= self.record_intercept;
        config.report.coef |= self.record_coef;

        config.validate()?;
        Ok(config)
    }
}

/// Inspection arguments
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Directory holding the train/sample/test tables
    #[arg(short, long, default_value = ".")]
    pub data_dir: PathBuf,

    /// Chromosome label
    #[arg(short, long, required = true)]
    pub chromosome: String,

    /// File name prefix, `{chr}` is replaced by the chromosome
    #[arg(long)]
    pub prefix: Option<String>,

    /// Number of beta columns in the training table
    #[arg(long)]
    pub train_betas: Option<usize>,
}

/// Parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Setup logging based on verbosity
pub fn setup_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
