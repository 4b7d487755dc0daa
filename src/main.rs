use anyhow::{Context, Result};
use betaimpute::cli::{parse_args, setup_logging, Commands, InspectArgs, RunArgs};
use betaimpute::data::feature_engineering::FeatureBuilder;
use betaimpute::data::loader::DataLoader;
use betaimpute::data::preprocessing::{ColumnExtractor, ExtractConfig};
use betaimpute::data::{Dataset, SplitPaths};
use tracing::{error, info};

fn main() {
    let cli = parse_args();

    setup_logging(cli.verbose);

    info!("{}", betaimpute::info());

    let result = match cli.command {
        Commands::Run(args) => run_impute(args),
        Commands::Inspect(args) => run_inspect(args),
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_impute(args: RunArgs) -> Result<()> {
    let config = args.to_config().context("Invalid run configuration")?;

    info!("Starting imputation...");
    info!("Data directory: {:?}", config.data_dir);
    info!("Chromosome: {}", config.chromosome);
    info!("Estimator: {}", config.model.kind);
    info!("Report file: {:?}", config.output_path());

    let summary = betaimpute::pipeline::run(&config)
        .with_context(|| format!("Imputation failed for chr{}", config.chromosome))?;

    summary.print();
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let prefix = args.prefix.as_deref().unwrap_or(SplitPaths::DEFAULT_PREFIX);
    let paths = SplitPaths::with_prefix(&args.data_dir, prefix, &args.chromosome);

    info!("Inspecting chr{} in {:?}", args.chromosome, args.data_dir);

    let dataset = Dataset::load(&args.chromosome, &paths, &DataLoader::new())
        .with_context(|| format!("Failed to load tables from {:?}", args.data_dir))?;
    dataset.log_details();

    let mut extract = ExtractConfig::default();
    if let Some(n) = args.train_betas {
        extract = extract.with_train_betas(n);
    }
    let extracted = ColumnExtractor::new(extract)
        .extract(&dataset)
        .context("Failed to extract columns")?;

    let design = FeatureBuilder::new()
        .observed_sites(&extracted)
        .context("Failed to build design matrices")?;

    info!("Rows to impute: {}", extracted.sample.missing.missing().len());
    info!("Feature sites: {}", design.n_features());
    info!("Training samples: {}", design.train_x.nrows());

    Ok(())
}
