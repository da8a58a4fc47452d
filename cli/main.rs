#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use housefit::config::PipelineConfig;
use housefit::pipeline::{run_analysis, run_prediction};
use housefit::synthetic::{SyntheticHousingBuilder, write_csv};

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Path to the sale records CSV (overrides the configuration file)
    pub data: Option<PathBuf>,

    /// Optional TOML configuration file; flags take precedence over its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for the report, plot data, metrics and model files
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Seed for the train/test split
    #[arg(long)]
    pub seed: Option<u64>,

    /// Fraction of rows assigned to the training partition
    #[arg(long)]
    pub train_fraction: Option<f64>,

    /// Training rows with GrLivArea at or above this value are removed
    #[arg(long)]
    pub living_area_threshold: Option<f64>,

    /// Numeric column whose missing values are median-imputed
    #[arg(long)]
    pub impute_column: Option<String>,
}

#[derive(Args)]
pub struct PredictArgs {
    /// CSV with the predictor columns (SalePrice not required)
    pub data: PathBuf,

    /// Path to a saved model file (.toml)
    #[arg(long)]
    pub model: PathBuf,

    /// Where to write the predictions
    #[arg(long, default_value = "predictions.tsv")]
    pub output: PathBuf,

    /// Imputation column name, read if present
    #[arg(long, default_value = "LotFrontage")]
    pub impute_column: String,
}

#[derive(Args)]
pub struct SimulateArgs {
    /// Where to write the generated CSV
    pub output: PathBuf,

    #[arg(long, default_value = "1460")]
    pub rows: usize,

    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Number of houses given a living area above 4000 sq ft
    #[arg(long, default_value = "4")]
    pub outliers: usize,
}

#[derive(Parser)]
#[command(
    name = "housefit",
    about = "Regression analysis of residential sale prices",
    long_about = "Splits a table of house sales, cleans the training partition, fits base and \
                 extended log-price regressions and reports held-out accuracy."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the full analysis (outputs: report.md, metrics.tsv, model_*.toml)")]
    Analyze(AnalyzeArgs),
    #[command(about = "Apply a saved model to new data (outputs: predictions.tsv)")]
    Predict(PredictArgs),
    #[command(about = "Write a synthetic sale table in the expected CSV schema")]
    Simulate(SimulateArgs),
    #[command(about = "Display version information")]
    Version,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { command } = Cli::parse();

    let result = match command {
        Some(Commands::Analyze(args)) => analyze(args),
        Some(Commands::Predict(args)) => predict(args),
        Some(Commands::Simulate(args)) => simulate(args),
        Some(Commands::Version) => {
            println!("housefit {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

pub fn analyze(args: AnalyzeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(data) = args.data {
        config.data_path = data;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(fraction) = args.train_fraction {
        config.train_fraction = fraction;
    }
    if let Some(threshold) = args.living_area_threshold {
        config.living_area_threshold = threshold;
    }
    if let Some(column) = args.impute_column {
        config.impute_column = column;
    }

    println!("Loading sale records from: {}", config.data_path.display());
    let summary = run_analysis(&config)?;

    println!(
        "Trained on {} rows ({} outliers removed, {} cells imputed), tested on {} rows.",
        summary.train_rows,
        summary.cleaning.rows_removed,
        summary.cleaning.imputed_cells,
        summary.test_rows
    );
    for outcome in &summary.outcomes {
        let m = outcome.evaluation.metrics;
        println!(
            "  {:<9} RMSE = {:>12.2}  MAE = {:>12.2}  R² = {:.4}",
            outcome.model.spec.label(),
            m.rmse,
            m.mae,
            m.r_squared
        );
    }
    println!("Report written to: {}", summary.artifacts.report.display());
    Ok(())
}

pub fn predict(args: PredictArgs) -> Result<(), Box<dyn std::error::Error>> {
    let count = run_prediction(&args.model, &args.data, &args.impute_column, &args.output)?;
    println!(
        "Wrote {count} predictions to: {}",
        args.output.display()
    );
    Ok(())
}

pub fn simulate(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let data = SyntheticHousingBuilder::new(args.rows)
        .seed(args.seed)
        .outliers(args.outliers)
        .build_raw();
    write_csv(&data, &args.output)?;
    println!(
        "Wrote {} synthetic sales to: {}",
        data.n_rows(),
        args.output.display()
    );
    Ok(())
}
