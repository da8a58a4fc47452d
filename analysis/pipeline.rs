// ========================================================================================
//
//                         The analysis pipeline: load to report
//
// ========================================================================================
//
// A single forward pass. Each phase owns its inputs and hands an immutable result to
// the next one:
//
// 1.  Load the sale records (fatal if the file is absent).
// 2.  Split rows into train and test with a fixed seed.
// 3.  Clean the training partition only: outlier trim, then median imputation.
// 4.  Derive LogPrice and BathComposite on both partitions.
// 5.  Fit the base and extended least-squares models on the training partition.
// 6.  Evaluate both on the test partition after exponentiating predictions.
// 7.  Persist the models and write the report.

use crate::clean::{self, CleanError, CleaningReport};
use crate::config::{ConfigError, PipelineConfig};
use crate::data::{self, DataError};
use crate::design::ModelSpec;
use crate::estimate::{self, EstimationError};
use crate::evaluate::{self, EvaluationError};
use crate::features::{self, FeatureError};
use crate::model::{ModelError, TrainedModel};
use crate::report::{self, ModelOutcome, ReportArtifacts, ReportError, ReportInputs};
use crate::split::{self, SplitError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Clean(#[from] CleanError),
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error(transparent)]
    Estimation(#[from] EstimationError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to write predictions: {0}")]
    Csv(#[from] csv::Error),
}

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct AnalysisSummary {
    pub train_rows: usize,
    pub test_rows: usize,
    pub cleaning: CleaningReport,
    pub outcomes: Vec<ModelOutcome>,
    pub model_paths: Vec<PathBuf>,
    pub artifacts: ReportArtifacts,
}

pub fn model_file_name(spec: ModelSpec) -> String {
    format!("model_{}.toml", spec.label())
}

/// Runs the full analysis described by `config`.
pub fn run_analysis(config: &PipelineConfig) -> Result<AnalysisSummary, PipelineError> {
    config.validate()?;

    // --- Phase 1: Load ---
    let mut full = data::load_housing_data(&config.data_path, &config.impute_column)?;

    // --- Phase 2: Split ---
    let partition = split::train_test_split(full.n_rows(), config.train_fraction, config.seed)?;
    let raw_train = full.subset(&partition.train);
    let mut test = full.subset(&partition.test);

    // --- Phase 3: Clean (training rows only) ---
    let (mut train, cleaning) = clean::clean_training_set(&raw_train, &config.cleaning())?;

    // --- Phase 4: Features ---
    features::engineer_features(&mut train)?;
    features::engineer_features(&mut test)?;
    features::engineer_features(&mut full)?;

    // --- Phase 5 and 6: Fit and evaluate ---
    fs::create_dir_all(&config.output_dir)?;
    let mut outcomes = Vec::with_capacity(ModelSpec::ALL.len());
    let mut model_paths = Vec::with_capacity(ModelSpec::ALL.len());
    for spec in ModelSpec::ALL {
        let model = estimate::fit_ols(&train, spec)?;
        let evaluation = evaluate::evaluate_model(&model, &test)?;

        let path = config.output_dir.join(model_file_name(spec));
        model.save(&path)?;
        log::info!("Saved {} model to '{}'.", spec.label(), path.display());
        model_paths.push(path);
        outcomes.push(ModelOutcome { model, evaluation });
    }

    // --- Phase 7: Report ---
    let inputs = ReportInputs {
        data_path: &config.data_path,
        seed: config.seed,
        train_fraction: config.train_fraction,
        histogram_bins: config.histogram_bins,
        living_area_threshold: config.living_area_threshold,
        full: &full,
        train: &train,
        test: &test,
        cleaning: &cleaning,
        outcomes: &outcomes,
    };
    let artifacts = report::write_report(&inputs, &config.output_dir)?;

    Ok(AnalysisSummary {
        train_rows: train.n_rows(),
        test_rows: test.n_rows(),
        cleaning,
        outcomes,
        model_paths,
        artifacts,
    })
}

/// Applies a saved model to a new table and writes `id`, log and dollar predictions.
/// Returns the number of rows predicted.
pub fn run_prediction(
    model_path: &Path,
    data_path: &Path,
    impute_column: &str,
    output_path: &Path,
) -> Result<usize, PipelineError> {
    let model = TrainedModel::load(model_path)?;
    log::info!(
        "Loaded {} model from '{}' ({} coefficients).",
        model.spec.label(),
        model_path.display(),
        model.coefficients.len()
    );

    let mut table = data::load_prediction_data(data_path, impute_column)?;
    features::engineer_features(&mut table)?;
    let log_pred = model.predict_log(&table)?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(output_path)?;
    writer.write_record(["id", "predicted_log_price", "predicted_price"])?;
    for (id, log_p) in table.ids.iter().zip(log_pred.iter()) {
        writer.write_record([
            id.clone(),
            format!("{log_p:.6}"),
            format!("{:.2}", log_p.exp()),
        ])?;
    }
    writer.flush()?;
    log::info!(
        "Wrote {} predictions to '{}'.",
        table.n_rows(),
        output_path.display()
    );
    Ok(table.n_rows())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{SyntheticHousingBuilder, write_csv};
    use tempfile::tempdir;

    fn config_for(dir: &Path, rows: usize) -> PipelineConfig {
        let data_path = dir.join("train.csv");
        let data = SyntheticHousingBuilder::new(rows)
            .seed(11)
            .outliers(4)
            .build_raw();
        write_csv(&data, &data_path).unwrap();
        PipelineConfig {
            data_path,
            output_dir: dir.join("out"),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn analysis_writes_models_and_report() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), 300);
        let summary = run_analysis(&config).unwrap();

        assert_eq!(summary.train_rows + summary.test_rows + summary.cleaning.rows_removed, 300);
        assert_eq!(summary.cleaning.rows_before, 210);
        assert_eq!(summary.outcomes.len(), 2);
        assert!(summary.artifacts.report.exists());
        assert!(summary.artifacts.metrics.exists());
        for path in &summary.model_paths {
            let reloaded = TrainedModel::load(path).unwrap();
            assert!(summary.outcomes.iter().any(|o| o.model == reloaded));
        }
    }

    #[test]
    fn missing_data_file_stops_the_run() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig {
            data_path: dir.path().join("absent.csv"),
            output_dir: dir.path().join("out"),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            run_analysis(&config),
            Err(PipelineError::Data(DataError::FileNotFound(_)))
        ));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn invalid_config_is_rejected_before_loading() {
        let config = PipelineConfig {
            train_fraction: 0.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            run_analysis(&config),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn prediction_writes_one_row_per_house() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path(), 200);
        let summary = run_analysis(&config).unwrap();

        let mut unlabeled = SyntheticHousingBuilder::new(25).seed(99).build_raw();
        unlabeled.sale_price = None;
        let new_path = dir.path().join("new.csv");
        write_csv(&unlabeled, &new_path).unwrap();

        let output = dir.path().join("predictions.tsv");
        let count = run_prediction(&summary.model_paths[1], &new_path, "LotFrontage", &output)
            .unwrap();
        assert_eq!(count, 25);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(&output)
            .unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 25);
        for row in &rows {
            let log_p: f64 = row[1].parse().unwrap();
            let price: f64 = row[2].parse().unwrap();
            assert!((log_p.exp() - price).abs() < 0.01 + 1e-6 * price);
        }
    }
}
