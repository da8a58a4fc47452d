//! # Report Rendering
//!
//! Writes the narrative Markdown report together with the tab-separated data behind
//! each figure (scatter with fitted line, histograms, box plots, residuals versus
//! predicted). Nothing here feeds back into the analysis.

use crate::clean::CleaningReport;
use crate::data::HousingData;
use crate::evaluate::{Evaluation, PredictionRecord};
use crate::model::TrainedModel;
use crate::stats::{self, FiveNumberSummary, HistogramBin};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const REPORT_FILE: &str = "report.md";
pub const METRICS_FILE: &str = "metrics.tsv";
const SCATTER_FILE: &str = "scatter_grlivarea_saleprice.tsv";
const PRICE_HISTOGRAM_FILE: &str = "histogram_saleprice.tsv";
const LOG_PRICE_HISTOGRAM_FILE: &str = "histogram_log_saleprice.tsv";
const BOXPLOT_FILE: &str = "boxplot_saleprice_by_overallqual.tsv";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report output: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to write tab-separated output: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Formatting error while rendering the report: {0}")]
    FmtError(#[from] std::fmt::Error),
    #[error("Table '{0}' has no derived LogPrice column; run feature engineering first.")]
    MissingLogPrice(&'static str),
    #[error("Table '{0}' has no SalePrice column.")]
    MissingSalePrice(&'static str),
}

/// One fitted model with its held-out evaluation.
#[derive(Debug, Clone)]
pub struct ModelOutcome {
    pub model: TrainedModel,
    pub evaluation: Evaluation,
}

/// Everything the report describes.
#[derive(Debug, Clone, Copy)]
pub struct ReportInputs<'a> {
    pub data_path: &'a Path,
    pub seed: u64,
    pub train_fraction: f64,
    pub histogram_bins: usize,
    pub living_area_threshold: f64,
    /// The full table with derived features, before splitting.
    pub full: &'a HousingData,
    /// The cleaned training partition.
    pub train: &'a HousingData,
    pub test: &'a HousingData,
    pub cleaning: &'a CleaningReport,
    pub outcomes: &'a [ModelOutcome],
}

/// Paths of every file the report wrote.
#[derive(Debug, Clone, Default)]
pub struct ReportArtifacts {
    pub report: PathBuf,
    pub metrics: PathBuf,
    pub plot_data: Vec<PathBuf>,
}

fn tsv_writer(path: &Path) -> Result<csv::Writer<fs::File>, csv::Error> {
    csv::WriterBuilder::new().delimiter(b'\t').from_path(path)
}

fn write_scatter(path: &Path, x: &[f64], y: &[f64]) -> Result<(), ReportError> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(["GrLivArea", "SalePrice"])?;
    for (a, b) in x.iter().zip(y) {
        writer.write_record([a.to_string(), b.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_histogram(path: &Path, bins: &[HistogramBin]) -> Result<(), ReportError> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(["lower", "upper", "count"])?;
    for bin in bins {
        writer.write_record([
            format!("{:.6}", bin.lower),
            format!("{:.6}", bin.upper),
            bin.count.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_boxplot(path: &Path, groups: &BTreeMap<i64, FiveNumberSummary>) -> Result<(), ReportError> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(["OverallQual", "min", "q1", "median", "q3", "max"])?;
    for (quality, s) in groups {
        writer.write_record([
            quality.to_string(),
            s.min.to_string(),
            s.q1.to_string(),
            s.median.to_string(),
            s.q3.to_string(),
            s.max.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_predictions(path: &Path, records: &[PredictionRecord]) -> Result<(), ReportError> {
    let mut writer = tsv_writer(path)?;
    writer.write_record([
        "id",
        "predicted_log_price",
        "predicted_price",
        "actual_price",
        "residual",
    ])?;
    for r in records {
        writer.write_record([
            r.id.clone(),
            format!("{:.6}", r.predicted_log_price),
            format!("{:.2}", r.predicted_price),
            format!("{:.2}", r.actual_price),
            format!("{:.2}", r.residual),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_residuals(path: &Path, records: &[PredictionRecord]) -> Result<(), ReportError> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(["predicted_price", "residual"])?;
    for r in records {
        writer.write_record([format!("{:.2}", r.predicted_price), format!("{:.2}", r.residual)])?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the key-value metrics table: one row per model.
pub fn write_metrics(path: &Path, outcomes: &[ModelOutcome]) -> Result<(), ReportError> {
    let mut writer = tsv_writer(path)?;
    writer.write_record(["model", "rmse", "mae", "r2"])?;
    for outcome in outcomes {
        let m = &outcome.evaluation.metrics;
        writer.write_record([
            outcome.model.spec.label().to_string(),
            format!("{:.4}", m.rmse),
            format!("{:.4}", m.mae),
            format!("{:.6}", m.r_squared),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn boxplot_groups(quality: &[f64], price: &[f64]) -> BTreeMap<i64, FiveNumberSummary> {
    let grouped = quality
        .iter()
        .zip(price)
        .map(|(&q, &p)| (q.round() as i64, p))
        .into_group_map();
    grouped
        .into_iter()
        .filter_map(|(q, prices)| FiveNumberSummary::from_values(&prices).map(|s| (q, s)))
        .collect()
}

fn format_p(p: f64) -> String {
    if p < 1e-4 {
        "< 1e-4".to_string()
    } else {
        format!("{p:.4}")
    }
}

fn render_coefficients(out: &mut String, model: &TrainedModel) -> Result<(), std::fmt::Error> {
    writeln!(out, "| Term | Estimate | Std. Error | t value | Pr(>\\|t\\|) |")?;
    writeln!(out, "|---|---:|---:|---:|---:|")?;
    for c in &model.coefficients {
        writeln!(
            out,
            "| {} | {:.6} | {:.6} | {:.3} | {} |",
            c.term,
            c.estimate,
            c.std_error,
            c.t_value,
            format_p(c.p_value)
        )?;
    }
    let fit = &model.fit;
    writeln!(out)?;
    writeln!(
        out,
        "Residual standard error {:.4} on {} degrees of freedom; R² = {:.4}, adjusted R² = {:.4} (training rows: {}).",
        fit.residual_std_error, fit.df_residual, fit.r_squared, fit.adj_r_squared, fit.n_obs
    )?;
    Ok(())
}

fn numeric_columns(data: &HousingData) -> Vec<(&'static str, Vec<f64>)> {
    let mut columns = vec![
        ("OverallQual", data.overall_qual.to_vec()),
        ("GrLivArea", data.gr_liv_area.to_vec()),
        ("GarageCars", data.garage_cars.to_vec()),
        ("FullBath", data.full_bath.to_vec()),
        ("HalfBath", data.half_bath.to_vec()),
    ];
    if let Some(composite) = &data.bath_composite {
        columns.push(("BathComposite", composite.to_vec()));
    }
    columns
}

/// Writes every plot-data file and `report.md` into `output_dir`.
pub fn write_report(
    inputs: &ReportInputs<'_>,
    output_dir: &Path,
) -> Result<ReportArtifacts, ReportError> {
    fs::create_dir_all(output_dir)?;
    let full = inputs.full;
    let price = full
        .sale_price
        .as_ref()
        .ok_or(ReportError::MissingSalePrice("full"))?
        .to_vec();
    let log_price = full
        .log_price
        .as_ref()
        .ok_or(ReportError::MissingLogPrice("full"))?
        .to_vec();
    let area = full.gr_liv_area.to_vec();

    let mut artifacts = ReportArtifacts::default();
    let mut plot_file = |name: String| {
        let path = output_dir.join(name);
        artifacts.plot_data.push(path.clone());
        path
    };

    // --- Figure data ---
    write_scatter(&plot_file(SCATTER_FILE.to_string()), &area, &price)?;
    let scatter_line = stats::simple_linear_fit(&area, &price);

    let price_bins = stats::histogram(&price, inputs.histogram_bins);
    write_histogram(&plot_file(PRICE_HISTOGRAM_FILE.to_string()), &price_bins)?;
    let log_bins = stats::histogram(&log_price, inputs.histogram_bins);
    write_histogram(&plot_file(LOG_PRICE_HISTOGRAM_FILE.to_string()), &log_bins)?;

    let groups = boxplot_groups(&full.overall_qual.to_vec(), &price);
    write_boxplot(&plot_file(BOXPLOT_FILE.to_string()), &groups)?;

    for outcome in inputs.outcomes {
        let label = outcome.model.spec.label();
        write_residuals(
            &plot_file(format!("residuals_{label}.tsv")),
            &outcome.evaluation.records,
        )?;
        write_predictions(
            &plot_file(format!("predictions_{label}.tsv")),
            &outcome.evaluation.records,
        )?;
    }

    let metrics_path = output_dir.join(METRICS_FILE);
    write_metrics(&metrics_path, inputs.outcomes)?;

    // --- Narrative ---
    let mut out = String::new();
    writeln!(out, "# Sale price analysis")?;
    writeln!(out)?;
    writeln!(
        out,
        "Source: `{}` with {} sale records. Rows were split {:.0}/{:.0} into training and test sets with seed {}.",
        inputs.data_path.display(),
        full.n_rows(),
        inputs.train_fraction * 100.0,
        (1.0 - inputs.train_fraction) * 100.0,
        inputs.seed
    )?;
    writeln!(out)?;

    writeln!(out, "## Descriptive statistics")?;
    writeln!(out)?;
    writeln!(out, "| Column | n | Mean | Std. Dev. | Min | Median | Max |")?;
    writeln!(out, "|---|---:|---:|---:|---:|---:|---:|")?;
    let mut described = numeric_columns(full);
    described.push(("SalePrice", price.clone()));
    described.push(("LogPrice", log_price.clone()));
    for (name, values) in &described {
        if let Some(s) = FiveNumberSummary::from_values(values) {
            writeln!(
                out,
                "| {} | {} | {:.3} | {:.3} | {:.3} | {:.3} | {:.3} |",
                name,
                values.len(),
                stats::mean(values).unwrap_or(f64::NAN),
                stats::variance(values).map_or(f64::NAN, f64::sqrt),
                s.min,
                s.median,
                s.max
            )?;
        }
    }
    writeln!(out)?;

    writeln!(out, "## Correlation with price")?;
    writeln!(out)?;
    writeln!(out, "| Predictor | r(SalePrice) | r(LogPrice) |")?;
    writeln!(out, "|---|---:|---:|")?;
    for (name, values) in numeric_columns(full) {
        let fmt_r = |r: Option<f64>| r.map_or_else(|| "n/a".to_string(), |r| format!("{r:.3}"));
        writeln!(
            out,
            "| {} | {} | {} |",
            name,
            fmt_r(stats::pearson(&values, &price)),
            fmt_r(stats::pearson(&values, &log_price))
        )?;
    }
    writeln!(out)?;

    writeln!(out, "## Figures")?;
    writeln!(out)?;
    match scatter_line {
        Some((intercept, slope)) => writeln!(
            out,
            "- Sale price against living area (`{SCATTER_FILE}`), fitted line: SalePrice = {intercept:.1} + {slope:.3} × GrLivArea."
        )?,
        None => writeln!(out, "- Sale price against living area (`{SCATTER_FILE}`).")?,
    }
    writeln!(
        out,
        "- Histograms of SalePrice (`{PRICE_HISTOGRAM_FILE}`) and LogPrice (`{LOG_PRICE_HISTOGRAM_FILE}`), {} bins each.",
        inputs.histogram_bins
    )?;
    writeln!(
        out,
        "- Box plot of SalePrice by OverallQual (`{BOXPLOT_FILE}`):"
    )?;
    writeln!(out)?;
    writeln!(out, "| OverallQual | Min | Q1 | Median | Q3 | Max |")?;
    writeln!(out, "|---:|---:|---:|---:|---:|---:|")?;
    for (quality, s) in &groups {
        writeln!(
            out,
            "| {} | {:.0} | {:.0} | {:.0} | {:.0} | {:.0} |",
            quality, s.min, s.q1, s.median, s.q3, s.max
        )?;
    }
    writeln!(out)?;

    writeln!(out, "## Cleaning")?;
    writeln!(out)?;
    let c = inputs.cleaning;
    writeln!(
        out,
        "The training partition held {} rows; {} with GrLivArea at or above {} were removed, leaving {}. \
         {} missing `{}` values were replaced by the training median {:.2}. The test partition ({} rows) was not cleaned.",
        c.rows_before,
        c.rows_removed,
        inputs.living_area_threshold,
        c.rows_after,
        c.imputed_cells,
        c.impute_column,
        c.impute_median,
        inputs.test.n_rows()
    )?;
    writeln!(out)?;

    writeln!(out, "## Models")?;
    for outcome in inputs.outcomes {
        writeln!(out)?;
        writeln!(
            out,
            "### {} model: `{}`",
            capitalize(outcome.model.spec.label()),
            outcome.model.spec
        )?;
        writeln!(out)?;
        writeln!(
            out,
            "Reference neighborhood: `{}`.",
            outcome.model.encoding.reference_level()
        )?;
        writeln!(out)?;
        render_coefficients(&mut out, &outcome.model)?;
    }
    writeln!(out)?;

    writeln!(out, "## Evaluation on the test set")?;
    writeln!(out)?;
    writeln!(
        out,
        "Predictions are exponentiated back to dollars before comparison with the observed price."
    )?;
    writeln!(out)?;
    writeln!(out, "| Model | n | RMSE | MAE | R² |")?;
    writeln!(out, "|---|---:|---:|---:|---:|")?;
    for outcome in inputs.outcomes {
        let m = &outcome.evaluation.metrics;
        writeln!(
            out,
            "| {} | {} | {:.2} | {:.2} | {:.4} |",
            outcome.model.spec.label(),
            m.n,
            m.rmse,
            m.mae,
            m.r_squared
        )?;
    }
    if let Some(best) = inputs
        .outcomes
        .iter()
        .min_by(|a, b| a.evaluation.metrics.rmse.total_cmp(&b.evaluation.metrics.rmse))
    {
        writeln!(out)?;
        writeln!(
            out,
            "Lowest test RMSE: {} model. Residuals against predicted price are in `residuals_<model>.tsv`.",
            best.model.spec.label()
        )?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "Training rows after cleaning: {}. Extended-model composite: BathComposite = FullBath + 0.5 × HalfBath.",
        inputs.train.n_rows()
    )?;

    let report_path = output_dir.join(REPORT_FILE);
    fs::write(&report_path, out)?;
    log::info!("Report written to '{}'.", report_path.display());

    artifacts.report = report_path;
    artifacts.metrics = metrics_path;
    Ok(artifacts)
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
