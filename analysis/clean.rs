//! Train-partition cleaning: living-area outlier trim followed by median imputation.
//!
//! Every statistic is computed from the training rows that survive the trim, never
//! from the full table or the test partition.

use crate::data::HousingData;
use crate::stats;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CleaningConfig {
    /// Rows with `GrLivArea` at or above this value are dropped.
    pub living_area_threshold: f64,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            living_area_threshold: 4000.0,
        }
    }
}

/// What cleaning did to the training partition, for the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub rows_removed: usize,
    pub impute_column: String,
    pub imputed_cells: usize,
    pub impute_median: f64,
}

#[derive(Error, Debug, PartialEq)]
pub enum CleanError {
    #[error("Every training row has GrLivArea >= {threshold}; nothing is left to fit.")]
    EmptyAfterTrim { threshold: f64 },
    #[error("Column '{0}' has no observed values in the training partition; its median is undefined.")]
    NoObservedValues(String),
}

/// Applies the outlier trim and median imputation to the training partition.
pub fn clean_training_set(
    train: &HousingData,
    config: &CleaningConfig,
) -> Result<(HousingData, CleaningReport), CleanError> {
    let rows_before = train.n_rows();
    let threshold = config.living_area_threshold;

    let mut cleaned = train.retain_rows(|i| train.gr_liv_area[i] < threshold);
    let rows_after = cleaned.n_rows();
    if rows_after == 0 {
        return Err(CleanError::EmptyAfterTrim { threshold });
    }
    log::info!(
        "Removed {} training rows with GrLivArea >= {}.",
        rows_before - rows_after,
        threshold
    );

    let observed: Vec<f64> = cleaned.impute.values.iter().flatten().copied().collect();
    let median = stats::median(&observed)
        .ok_or_else(|| CleanError::NoObservedValues(cleaned.impute.name.clone()))?;

    let mut imputed_cells = 0;
    for value in cleaned.impute.values.iter_mut() {
        if value.is_none() {
            *value = Some(median);
            imputed_cells += 1;
        }
    }
    log::info!(
        "Imputed {} missing '{}' values with the training median {:.3}.",
        imputed_cells,
        cleaned.impute.name,
        median
    );

    let report = CleaningReport {
        rows_before,
        rows_after,
        rows_removed: rows_before - rows_after,
        impute_column: cleaned.impute.name.clone(),
        imputed_cells,
        impute_median: median,
    };
    Ok((cleaned, report))
}
