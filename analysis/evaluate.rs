//! Held-out evaluation on the raw price scale.
//!
//! Predictions come out of the model as `ln(price)` and are exponentiated before
//! any comparison with the observed `SalePrice`.

use crate::data::HousingData;
use crate::model::{ModelError, TrainedModel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Prediction failed: {0}")]
    ModelError(#[from] ModelError),
    #[error("The evaluation table has no SalePrice column.")]
    MissingActuals,
    #[error("Cannot compute metrics on an empty set of predictions.")]
    Empty,
    #[error("Got {actual} actual values but {predicted} predictions.")]
    LengthMismatch { actual: usize, predicted: usize },
}

/// One test row's prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: String,
    pub predicted_log_price: f64,
    pub predicted_price: f64,
    pub actual_price: f64,
    /// `actual_price - predicted_price`.
    pub residual: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r_squared: f64,
    pub n: usize,
}

impl RegressionMetrics {
    /// RMSE, MAE and R² of `predicted` against `actual`. R² is taken about the mean
    /// of `actual` and is 0 when `actual` has no spread.
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self, EvaluationError> {
        if actual.len() != predicted.len() {
            return Err(EvaluationError::LengthMismatch {
                actual: actual.len(),
                predicted: predicted.len(),
            });
        }
        if actual.is_empty() {
            return Err(EvaluationError::Empty);
        }

        let n = actual.len() as f64;
        let mean_actual = actual.iter().sum::<f64>() / n;
        let (mut ss_res, mut abs_sum, mut ss_tot) = (0.0, 0.0, 0.0);
        for (a, p) in actual.iter().zip(predicted) {
            let err = a - p;
            ss_res += err * err;
            abs_sum += err.abs();
            ss_tot += (a - mean_actual).powi(2);
        }

        Ok(Self {
            rmse: (ss_res / n).sqrt(),
            mae: abs_sum / n,
            r_squared: if ss_tot == 0.0 { 0.0 } else { 1.0 - ss_res / ss_tot },
            n: actual.len(),
        })
    }
}

/// Predictions and metrics for one model on one table.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub records: Vec<PredictionRecord>,
    pub metrics: RegressionMetrics,
}

/// Predicts every row of `test` and pairs it with the observed price.
pub fn predict_records(
    model: &TrainedModel,
    test: &HousingData,
) -> Result<Vec<PredictionRecord>, EvaluationError> {
    let actual = test
        .sale_price
        .as_ref()
        .ok_or(EvaluationError::MissingActuals)?;
    let log_pred = model.predict_log(test)?;

    let records = test
        .ids
        .iter()
        .zip(log_pred.iter().zip(actual.iter()))
        .map(|(id, (&log_p, &actual_price))| {
            let predicted_price = log_p.exp();
            PredictionRecord {
                id: id.clone(),
                predicted_log_price: log_p,
                predicted_price,
                actual_price,
                residual: actual_price - predicted_price,
            }
        })
        .collect();
    Ok(records)
}

pub fn evaluate_model(
    model: &TrainedModel,
    test: &HousingData,
) -> Result<Evaluation, EvaluationError> {
    let records = predict_records(model, test)?;
    let actual: Vec<f64> = records.iter().map(|r| r.actual_price).collect();
    let predicted: Vec<f64> = records.iter().map(|r| r.predicted_price).collect();
    let metrics = RegressionMetrics::compute(&actual, &predicted)?;
    log::info!(
        "{} model on {} test rows: RMSE = {:.2}, MAE = {:.2}, R² = {:.4}",
        model.spec.label(),
        metrics.n,
        metrics.rmse,
        metrics.mae,
        metrics.r_squared
    );
    Ok(Evaluation { records, metrics })
}
