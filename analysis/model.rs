//! The fitted model artifact and its TOML persistence.

use crate::data::HousingData;
use crate::design::{self, DesignError, ModelSpec, NeighborhoodEncoding};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

// --- Public Data Structures ---
// These structs define the human-readable format of a fitted model when
// serialized to a TOML file.

/// One row of the coefficient table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub term: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_value: f64,
    pub p_value: f64,
}

/// Goodness-of-fit statistics on the training partition, on the log-price scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub n_obs: usize,
    pub n_params: usize,
    pub df_residual: usize,
    pub residual_sum_of_squares: f64,
    pub residual_std_error: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
}

/// The self-contained, fitted model artifact. This is the structure that gets saved
/// to and loaded from a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub spec: ModelSpec,
    /// Level ordering fixed at fit time; required to rebuild indicator columns.
    pub encoding: NeighborhoodEncoding,
    /// Coefficients in canonical design-matrix order.
    pub coefficients: Vec<Coefficient>,
    pub fit: FitSummary,
}

/// Custom error type for model loading, saving, and prediction.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read or write model file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML model file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize model to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Could not build the prediction design matrix: {0}")]
    DesignError(#[from] DesignError),
    #[error(
        "Model has {found} coefficients but its predictor set implies {expected}. The model file may be corrupted."
    )]
    MismatchedCoefficientCount { found: usize, expected: usize },
}

impl TrainedModel {
    pub fn estimates(&self) -> Array1<f64> {
        self.coefficients.iter().map(|c| c.estimate).collect()
    }

    /// Looks up a coefficient estimate by term name.
    pub fn coefficient(&self, term: &str) -> Option<f64> {
        self.coefficients
            .iter()
            .find(|c| c.term == term)
            .map(|c| c.estimate)
    }

    /// Predicted `ln(SalePrice)` for every row of `data`.
    ///
    /// The derived columns the predictor set needs (`BathComposite` for the extended
    /// model) must already be present on `data`.
    pub fn predict_log(&self, data: &HousingData) -> Result<Array1<f64>, ModelError> {
        let expected = design::term_names(self.spec, &self.encoding).len();
        if self.coefficients.len() != expected {
            return Err(ModelError::MismatchedCoefficientCount {
                found: self.coefficients.len(),
                expected,
            });
        }
        let design = design::build_design_matrix(data, self.spec, &self.encoding)?;
        Ok(design.x.dot(&self.estimates()))
    }

    /// Predicted sale price: the exponential of the log-scale prediction.
    pub fn predict_price(&self, data: &HousingData) -> Result<Array1<f64>, ModelError> {
        Ok(self.predict_log(data)?.mapv(f64::exp))
    }

    /// Saves the model in a human-readable TOML format.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Loads a model from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        let model = toml::from_str(&toml_string)?;
        Ok(model)
    }
}
