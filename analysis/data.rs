//! # Data Loading and Validation Module
//!
//! This module is the exclusive entry point for the housing sale table. It reads a
//! comma-separated file, validates it against a fixed schema of property attributes,
//! and produces the column-oriented `HousingData` structure consumed by the rest of
//! the analysis.
//!
//! - Strict Schema: Column names follow the Ames sale records (`OverallQual`,
//!   `GrLivArea`, `GarageCars`, `FullBath`, `HalfBath`, `Neighborhood`, `SalePrice`).
//!   Only the name of the imputation column is configurable.
//! - Fail Fast: An absent input file is reported before any parsing is attempted.
//! - User-Centric Errors: The `DataError` enum is designed to point at the exact
//!   column and problem so the input can be repaired.

use ndarray::{Array1, Axis};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

pub const COL_ID: &str = "Id";
pub const COL_OVERALL_QUAL: &str = "OverallQual";
pub const COL_GR_LIV_AREA: &str = "GrLivArea";
pub const COL_GARAGE_CARS: &str = "GarageCars";
pub const COL_FULL_BATH: &str = "FullBath";
pub const COL_HALF_BATH: &str = "HalfBath";
pub const COL_NEIGHBORHOOD: &str = "Neighborhood";
pub const COL_SALE_PRICE: &str = "SalePrice";

/// Numeric predictor columns that must be complete in every input file.
pub const NUMERIC_PREDICTOR_COLUMNS: [&str; 5] = [
    COL_OVERALL_QUAL,
    COL_GR_LIV_AREA,
    COL_GARAGE_CARS,
    COL_FULL_BATH,
    COL_HALF_BATH,
];

/// A nullable numeric column whose missing cells are filled during cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct ImputeColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl ImputeColumn {
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }
}

/// Column-oriented view of the sale records.
///
/// All vectors share the same length. `sale_price` is absent only for tables loaded
/// for prediction. The derived columns stay `None` until feature engineering runs.
#[derive(Debug, Clone)]
pub struct HousingData {
    /// Row identifiers, from the `Id` column or generated 1-based.
    pub ids: Vec<String>,
    pub overall_qual: Array1<f64>,
    pub gr_liv_area: Array1<f64>,
    pub garage_cars: Array1<f64>,
    pub full_bath: Array1<f64>,
    pub half_bath: Array1<f64>,
    pub neighborhood: Vec<String>,
    pub sale_price: Option<Array1<f64>>,
    pub impute: ImputeColumn,
    /// `ln(SalePrice)`, the regression target.
    pub log_price: Option<Array1<f64>>,
    /// `FullBath + 0.5 * HalfBath`.
    pub bath_composite: Option<Array1<f64>>,
}

impl HousingData {
    pub fn n_rows(&self) -> usize {
        self.ids.len()
    }

    /// Materializes the rows at `indices`, in the given order.
    pub fn subset(&self, indices: &[usize]) -> HousingData {
        let pick = |a: &Array1<f64>| a.select(Axis(0), indices);
        let pick_vec = |v: &[String]| indices.iter().map(|&i| v[i].clone()).collect();
        HousingData {
            ids: pick_vec(&self.ids),
            overall_qual: pick(&self.overall_qual),
            gr_liv_area: pick(&self.gr_liv_area),
            garage_cars: pick(&self.garage_cars),
            full_bath: pick(&self.full_bath),
            half_bath: pick(&self.half_bath),
            neighborhood: pick_vec(&self.neighborhood),
            sale_price: self.sale_price.as_ref().map(pick),
            impute: ImputeColumn {
                name: self.impute.name.clone(),
                values: indices.iter().map(|&i| self.impute.values[i]).collect(),
            },
            log_price: self.log_price.as_ref().map(pick),
            bath_composite: self.bath_composite.as_ref().map(pick),
        }
    }

    /// Keeps only the rows for which `keep` returns true.
    pub fn retain_rows<F>(&self, keep: F) -> HousingData
    where
        F: Fn(usize) -> bool,
    {
        let indices: Vec<usize> = (0..self.n_rows()).filter(|&i| keep(i)).collect();
        self.subset(&indices)
    }
}

/// A comprehensive error type for all data loading and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Input file '{0}' does not exist. Place the sale records at this path and rerun.")]
    FileNotFound(String),
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The required column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the required column '{0}'. Only the imputation column may contain missing values."
    )]
    MissingValuesFound(String),
    #[error("Input file contains only {found} data rows, but at least {required} are required.")]
    InsufficientRows { found: usize, required: usize },
    #[error(
        "Non-finite values (NaN or Infinity) were found in the required column '{0}'. All predictor and price values must be finite."
    )]
    NonFiniteValuesFound(String),
}

/// Loads and validates the full sale table, including `SalePrice`.
pub fn load_housing_data(path: &Path, impute_column: &str) -> Result<HousingData, DataError> {
    internal::load_data(path, impute_column, true)
}

/// Loads a table for prediction. `SalePrice` is read when present but not required.
pub fn load_prediction_data(path: &Path, impute_column: &str) -> Result<HousingData, DataError> {
    internal::load_data(path, impute_column, false)
}

/// Internal module for shared data loading logic.
mod internal {
    use super::*;

    pub(super) const MINIMUM_ROWS: usize = 10;

    fn validate_is_finite(values: &[f64], column_name: &str) -> Result<(), DataError> {
        if values.iter().any(|&v| !v.is_finite()) {
            return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
        }
        Ok(())
    }

    fn cast_to_f64(df: &DataFrame, column_name: &str) -> Result<Column, DataError> {
        let series = df.column(column_name)?;
        let casted = series
            .cast(&DataType::Float64)
            .map_err(|_| DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "f64 (numeric)",
                found_type: format!("{:?}", series.dtype()),
            })?;

        // Non-strict casts turn unparseable text into nulls; more nulls after the cast
        // than before means the column holds non-numeric data.
        if casted.null_count() > series.null_count() {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "f64 (numeric)",
                found_type: format!("{:?}", series.dtype()),
            });
        }
        Ok(casted)
    }

    fn extract_numeric_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
        if df.column(column_name)?.null_count() > 0 {
            return Err(DataError::MissingValuesFound(column_name.to_string()));
        }
        let casted = cast_to_f64(df, column_name)?;
        let chunked = casted.f64()?.rechunk();
        let values: Vec<f64> = chunked.into_no_null_iter().collect();
        validate_is_finite(&values, column_name)?;
        Ok(values)
    }

    fn extract_nullable_column(
        df: &DataFrame,
        column_name: &str,
    ) -> Result<Vec<Option<f64>>, DataError> {
        let casted = cast_to_f64(df, column_name)?;
        let values = casted
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        Ok(values)
    }

    fn extract_string_column(df: &DataFrame, column_name: &str) -> Result<Vec<String>, DataError> {
        let series = df.column(column_name)?;
        if series.null_count() > 0 {
            return Err(DataError::MissingValuesFound(column_name.to_string()));
        }
        let casted = series.cast(&DataType::String)?;
        let mut values = Vec::with_capacity(casted.len());
        for value in casted.str()?.into_iter() {
            match value.map(str::trim) {
                Some(text) if !text.is_empty() => values.push(text.to_string()),
                _ => return Err(DataError::MissingValuesFound(column_name.to_string())),
            }
        }
        Ok(values)
    }

    fn build_ids(df: &DataFrame, has_ids: bool, n: usize) -> Result<Vec<String>, DataError> {
        if !has_ids {
            return Ok((1..=n).map(|i| i.to_string()).collect());
        }
        let casted = df.column(COL_ID)?.cast(&DataType::String)?;
        let ids = casted
            .str()?
            .into_iter()
            .enumerate()
            .map(|(i, value)| match value {
                Some(text) if !text.is_empty() => text.to_string(),
                _ => (i + 1).to_string(),
            })
            .collect();
        Ok(ids)
    }

    pub(super) fn load_data(
        path: &Path,
        impute_column: &str,
        require_price: bool,
    ) -> Result<HousingData, DataError> {
        if !path.exists() {
            return Err(DataError::FileNotFound(path.display().to_string()));
        }

        let mut required_cols: Vec<&str> = NUMERIC_PREDICTOR_COLUMNS.to_vec();
        required_cols.push(COL_NEIGHBORHOOD);
        if require_price {
            required_cols.push(COL_SALE_PRICE);
        }

        log::info!("Loading sale records from '{}'", path.display());

        let df = CsvReader::new(File::open(path)?)
            .with_options(
                CsvReadOptions::default()
                    .with_has_header(true)
                    .with_infer_schema_length(None)
                    .with_parse_options(
                        CsvParseOptions::default()
                            .with_separator(b',')
                            .with_null_values(Some(NullValues::AllColumnsSingle("NA".into()))),
                    ),
            )
            .finish()?;

        // Fitting needs a real table; scoring needs at least one house.
        let required_rows = if require_price { MINIMUM_ROWS } else { 1 };
        if df.height() < required_rows {
            return Err(DataError::InsufficientRows {
                found: df.height(),
                required: required_rows,
            });
        }

        let columns_set: HashSet<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        for col_name in &required_cols {
            if !columns_set.contains(*col_name) {
                return Err(DataError::ColumnNotFound(col_name.to_string()));
            }
        }
        log::debug!("All required columns found: {required_cols:?}");

        let numeric = |name: &str| extract_numeric_column(&df, name).map(Array1::from_vec);
        let overall_qual = numeric(COL_OVERALL_QUAL)?;
        let gr_liv_area = numeric(COL_GR_LIV_AREA)?;
        let garage_cars = numeric(COL_GARAGE_CARS)?;
        let full_bath = numeric(COL_FULL_BATH)?;
        let half_bath = numeric(COL_HALF_BATH)?;

        let neighborhood = extract_string_column(&df, COL_NEIGHBORHOOD)?;

        let sale_price = if require_price || columns_set.contains(COL_SALE_PRICE) {
            Some(Array1::from_vec(extract_numeric_column(&df, COL_SALE_PRICE)?))
        } else {
            None
        };

        let impute_values = if columns_set.contains(impute_column) {
            extract_nullable_column(&df, impute_column)?
        } else {
            log::warn!(
                "Imputation column '{impute_column}' is absent; every value will be treated as missing."
            );
            vec![None; df.height()]
        };

        let ids = build_ids(&df, columns_set.contains(COL_ID), df.height())?;

        let data = HousingData {
            ids,
            overall_qual,
            gr_liv_area,
            garage_cars,
            full_bath,
            half_bath,
            neighborhood,
            sale_price,
            impute: ImputeColumn {
                name: impute_column.to_string(),
                values: impute_values,
            },
            log_price: None,
            bath_composite: None,
        };

        log::info!(
            "Loaded {} rows; {} missing values in '{}'.",
            data.n_rows(),
            data.impute.missing_count(),
            impute_column
        );
        Ok(data)
    }
}
