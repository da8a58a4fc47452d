//! # Design Matrix Construction
//!
//! Turns a `HousingData` table into the dense matrix `X` used by the least-squares
//! fit. Columns follow a strict canonical order, which is the contract that lets a
//! flat coefficient vector be mapped back to named terms:
//!
//! 1. the intercept,
//! 2. numeric predictors in the order listed by the `ModelSpec`,
//! 3. one indicator per non-reference neighborhood level, in level order.
//!
//! Neighborhood levels are those observed in the training rows, sorted with
//! case-insensitive natural ordering. The first level is the reference and gets
//! no column.

use crate::data::HousingData;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub const INTERCEPT_TERM: &str = "(Intercept)";

/// A numeric column entered into the model as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericPredictor {
    OverallQual,
    GrLivArea,
    GarageCars,
    BathComposite,
}

impl NumericPredictor {
    pub fn name(&self) -> &'static str {
        match self {
            NumericPredictor::OverallQual => "OverallQual",
            NumericPredictor::GrLivArea => "GrLivArea",
            NumericPredictor::GarageCars => "GarageCars",
            NumericPredictor::BathComposite => "BathComposite",
        }
    }

    fn column<'a>(&self, data: &'a HousingData) -> Result<ArrayView1<'a, f64>, DesignError> {
        match self {
            NumericPredictor::OverallQual => Ok(data.overall_qual.view()),
            NumericPredictor::GrLivArea => Ok(data.gr_liv_area.view()),
            NumericPredictor::GarageCars => Ok(data.garage_cars.view()),
            NumericPredictor::BathComposite => data
                .bath_composite
                .as_ref()
                .map(|a| a.view())
                .ok_or(DesignError::FeatureNotEngineered("BathComposite")),
        }
    }
}

/// The two predictor sets compared in the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelSpec {
    /// Quality, living area, garage capacity and neighborhood.
    Base,
    /// The base set plus the composite bathroom count.
    Extended,
}

impl ModelSpec {
    pub const ALL: [ModelSpec; 2] = [ModelSpec::Base, ModelSpec::Extended];

    pub fn numeric_predictors(&self) -> &'static [NumericPredictor] {
        match self {
            ModelSpec::Base => &[
                NumericPredictor::OverallQual,
                NumericPredictor::GrLivArea,
                NumericPredictor::GarageCars,
            ],
            ModelSpec::Extended => &[
                NumericPredictor::OverallQual,
                NumericPredictor::GrLivArea,
                NumericPredictor::GarageCars,
                NumericPredictor::BathComposite,
            ],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModelSpec::Base => "base",
            ModelSpec::Extended => "extended",
        }
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formula = self
            .numeric_predictors()
            .iter()
            .map(NumericPredictor::name)
            .chain(std::iter::once("Neighborhood"))
            .collect::<Vec<_>>()
            .join(" + ");
        write!(f, "LogPrice ~ {formula}")
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum DesignError {
    #[error("Derived feature '{0}' is missing; run feature engineering before building the design matrix.")]
    FeatureNotEngineered(&'static str),
    #[error("Cannot encode neighborhoods from an empty training set.")]
    NoLevels,
}

/// Treatment coding of the neighborhood factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodEncoding {
    /// All observed levels; `levels[0]` is the reference.
    pub levels: Vec<String>,
}

impl NeighborhoodEncoding {
    /// Collects the distinct levels and fixes their order.
    pub fn from_levels<'a, I>(observed: I) -> Result<Self, DesignError>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut levels: Vec<String> = observed.into_iter().cloned().collect();
        levels.sort_by(|a, b| natord::compare_ignore_case(a, b).then_with(|| a.cmp(b)));
        levels.dedup();
        if levels.is_empty() {
            return Err(DesignError::NoLevels);
        }
        Ok(Self { levels })
    }

    pub fn reference_level(&self) -> &str {
        &self.levels[0]
    }

    /// Levels that receive an indicator column.
    pub fn indicator_levels(&self) -> &[String] {
        &self.levels[1..]
    }

    fn indicator_index(&self) -> HashMap<&str, usize> {
        self.indicator_levels()
            .iter()
            .enumerate()
            .map(|(i, level)| (level.as_str(), i))
            .collect()
    }
}

/// Names of the design-matrix columns, in canonical order.
pub fn term_names(spec: ModelSpec, encoding: &NeighborhoodEncoding) -> Vec<String> {
    std::iter::once(INTERCEPT_TERM.to_string())
        .chain(spec.numeric_predictors().iter().map(|p| p.name().to_string()))
        .chain(
            encoding
                .indicator_levels()
                .iter()
                .map(|level| format!("Neighborhood[{level}]")),
        )
        .collect()
}

/// A built design matrix with bookkeeping about levels unknown to the encoding.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    pub x: Array2<f64>,
    /// Rows whose neighborhood was not among the encoding's levels. They are coded
    /// as the reference level.
    pub unseen_level_rows: usize,
}

pub fn build_design_matrix(
    data: &HousingData,
    spec: ModelSpec,
    encoding: &NeighborhoodEncoding,
) -> Result<DesignMatrix, DesignError> {
    let numeric = spec.numeric_predictors();
    let n = data.n_rows();
    let p = 1 + numeric.len() + encoding.indicator_levels().len();
    let offset = 1 + numeric.len();

    let mut x = Array2::<f64>::zeros((n, p));
    x.column_mut(0).fill(1.0);
    for (j, predictor) in numeric.iter().enumerate() {
        x.column_mut(1 + j).assign(&predictor.column(data)?);
    }

    let index = encoding.indicator_index();
    let mut unseen_level_rows = 0;
    for (row, level) in data.neighborhood.iter().enumerate() {
        if let Some(&k) = index.get(level.as_str()) {
            x[[row, offset + k]] = 1.0;
        } else if level != encoding.reference_level() {
            unseen_level_rows += 1;
        }
    }
    if unseen_level_rows > 0 {
        log::warn!(
            "{unseen_level_rows} rows have neighborhoods not seen in training; they are coded as the reference level '{}'.",
            encoding.reference_level()
        );
    }

    Ok(DesignMatrix {
        x,
        unseen_level_rows,
    })
}
