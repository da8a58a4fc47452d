//! # Ordinary Least Squares Estimation
//!
//! Fits `LogPrice = X β + ε` over the training partition by solving the normal
//! equations `XᵀX β = Xᵀy` with a Cholesky factorization. The same factorization
//! provides `(XᵀX)⁻¹`, from which the classical standard errors
//! `SE(β_j) = sqrt(σ² [(XᵀX)⁻¹]_jj)` with `σ² = RSS / (n − p)` are derived.
//! Two-sided p-values use Student's t with `n − p` degrees of freedom.
//!
//! The fit is a single batch solve; there is no iterative refinement and no
//! online update.

use crate::data::HousingData;
use crate::design::{self, DesignError, ModelSpec, NeighborhoodEncoding};
use crate::model::{Coefficient, FitSummary, TrainedModel};
use crate::stats;

use ndarray::{Array1, ArrayView1, ArrayView2};
use ndarray_linalg::{FactorizeC, InverseC, SolveC, UPLO};
use thiserror::Error;

/// A comprehensive error type for the model estimation process.
#[derive(Error, Debug)]
pub enum EstimationError {
    #[error("Design matrix construction failed: {0}")]
    DesignError(#[from] DesignError),

    #[error("The training data has no LogPrice column; run feature engineering first.")]
    TargetMissing,

    #[error("A linear system solve failed. XᵀX may be singular (collinear predictors). Error: {0}")]
    LinearSystemSolveFailed(ndarray_linalg::error::LinalgError),

    #[error(
        "Only {n_obs} observations for {n_params} parameters; at least one residual degree of freedom is required."
    )]
    InsufficientDegreesOfFreedom { n_obs: usize, n_params: usize },
}

/// The raw result of a least-squares solve, before terms are named.
#[derive(Debug, Clone)]
pub struct OlsSolution {
    pub beta: Array1<f64>,
    pub std_errors: Array1<f64>,
    pub fitted: Array1<f64>,
    pub rss: f64,
    pub tss: f64,
    pub df_residual: usize,
}

/// Solves the normal equations for an arbitrary full-rank design.
pub fn solve_least_squares(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
) -> Result<OlsSolution, EstimationError> {
    let (n_obs, n_params) = x.dim();
    if n_obs <= n_params {
        return Err(EstimationError::InsufficientDegreesOfFreedom { n_obs, n_params });
    }

    let xtx = x.t().dot(&x);
    let xty = x.t().dot(&y);

    let factor = xtx
        .factorizec(UPLO::Lower)
        .map_err(EstimationError::LinearSystemSolveFailed)?;
    let beta = factor
        .solvec(&xty)
        .map_err(EstimationError::LinearSystemSolveFailed)?;
    let xtx_inv = factor
        .invc()
        .map_err(EstimationError::LinearSystemSolveFailed)?;

    let fitted = x.dot(&beta);
    let rss: f64 = y
        .iter()
        .zip(fitted.iter())
        .map(|(obs, fit)| (obs - fit).powi(2))
        .sum();
    let y_mean = y.mean().unwrap_or(0.0);
    let tss: f64 = y.iter().map(|obs| (obs - y_mean).powi(2)).sum();

    let df_residual = n_obs - n_params;
    let sigma2 = rss / df_residual as f64;
    let std_errors = xtx_inv.diag().mapv(|v| (sigma2 * v).max(0.0).sqrt());

    Ok(OlsSolution {
        beta,
        std_errors,
        fitted,
        rss,
        tss,
        df_residual,
    })
}

/// The main entry point for model fitting. Encodes neighborhoods from the training
/// rows, builds the design for `spec`, and solves.
pub fn fit_ols(train: &HousingData, spec: ModelSpec) -> Result<TrainedModel, EstimationError> {
    let y = train
        .log_price
        .as_ref()
        .ok_or(EstimationError::TargetMissing)?;

    let encoding = NeighborhoodEncoding::from_levels(&train.neighborhood)?;
    let design = design::build_design_matrix(train, spec, &encoding)?;
    let names = design::term_names(spec, &encoding);

    log::info!(
        "Fitting {} model ({}) on {} rows with {} parameters; reference neighborhood '{}'.",
        spec.label(),
        spec,
        train.n_rows(),
        names.len(),
        encoding.reference_level()
    );

    let solution = solve_least_squares(design.x.view(), y.view())?;
    let df = solution.df_residual as f64;

    let coefficients: Vec<Coefficient> = names
        .into_iter()
        .zip(solution.beta.iter().zip(solution.std_errors.iter()))
        .map(|(term, (&estimate, &std_error))| {
            let t_value = estimate / std_error;
            Coefficient {
                term,
                estimate,
                std_error,
                t_value,
                p_value: stats::student_t_two_sided_p(t_value, df),
            }
        })
        .collect();

    let n_obs = train.n_rows();
    let n_params = coefficients.len();
    let r_squared = if solution.tss > 0.0 {
        1.0 - solution.rss / solution.tss
    } else {
        0.0
    };
    // (n - 1) / (n - p), where p includes the intercept.
    let adj_r_squared = 1.0 - (1.0 - r_squared) * (n_obs as f64 - 1.0) / df;

    let fit = FitSummary {
        n_obs,
        n_params,
        df_residual: solution.df_residual,
        residual_sum_of_squares: solution.rss,
        residual_std_error: (solution.rss / df).sqrt(),
        r_squared,
        adj_r_squared,
    };
    log::info!(
        "{} model: R² = {:.4}, adjusted R² = {:.4}, residual SE = {:.4} on {} df.",
        spec.label(),
        fit.r_squared,
        fit.adj_r_squared,
        fit.residual_std_error,
        fit.df_residual
    );

    Ok(TrainedModel {
        spec,
        encoding,
        coefficients,
        fit,
    })
}
