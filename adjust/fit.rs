//! # Linear Model Fitting
//!
//! The adjustment pipeline regresses the phenotype score on the predictors and
//! only ever needs the point estimates of that fit. The fit sits behind the
//! [`LinearModelFitter`] trait so callers can substitute their own solver, or a
//! stub in tests, without touching the rest of the pipeline.
//!
//! The default [`LeastSquaresFitter`] solves ordinary least squares with a thin
//! QR decomposition of the design `[1, x_1, ..., x_k]`. With every observation
//! treated as independent this matches an identity-link Gaussian fit.
//!
//! Each design column is scaled to unit Euclidean norm before the
//! decomposition and the coefficients are scaled back afterwards. The rank
//! check on `R` therefore does not depend on the units a covariate is
//! recorded in.

use crate::types::Coefficients;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use ndarray_linalg::QR;
use thiserror::Error;

/// Tolerance on the diagonal of `R` for the unit-norm design, below which a
/// column is treated as linearly dependent on the columns before it.
pub const DEFAULT_RANK_TOLERANCE: f64 = 1e-10;

/// A comprehensive error type for failures of the regression fit.
#[derive(Error, Debug)]
pub enum FitError {
    #[error(
        "Predictor {index} has {found} observations, but the response has {expected}."
    )]
    PredictorLengthMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("Cannot estimate {columns} coefficients from only {observations} observations.")]
    InsufficientObservations { observations: usize, columns: usize },

    #[error(
        "The design matrix is rank-deficient: column {column} is linearly dependent on the preceding columns (|R[{column},{column}]| = {diagonal:.3e})."
    )]
    RankDeficient { column: usize, diagonal: f64 },

    #[error("The design matrix contains non-finite values in column {column}.")]
    NonFiniteDesign { column: usize },

    #[error("QR decomposition of the design matrix failed: {0}")]
    LinalgError(#[from] ndarray_linalg::error::LinalgError),
}

/// Fits a linear model of `response` on an intercept plus `predictors` and
/// returns the coefficient vector `[intercept, b_1, ..., b_k]`.
pub trait LinearModelFitter {
    fn fit(
        &self,
        response: ArrayView1<f64>,
        predictors: &[ArrayView1<f64>],
    ) -> Result<Coefficients, FitError>;
}

/// Ordinary least squares through a thin QR decomposition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeastSquaresFitter {
    pub rank_tolerance: f64,
}

impl Default for LeastSquaresFitter {
    fn default() -> Self {
        Self {
            rank_tolerance: DEFAULT_RANK_TOLERANCE,
        }
    }
}

impl LinearModelFitter for LeastSquaresFitter {
    fn fit(
        &self,
        response: ArrayView1<f64>,
        predictors: &[ArrayView1<f64>],
    ) -> Result<Coefficients, FitError> {
        let design = build_design_matrix(response.len(), predictors)?;
        let (n, k) = design.dim();
        if n < k {
            return Err(FitError::InsufficientObservations {
                observations: n,
                columns: k,
            });
        }

        let (design, column_norms) = internal::equilibrate(design)?;
        let (q, r) = design.qr()?;
        check_full_rank(r.view(), self.rank_tolerance)?;

        // beta = D^-1 R^-1 Q' y, with D the column norms
        let qty = q.t().dot(&response);
        let beta = internal::back_substitute(r.view(), qty.view()) / &column_norms;

        log::debug!("Least-squares fit on {} observations: {:?}", n, beta);
        Ok(Coefficients::new(beta))
    }
}

/// Builds the `n x (k + 1)` design matrix with a leading intercept column.
pub fn build_design_matrix(
    n: usize,
    predictors: &[ArrayView1<f64>],
) -> Result<Array2<f64>, FitError> {
    let mut design = Array2::<f64>::ones((n, predictors.len() + 1));
    for (index, predictor) in predictors.iter().enumerate() {
        if predictor.len() != n {
            return Err(FitError::PredictorLengthMismatch {
                index,
                expected: n,
                found: predictor.len(),
            });
        }
        design.column_mut(index + 1).assign(predictor);
    }
    Ok(design)
}

fn check_full_rank(r: ArrayView2<f64>, tolerance: f64) -> Result<(), FitError> {
    let diagonal = r.diag();
    if let Some(column) = diagonal.iter().position(|d| !d.is_finite()) {
        return Err(FitError::NonFiniteDesign { column });
    }

    for (column, &d) in diagonal.iter().enumerate() {
        if d.abs() <= tolerance {
            return Err(FitError::RankDeficient {
                column,
                diagonal: d.abs(),
            });
        }
    }
    Ok(())
}

/// Internal module for implementation details not exposed in the public API.
mod internal {
    use super::*;

    /// Scales every column of `design` to unit norm and returns the norms.
    /// A column of zeros has no direction and is reported as rank-deficient.
    pub(super) fn equilibrate(
        mut design: Array2<f64>,
    ) -> Result<(Array2<f64>, Array1<f64>), FitError> {
        let mut norms = Array1::<f64>::zeros(design.ncols());
        for (column, mut values) in design.columns_mut().into_iter().enumerate() {
            if values.iter().any(|v| !v.is_finite()) {
                return Err(FitError::NonFiniteDesign { column });
            }
            let norm = values.dot(&values).sqrt();
            if norm == 0.0 {
                return Err(FitError::RankDeficient {
                    column,
                    diagonal: 0.0,
                });
            }
            values /= norm;
            norms[column] = norm;
        }
        Ok((design, norms))
    }

    /// Solves `R x = b` for upper-triangular `R` with a non-zero diagonal.
    pub(super) fn back_substitute(r: ArrayView2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
        let k = r.ncols();
        let mut x = Array1::<f64>::zeros(k);
        for i in (0..k).rev() {
            let mut acc = b[i];
            for j in (i + 1)..k {
                acc -= r[[i, j]] * x[j];
            }
            x[i] = acc / r[[i, i]];
        }
        x
    }
}
