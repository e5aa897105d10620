//! Penalised least squares.
//!
//! Solves
//!
//! ```text
//! minimize ||y - Xβ||² + Σ λ_j β_j²
//! ```
//!
//! through the normal equations `(XᵀX + Λ) β = Xᵀy` with a Cholesky
//! factorisation. The inverse of `XᵀX + Λ` is kept: scaled by the residual
//! variance it is the posterior covariance of β, which drives the width of
//! the prediction intervals.

use nalgebra::{DMatrix, DVector};

use super::error::{ForecastError, ForecastResult};

/// Added to every diagonal entry so unpenalised columns stay positive definite.
const JITTER: f64 = 1e-9;

#[derive(Debug, Clone)]
pub(crate) struct RidgeFit {
    pub beta: DVector<f64>,
    /// `(XᵀX + Λ)⁻¹`
    pub covariance: DMatrix<f64>,
    /// Residual sum of squares over the residual degrees of freedom.
    pub residual_variance: f64,
}

pub(crate) fn ridge(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    penalties: &DVector<f64>,
) -> ForecastResult<RidgeFit> {
    let xt = x.transpose();
    let gram = &xt * x;

    let mut a = gram.clone();
    for (j, lambda) in penalties.iter().enumerate() {
        a[(j, j)] += lambda + JITTER;
    }

    let chol = a.cholesky().ok_or(ForecastError::SingularDesign)?;
    let beta = chol.solve(&(&xt * y));
    if !beta.iter().all(|v| v.is_finite()) {
        return Err(ForecastError::NonFinite);
    }
    let covariance = chol.inverse();

    let residuals = y - x * &beta;
    let rss = residuals.norm_squared();
    // Effective degrees of freedom of a ridge fit: tr(X (XᵀX + Λ)⁻¹ Xᵀ)
    let edf = (&covariance * &gram).trace();
    let dof = (x.nrows() as f64 - edf).max(1.0);

    Ok(RidgeFit {
        beta,
        covariance,
        residual_variance: rss / dof,
    })
}
