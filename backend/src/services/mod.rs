//! Service layer: request validation and the forecasting pipelines.
//!
//! The HTTP handlers call into this layer with already-parsed JSON. Nothing
//! here knows about axum; every function is synchronous and is run on the
//! blocking thread pool by the caller.

pub mod demand;
pub mod pipeline;
pub mod plot;
pub mod regressors;
pub mod supplier;
pub mod validation;

pub use demand::forecast_demand;
pub use supplier::forecast_supplier_performance;

use thiserror::Error;

use crate::forecast::ForecastError;
use crate::models::SeriesError;

/// Failure of a forecasting request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// The request is well-formed JSON but its data cannot be used.
    #[error("{message}")]
    Invalid {
        message: String,
        details: Vec<String>,
    },
    /// The model could not be fitted or evaluated.
    #[error(transparent)]
    Forecast(#[from] ForecastError),
}

impl ServiceError {
    pub fn invalid(message: impl Into<String>, details: Vec<String>) -> Self {
        ServiceError::Invalid {
            message: message.into(),
            details,
        }
    }
}

impl From<SeriesError> for ServiceError {
    fn from(err: SeriesError) -> Self {
        ServiceError::invalid("Data processing error", vec![err.to_string()])
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
