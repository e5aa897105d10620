//! Errors raised by the forecast engine.

use thiserror::Error;

use crate::models::SeriesError;

pub type ForecastResult<T> = Result<T, ForecastError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("need at least {needed} observations to fit a model, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("regressor '{0}' is already registered")]
    DuplicateRegressor(String),

    #[error("regressors must be registered before the model is fitted")]
    AlreadyFitted,

    #[error("model has not been fitted")]
    NotFitted,

    #[error("regressor '{0}' is registered but the history does not contain it")]
    MissingHistoricalRegressor(String),

    #[error("regressor '{0}' was used in fitting but no future values were supplied")]
    MissingFutureRegressor(String),

    #[error("regressor '{name}' has {got} values for {expected} dates")]
    RegressorLength {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("design matrix is not positive definite")]
    SingularDesign,

    #[error("model produced non-finite values")]
    NonFinite,

    #[error(transparent)]
    Series(#[from] SeriesError),
}
