//! Additive time-series model used by the forecast adapters.
//!
//! A series is decomposed into a piecewise-linear trend, Fourier
//! seasonalities and linear effects of external regressors:
//!
//! ```text
//! y(t) = trend(t) + yearly(t) + weekly(t) + Σ β_r · r(t) + ε
//! ```
//!
//! Coefficients are the MAP estimate under independent Gaussian priors,
//! which reduces to a ridge solve with per-column penalties. Uncertainty
//! bounds come from the residual variance and the parameter covariance, so
//! they widen as predictions move away from the fitted history.
//!
//! ```no_run
//! use supply_forecast::forecast::{ForecastModel, ModelConfig};
//! use supply_forecast::models::{Frequency, RegressorSet, TimeSeries};
//! # fn run(series: TimeSeries) -> Result<(), Box<dyn std::error::Error>> {
//! let mut model = ForecastModel::new(ModelConfig::default());
//! model.fit(&series, &RegressorSet::new())?;
//! let future = model.make_future_dates(30, Frequency::DAILY)?;
//! let forecast = model.predict(&future, &RegressorSet::new())?;
//! # Ok(())
//! # }
//! ```

pub mod components;
pub mod config;
mod design;
pub mod error;
pub mod model;
mod solver;

pub use config::{ModelConfig, SeasonalityMode};
pub use error::ForecastError;
pub use model::{ForecastFrame, ForecastModel, ForecastRow};
