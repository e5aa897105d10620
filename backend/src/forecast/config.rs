//! Model hyper-parameters.

use serde::{Deserialize, Serialize};

use super::error::{ForecastError, ForecastResult};

/// Period of the yearly seasonality, in days.
pub const YEARLY_PERIOD_DAYS: f64 = 365.25;
/// Period of the weekly seasonality, in days.
pub const WEEKLY_PERIOD_DAYS: f64 = 7.0;
/// Fourier order of the yearly seasonality.
pub const YEARLY_FOURIER_ORDER: usize = 10;
/// Fourier order of the weekly seasonality.
pub const WEEKLY_FOURIER_ORDER: usize = 3;

/// Whether a seasonal component is part of the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    /// Enabled when the history is long and fine-grained enough to estimate it.
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Coverage of the uncertainty interval, strictly between 0 and 1.
    pub interval_width: f64,
    /// Prior scale of trend rate changes; larger values allow a more flexible trend.
    pub changepoint_prior_scale: f64,
    /// Maximum number of potential trend changepoints.
    pub n_changepoints: usize,
    /// Share of the history in which changepoints are placed.
    pub changepoint_range: f64,
    pub yearly_seasonality: SeasonalityMode,
    pub weekly_seasonality: SeasonalityMode,
    pub seasonality_prior_scale: f64,
    pub regressor_prior_scale: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            interval_width: 0.95,
            changepoint_prior_scale: 0.05,
            n_changepoints: 25,
            changepoint_range: 0.8,
            yearly_seasonality: SeasonalityMode::Auto,
            weekly_seasonality: SeasonalityMode::Auto,
            seasonality_prior_scale: 10.0,
            regressor_prior_scale: 10.0,
        }
    }
}

impl ModelConfig {
    pub fn with_interval_width(mut self, width: f64) -> Self {
        self.interval_width = width;
        self
    }

    pub fn with_changepoint_prior_scale(mut self, scale: f64) -> Self {
        self.changepoint_prior_scale = scale;
        self
    }

    pub fn with_yearly_seasonality(mut self, mode: SeasonalityMode) -> Self {
        self.yearly_seasonality = mode;
        self
    }

    pub fn with_weekly_seasonality(mut self, mode: SeasonalityMode) -> Self {
        self.weekly_seasonality = mode;
        self
    }

    pub fn validate(&self) -> ForecastResult<()> {
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "interval_width must lie strictly between 0 and 1, got {}",
                self.interval_width
            )));
        }
        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "changepoint_range must lie in (0, 1], got {}",
                self.changepoint_range
            )));
        }
        for (name, scale) in [
            ("changepoint_prior_scale", self.changepoint_prior_scale),
            ("seasonality_prior_scale", self.seasonality_prior_scale),
            ("regressor_prior_scale", self.regressor_prior_scale),
        ] {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(ForecastError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, scale
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ModelConfig::default().validate().is_ok());
    }

    #[test]
    fn test_interval_width_bounds() {
        for width in [0.0, 1.0, -0.5, f64::NAN] {
            let config = ModelConfig::default().with_interval_width(width);
            assert!(matches!(config.validate(), Err(ForecastError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_prior_scale_must_be_positive() {
        let config = ModelConfig::default().with_changepoint_prior_scale(0.0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("changepoint_prior_scale"));
    }
}
