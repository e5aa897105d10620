//! Future values of external regressors.
//!
//! A regressor seen in the history needs one value per forecast period.
//! Values are taken from the request, or, when the client opts in, projected
//! from the regressor's own history with a univariate model.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{info, warn};

use super::{ServiceError, ServiceResult};
use crate::forecast::{ForecastModel, ModelConfig, SeasonalityMode};
use crate::models::{Frequency, RegressorSet, TimeSeries};

/// Future regressor columns ready for prediction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedRegressors {
    pub future: RegressorSet,
    /// Names whose values were projected rather than supplied.
    pub generated: Vec<String>,
}

impl ResolvedRegressors {
    pub fn names(&self) -> Vec<String> {
        self.future.names().map(str::to_string).collect()
    }
}

/// Match supplied future values against the regressors of the history.
///
/// Supplied names absent from the history are ignored. A history regressor
/// without supplied values is projected when `project_missing` is set and
/// rejected otherwise.
pub fn resolve(
    history_dates: &[NaiveDate],
    history: &RegressorSet,
    supplied: &BTreeMap<String, Vec<f64>>,
    horizon: usize,
    frequency: Frequency,
    project_missing: bool,
) -> ServiceResult<ResolvedRegressors> {
    for name in supplied.keys().filter(|n| !history.contains(n)) {
        warn!(regressor = %name, "Ignoring future values for a regressor absent from historicalData");
    }

    let mut issues = Vec::new();
    let mut missing = Vec::new();
    for name in history.names() {
        match supplied.get(name) {
            Some(values) if values.len() != horizon => issues.push(format!(
                "futureRegressors.{} has {} values, expected {} (futurePeriods)",
                name,
                values.len(),
                horizon
            )),
            Some(_) => {}
            None if project_missing => {}
            None => missing.push(name.to_string()),
        }
    }
    for name in &missing {
        issues.push(format!(
            "Regressor '{}' is present in historicalData but futureRegressors.{} was not provided",
            name, name
        ));
    }
    if !issues.is_empty() {
        let message = if missing.is_empty() {
            "Invalid future regressors"
        } else {
            "Missing future regressor values"
        };
        return Err(ServiceError::invalid(message, issues));
    }

    let mut resolved = ResolvedRegressors::default();
    for name in history.names() {
        let values = match supplied.get(name) {
            Some(values) => values.clone(),
            None => {
                info!(regressor = %name, periods = horizon, "Projecting regressor values");
                let column = history.get(name).unwrap_or_default();
                resolved.generated.push(name.to_string());
                project(history_dates, column, horizon, frequency)?
            }
        };
        resolved.future.insert(name, values)?;
    }
    Ok(resolved)
}

/// Forecast `horizon` future values of a single regressor from its history.
pub fn project(
    dates: &[NaiveDate],
    values: &[f64],
    horizon: usize,
    frequency: Frequency,
) -> ServiceResult<Vec<f64>> {
    let series = TimeSeries::new(dates.to_vec(), values.to_vec())?;
    let config = ModelConfig::default().with_yearly_seasonality(SeasonalityMode::On);
    let mut model = ForecastModel::new(config).with_frequency(frequency);
    model.fit(&series, &RegressorSet::new())?;
    let future = model.make_future_dates(horizon, frequency)?;
    let frame = model.predict(&future, &RegressorSet::new())?;
    Ok(frame.yhat())
}
