//! Steps shared by the demand and supplier adapters.

use chrono::NaiveDate;
use tracing::{info, warn};

use super::ServiceResult;
use crate::api::{DateRange, ForecastPoint};
use crate::forecast::{ForecastFrame, ForecastModel, ModelConfig};
use crate::models::{Frequency, Gap, RegressorSet, TimeSeries};

/// Coverage and gap summary of the observed dates.
#[derive(Debug, Clone, PartialEq)]
pub struct DataQuality {
    pub frequency: Frequency,
    pub density: f64,
    pub gaps: Vec<Gap>,
}

/// Measure density and report gaps wider than `max_gap_steps` periods.
pub fn assess(dates: &[NaiveDate], frequency: Frequency, max_gap_steps: u64) -> DataQuality {
    let density = crate::models::series::density(dates, frequency);
    let gaps = crate::models::series::gaps(dates, frequency, max_gap_steps);

    info!(
        points = dates.len(),
        density = %format!("{:.2}%", density * 100.0),
        frequency = %frequency,
        "Data density"
    );
    if !gaps.is_empty() {
        warn!("Found {} gaps > {} periods", gaps.len(), max_gap_steps);
        for gap in &gaps {
            warn!("  Gap from {} to {} ({} days)", gap.start, gap.end, gap.days);
        }
    }

    DataQuality {
        frequency,
        density,
        gaps,
    }
}

/// The frequency requested by the client, or the one inferred from the dates.
pub fn frequency_for(dates: &[NaiveDate], requested: Option<&str>) -> Frequency {
    requested
        .and_then(Frequency::parse)
        .unwrap_or_else(|| Frequency::infer(dates))
}

/// In-sample fit and out-of-sample forecast of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOutput {
    pub fitted: ForecastFrame,
    pub forecast: ForecastFrame,
}

impl FitOutput {
    /// The rows returned to the client.
    pub fn returned(&self, include_history: bool) -> ForecastFrame {
        if include_history {
            self.fitted.clone().chain(self.forecast.clone())
        } else {
            self.forecast.clone()
        }
    }
}

/// Fit a model on `series` and predict `future_dates`.
///
/// Every column of `future_regressors` is registered as a regressor;
/// `history_regressors` must carry the same names aligned to `series`.
pub fn fit_and_predict(
    series: &TimeSeries,
    history_regressors: &RegressorSet,
    future_dates: &[NaiveDate],
    future_regressors: &RegressorSet,
    frequency: Frequency,
    config: ModelConfig,
) -> ServiceResult<FitOutput> {
    let mut model = ForecastModel::new(config).with_frequency(frequency);
    for name in future_regressors.names() {
        model.add_regressor(name)?;
    }

    info!(points = series.len(), regressors = model.regressors().len(), "Fitting model");
    model.fit(series, history_regressors)?;
    let fitted = model.predict(series.dates(), history_regressors)?;
    let forecast = model.predict(future_dates, future_regressors)?;
    info!(periods = forecast.len(), "Forecast generated");

    Ok(FitOutput { fitted, forecast })
}

/// Format frame rows as response points, mapping each value through `map`.
pub fn to_points(frame: &ForecastFrame, map: impl Fn(f64) -> f64) -> Vec<ForecastPoint> {
    frame
        .rows()
        .iter()
        .map(|r| ForecastPoint {
            date: r.date.format("%Y-%m-%d").to_string(),
            value: map(r.yhat),
            lower: map(r.yhat_lower),
            upper: map(r.yhat_upper),
        })
        .collect()
}

pub fn date_range(first: NaiveDate, last: NaiveDate) -> DateRange {
    DateRange {
        start: first.format("%Y-%m-%d").to_string(),
        end: last.format("%Y-%m-%d").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn dates(offsets: &[u64]) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        offsets.iter().map(|d| start + Days::new(*d)).collect()
    }

    #[test]
    fn test_assess_density_and_gaps() {
        let d = dates(&[0, 1, 2, 3, 14, 15, 16, 17, 18, 19]);
        let quality = assess(&d, Frequency::DAILY, 7);
        assert!((quality.density - 0.5).abs() < 1e-12);
        assert_eq!(quality.gaps.len(), 1);
        assert_eq!(quality.gaps[0].days, 11);
    }

    #[test]
    fn test_frequency_override() {
        let d = dates(&[0, 1, 2]);
        assert_eq!(frequency_for(&d, None), Frequency::DAILY);
        assert_eq!(frequency_for(&d, Some("weekly")), Frequency::WEEKLY);
        assert_eq!(frequency_for(&d, Some("bogus")), Frequency::DAILY);
    }

    #[test]
    fn test_fit_and_predict_shapes() {
        let d = dates(&(0..40).collect::<Vec<_>>());
        let series = TimeSeries::new(d.clone(), (0..40).map(|i| i as f64).collect()).unwrap();
        let future = Frequency::DAILY.future_dates(series.last_date(), 5).unwrap();
        let out = fit_and_predict(&series, &RegressorSet::new(), &future, &RegressorSet::new(), Frequency::DAILY, ModelConfig::default())
            .unwrap();
        assert_eq!(out.fitted.len(), 40);
        assert_eq!(out.forecast.len(), 5);
        assert_eq!(out.returned(false).len(), 5);
        assert_eq!(out.returned(true).len(), 45);

        let points = to_points(&out.forecast, |v| v);
        assert_eq!(points[0].date, "2024-02-10");
        assert!(points.iter().all(|p| p.lower <= p.value && p.value <= p.upper));
    }
}
