//! The forecast model: register regressors, fit, predict.

use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::debug;

use super::config::ModelConfig;
use super::design::{Design, SeasonKind};
use super::error::{ForecastError, ForecastResult};
use super::solver;
use crate::models::{Frequency, RegressorSet, TimeSeries};

/// Fewest observations a model can be fitted on.
pub const MIN_OBSERVATIONS: usize = 2;

/// Floor for the noise variance, in scaled units (the series is divided by
/// its largest magnitude before fitting).
const MIN_NOISE_VARIANCE: f64 = 1e-6;

/// The noise variance never drops below this share of the series variance.
/// A near-exact first pass would otherwise switch the penalties off.
const NOISE_FLOOR_SHARE: f64 = 1e-3;

/// Floor for the first-pass noise guess. Keeps a constant series from
/// disabling every penalty on the first pass.
const MIN_PRIOR_VARIANCE: f64 = 1e-4;

/// One predicted period, in the units of the input series.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    pub trend: f64,
    pub yearly: f64,
    pub weekly: f64,
    /// Combined effect of all external regressors.
    pub extra_regressors: f64,
}

/// Predictions for a sequence of dates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastFrame {
    rows: Vec<ForecastRow>,
}

impl ForecastFrame {
    pub fn new(rows: Vec<ForecastRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ForecastRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn yhat(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.yhat).collect()
    }

    /// Append another frame's rows after this one's.
    pub fn chain(mut self, other: ForecastFrame) -> Self {
        self.rows.extend(other.rows);
        self
    }
}

#[derive(Debug, Clone)]
struct FittedState {
    design: Design,
    beta: DVector<f64>,
    covariance: DMatrix<f64>,
    /// Residual standard deviation, in scaled units.
    sigma: f64,
    y_scale: f64,
    last_date: NaiveDate,
}

/// An additive trend + seasonality + regressor model.
#[derive(Debug, Clone)]
pub struct ForecastModel {
    config: ModelConfig,
    /// Sampling frequency; inferred from the history when unset.
    frequency: Option<Frequency>,
    regressors: Vec<String>,
    fitted: Option<FittedState>,
}

impl ForecastModel {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            frequency: None,
            regressors: Vec::new(),
            fitted: None,
        }
    }

    /// Fix the sampling frequency instead of inferring it from the history.
    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Register an external regressor. Must happen before [`fit`](Self::fit).
    pub fn add_regressor(&mut self, name: impl Into<String>) -> ForecastResult<&mut Self> {
        let name = name.into();
        if self.fitted.is_some() {
            return Err(ForecastError::AlreadyFitted);
        }
        if self.regressors.contains(&name) {
            return Err(ForecastError::DuplicateRegressor(name));
        }
        self.regressors.push(name);
        Ok(self)
    }

    pub fn regressors(&self) -> &[String] {
        &self.regressors
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Residual standard deviation of the fit, in series units.
    pub fn residual_std(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.sigma * f.y_scale)
    }

    /// Fit the model on `series`. Every registered regressor must be present
    /// in `regressors` with one value per observation; unregistered columns
    /// are ignored.
    pub fn fit(&mut self, series: &TimeSeries, regressors: &RegressorSet) -> ForecastResult<()> {
        self.config.validate()?;
        if series.len() < MIN_OBSERVATIONS {
            return Err(ForecastError::InsufficientData {
                needed: MIN_OBSERVATIONS,
                got: series.len(),
            });
        }

        let columns = self.columns(regressors, series.len(), |name| {
            ForecastError::MissingHistoricalRegressor(name.to_string())
        })?;
        let frequency = self.frequency.unwrap_or_else(|| series.frequency());
        let design = Design::from_history(series, frequency, &columns, &self.config);
        let x = design.matrix(series.dates(), &columns);

        let y_scale = series
            .values()
            .iter()
            .fold(0.0_f64, |m, v| m.max(v.abs()));
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };
        let y = DVector::from_iterator(series.len(), series.values().iter().map(|v| v / y_scale));

        let penalties = design.penalties(&self.config);

        // First pass: the variance of the series bounds the noise from above
        let n = y.len() as f64;
        let mean = y.mean();
        let prior_variance = (y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n)
            .max(MIN_PRIOR_VARIANCE);
        let first = solver::ridge(&x, &y, &(&penalties * prior_variance))?;

        // Second pass: penalties relative to the estimated noise
        let noise_floor = (prior_variance * NOISE_FLOOR_SHARE).max(MIN_NOISE_VARIANCE);
        let noise = first.residual_variance.max(noise_floor);
        let fit = solver::ridge(&x, &y, &(&penalties * noise))?;
        let sigma = fit.residual_variance.max(noise_floor).sqrt();

        debug!(
            observations = series.len(),
            columns = design.n_columns(),
            changepoints = design.n_changepoints(),
            sigma = sigma * y_scale,
            "fitted forecast model"
        );

        self.fitted = Some(FittedState {
            design,
            beta: fit.beta,
            covariance: fit.covariance,
            sigma,
            y_scale,
            last_date: series.last_date(),
        });
        Ok(())
    }

    /// The `periods` dates after the last fitted observation.
    pub fn make_future_dates(&self, periods: usize, frequency: Frequency) -> ForecastResult<Vec<NaiveDate>> {
        let fitted = self.fitted.as_ref().ok_or(ForecastError::NotFitted)?;
        Ok(frequency.future_dates(fitted.last_date, periods)?)
    }

    /// Predict `dates`. Every regressor used in fitting must be supplied with
    /// one value per date.
    pub fn predict(&self, dates: &[NaiveDate], regressors: &RegressorSet) -> ForecastResult<ForecastFrame> {
        let fitted = self.fitted.as_ref().ok_or(ForecastError::NotFitted)?;
        let columns = self.columns(regressors, dates.len(), |name| {
            ForecastError::MissingFutureRegressor(name.to_string())
        })?;

        let design = &fitted.design;
        let x = design.matrix(dates, &columns);
        let z = Normal::standard().inverse_cdf(0.5 + self.config.interval_width / 2.0);

        let seasonal = design.seasonality_columns();
        let regressor_range = design.regressor_columns();
        let beta = &fitted.beta;
        let part = |i: usize, range: std::ops::Range<usize>| -> f64 {
            range.map(|j| x[(i, j)] * beta[j]).sum::<f64>() * fitted.y_scale
        };

        let mut rows = Vec::with_capacity(dates.len());
        for (i, date) in dates.iter().enumerate() {
            let trend = part(i, design.trend_columns());
            let mut yearly = 0.0;
            let mut weekly = 0.0;
            for (kind, range) in &seasonal {
                match kind {
                    SeasonKind::Yearly => yearly += part(i, range.clone()),
                    SeasonKind::Weekly => weekly += part(i, range.clone()),
                }
            }
            let extra_regressors = part(i, regressor_range.clone());
            let yhat = trend + yearly + weekly + extra_regressors;

            let xi: DVector<f64> = x.row(i).transpose();
            let leverage = xi.dot(&(&fitted.covariance * &xi)).max(0.0);
            let half_width = z * fitted.sigma * (1.0 + leverage).sqrt() * fitted.y_scale;

            let row = ForecastRow {
                date: *date,
                yhat,
                yhat_lower: yhat - half_width,
                yhat_upper: yhat + half_width,
                trend,
                yearly,
                weekly,
                extra_regressors,
            };
            if ![row.yhat, row.yhat_lower, row.yhat_upper].iter().all(|v| v.is_finite()) {
                return Err(ForecastError::NonFinite);
            }
            rows.push(row);
        }

        Ok(ForecastFrame::new(rows))
    }

    /// Registered regressor columns, in registration order.
    fn columns<'a>(
        &self,
        regressors: &'a RegressorSet,
        expected: usize,
        missing: impl Fn(&str) -> ForecastError,
    ) -> ForecastResult<Vec<&'a [f64]>> {
        self.regressors
            .iter()
            .map(|name| {
                let column = regressors.get(name).ok_or_else(|| missing(name))?;
                if column.len() != expected {
                    return Err(ForecastError::RegressorLength {
                        name: name.clone(),
                        expected,
                        got: column.len(),
                    });
                }
                Ok(column)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::SeasonalityMode;
    use chrono::Days;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
    }

    fn daily(values: Vec<f64>) -> TimeSeries {
        let dates = (0..values.len() as u64).map(|i| start() + Days::new(i)).collect();
        TimeSeries::new(dates, values).unwrap()
    }

    #[test]
    fn test_linear_trend_is_extrapolated() {
        let series = daily((0..60).map(|i| 100.0 + 2.0 * i as f64).collect());
        let config = ModelConfig::default().with_weekly_seasonality(SeasonalityMode::Off);
        let mut model = ForecastModel::new(config);
        model.fit(&series, &RegressorSet::new()).unwrap();

        let future = model.make_future_dates(10, Frequency::DAILY).unwrap();
        assert_eq!(future[0], series.last_date() + Days::new(1));
        let frame = model.predict(&future, &RegressorSet::new()).unwrap();
        assert_eq!(frame.len(), 10);
        // day 69 → 238
        let last = frame.rows().last().unwrap();
        assert!((last.yhat - 238.0).abs() < 1.0, "got {}", last.yhat);
    }

    #[test]
    fn test_weekly_pattern_is_captured() {
        let pattern = [10.0, 12.0, 14.0, 16.0, 14.0, 8.0, 6.0];
        let series = daily((0..84).map(|i| 50.0 + pattern[i % 7]).collect());
        let mut model = ForecastModel::new(ModelConfig::default());
        model.fit(&series, &RegressorSet::new()).unwrap();

        let future = model.make_future_dates(7, Frequency::DAILY).unwrap();
        let frame = model.predict(&future, &RegressorSet::new()).unwrap();
        for (k, row) in frame.rows().iter().enumerate() {
            let expected = 50.0 + pattern[(84 + k) % 7];
            assert!((row.yhat - expected).abs() < 1.5, "day {k}: {} vs {expected}", row.yhat);
            assert!(row.weekly.abs() > 0.0);
        }
    }

    #[test]
    fn test_regressor_effect_is_learned() {
        let driver: Vec<f64> = (0..60).map(|i| ((i * 7) % 11) as f64).collect();
        let series = daily(driver.iter().map(|d| 20.0 + 3.0 * d).collect());
        let mut history = RegressorSet::new();
        history.insert("mti", driver).unwrap();

        let mut model = ForecastModel::new(
            ModelConfig::default().with_weekly_seasonality(SeasonalityMode::Off),
        );
        model.add_regressor("mti").unwrap();
        model.fit(&series, &history).unwrap();

        let dates = model.make_future_dates(2, Frequency::DAILY).unwrap();
        let mut future = RegressorSet::new();
        future.insert("mti", vec![0.0, 10.0]).unwrap();
        let frame = model.predict(&dates, &future).unwrap();
        let diff = frame.rows()[1].yhat - frame.rows()[0].yhat;
        assert!((diff - 30.0).abs() < 2.0, "got {diff}");
    }

    #[test]
    fn test_missing_future_regressor_is_an_error() {
        let series = daily((0..30).map(|i| i as f64).collect());
        let mut history = RegressorSet::new();
        history.insert("inflation", vec![1.0; 30]).unwrap();

        let mut model = ForecastModel::new(ModelConfig::default());
        model.add_regressor("inflation").unwrap();
        model.fit(&series, &history).unwrap();
        let dates = model.make_future_dates(5, Frequency::DAILY).unwrap();

        let err = model.predict(&dates, &RegressorSet::new()).unwrap_err();
        assert_eq!(err, ForecastError::MissingFutureRegressor("inflation".to_string()));

        let mut short = RegressorSet::new();
        short.insert("inflation", vec![1.0; 3]).unwrap();
        let err = model.predict(&dates, &short).unwrap_err();
        assert!(matches!(err, ForecastError::RegressorLength { expected: 5, got: 3, .. }));
    }

    #[test]
    fn test_registration_rules() {
        let mut model = ForecastModel::new(ModelConfig::default());
        model.add_regressor("mti").unwrap();
        assert_eq!(
            model.add_regressor("mti").unwrap_err(),
            ForecastError::DuplicateRegressor("mti".to_string())
        );

        let series = daily(vec![1.0, 2.0, 3.0]);
        let err = model.fit(&series, &RegressorSet::new()).unwrap_err();
        assert_eq!(err, ForecastError::MissingHistoricalRegressor("mti".to_string()));

        let mut plain = ForecastModel::new(ModelConfig::default());
        plain.fit(&series, &RegressorSet::new()).unwrap();
        assert_eq!(plain.add_regressor("late").unwrap_err(), ForecastError::AlreadyFitted);
    }

    #[test]
    fn test_insufficient_data() {
        let mut model = ForecastModel::new(ModelConfig::default());
        let err = model.fit(&daily(vec![5.0]), &RegressorSet::new()).unwrap_err();
        assert_eq!(err, ForecastError::InsufficientData { needed: 2, got: 1 });
        assert!(!model.is_fitted());
        assert_eq!(
            model.predict(&[start()], &RegressorSet::new()).unwrap_err(),
            ForecastError::NotFitted
        );
    }

    #[test]
    fn test_bounds_contain_prediction_and_widen() {
        let values: Vec<f64> = (0..90)
            .map(|i| 30.0 + (i as f64 * 0.7).sin() * 4.0 + (i % 5) as f64)
            .collect();
        let config = ModelConfig::default().with_weekly_seasonality(SeasonalityMode::Off);
        let mut model = ForecastModel::new(config);
        model.fit(&daily(values), &RegressorSet::new()).unwrap();
        let dates = model.make_future_dates(60, Frequency::DAILY).unwrap();
        let frame = model.predict(&dates, &RegressorSet::new()).unwrap();

        for row in frame.rows() {
            assert!(row.yhat_lower <= row.yhat && row.yhat <= row.yhat_upper);
        }
        let first = &frame.rows()[0];
        let last = &frame.rows()[59];
        assert!(last.yhat_upper - last.yhat_lower >= first.yhat_upper - first.yhat_lower);
    }

    #[test]
    fn test_fitting_is_deterministic() {
        let values: Vec<f64> = (0..40).map(|i| ((i * 13) % 17) as f64).collect();
        let run = || {
            let mut model = ForecastModel::new(ModelConfig::default());
            model.fit(&daily(values.clone()), &RegressorSet::new()).unwrap();
            let dates = model.make_future_dates(14, Frequency::DAILY).unwrap();
            model.predict(&dates, &RegressorSet::new()).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_constant_series_has_flat_forecast() {
        let mut model = ForecastModel::new(ModelConfig::default());
        model.fit(&daily(vec![7.0; 20]), &RegressorSet::new()).unwrap();
        let dates = model.make_future_dates(5, Frequency::DAILY).unwrap();
        let frame = model.predict(&dates, &RegressorSet::new()).unwrap();
        for row in frame.rows() {
            assert!((row.yhat - 7.0).abs() < 1e-3, "{:?}", row);
            assert!(row.yhat_lower <= 7.0 && 7.0 <= row.yhat_upper, "{:?}", row);
        }
    }

    #[test]
    fn test_short_constant_series_keeps_penalties() {
        // Fewer rows than design columns: only the penalties pin the fit
        let mut model = ForecastModel::new(ModelConfig::default());
        model.fit(&daily(vec![3.5; 12]), &RegressorSet::new()).unwrap();
        let dates = model.make_future_dates(30, Frequency::DAILY).unwrap();
        let frame = model.predict(&dates, &RegressorSet::new()).unwrap();
        let last = frame.rows().last().unwrap();
        assert!((last.yhat - 3.5).abs() < 1e-2, "{:?}", last);
        assert!(model.residual_std().unwrap() > 0.0);
    }
}
