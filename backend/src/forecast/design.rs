//! Design matrix construction.
//!
//! Column layout:
//!
//! ```text
//! [ 1 | t | (t - s_1)+ .. (t - s_C)+ | sin/cos yearly | sin/cos weekly | regressors ]
//! ```
//!
//! `t` is time scaled to `[0, 1]` over the fitted history and `s_j` are the
//! changepoint locations on the same scale. Seasonal phases are anchored to
//! the calendar, not to the first observation, so the same date always maps
//! to the same Fourier row.

use std::f64::consts::PI;
use std::ops::Range;

use chrono::{Datelike, NaiveDate};
use nalgebra::{DMatrix, DVector};
use statrs::statistics::Statistics;

use super::config::{
    ModelConfig, SeasonalityMode, WEEKLY_FOURIER_ORDER, WEEKLY_PERIOD_DAYS, YEARLY_FOURIER_ORDER,
    YEARLY_PERIOD_DAYS,
};
use crate::models::{Frequency, TimeSeries};

/// Minimum history span (days) for automatic yearly seasonality.
const AUTO_YEARLY_MIN_SPAN_DAYS: i64 = 730;
/// Minimum history span (days) for automatic weekly seasonality.
const AUTO_WEEKLY_MIN_SPAN_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SeasonKind {
    Yearly,
    Weekly,
}

#[derive(Debug, Clone)]
pub(crate) struct Seasonality {
    pub kind: SeasonKind,
    pub period_days: f64,
    pub order: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct RegressorScale {
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct Design {
    start_day: f64,
    span_days: f64,
    changepoints: Vec<f64>,
    seasonalities: Vec<Seasonality>,
    regressors: Vec<RegressorScale>,
}

fn calendar_day(date: NaiveDate) -> f64 {
    date.num_days_from_ce() as f64
}

fn include(mode: SeasonalityMode, auto: bool) -> bool {
    match mode {
        SeasonalityMode::On => true,
        SeasonalityMode::Off => false,
        SeasonalityMode::Auto => auto,
    }
}

/// Sample mean and standard deviation; a degenerate spread becomes 1.
fn standardisation(values: &[f64]) -> RegressorScale {
    let mean = values.mean();
    let std = values.std_dev();
    RegressorScale {
        mean,
        std: if std.is_finite() && std > 0.0 { std } else { 1.0 },
    }
}

impl Design {
    /// Lay out the design for a history sampled at `frequency` and its
    /// regressor columns (in registration order).
    pub fn from_history(
        series: &TimeSeries,
        frequency: Frequency,
        regressors: &[&[f64]],
        config: &ModelConfig,
    ) -> Self {
        let start_day = calendar_day(series.first_date());
        let span = series.span_days();
        let span_days = span.max(1) as f64;

        let t: Vec<f64> = series
            .dates()
            .iter()
            .map(|d| (calendar_day(*d) - start_day) / span_days)
            .collect();

        let step = frequency.step_days();
        let mut seasonalities = Vec::new();
        if include(config.yearly_seasonality, span >= AUTO_YEARLY_MIN_SPAN_DAYS) {
            seasonalities.push(Seasonality {
                kind: SeasonKind::Yearly,
                period_days: YEARLY_PERIOD_DAYS,
                order: YEARLY_FOURIER_ORDER,
            });
        }
        if include(
            config.weekly_seasonality,
            span >= AUTO_WEEKLY_MIN_SPAN_DAYS && step < 7,
        ) {
            seasonalities.push(Seasonality {
                kind: SeasonKind::Weekly,
                period_days: WEEKLY_PERIOD_DAYS,
                order: WEEKLY_FOURIER_ORDER,
            });
        }

        Self {
            start_day,
            span_days,
            changepoints: changepoints(&t, config),
            seasonalities,
            regressors: regressors.iter().map(|c| standardisation(c)).collect(),
        }
    }

    pub fn n_columns(&self) -> usize {
        self.regressor_columns().end
    }

    pub fn n_changepoints(&self) -> usize {
        self.changepoints.len()
    }

    pub fn trend_columns(&self) -> Range<usize> {
        0..2 + self.changepoints.len()
    }

    pub fn seasonality_columns(&self) -> Vec<(SeasonKind, Range<usize>)> {
        let mut start = self.trend_columns().end;
        self.seasonalities
            .iter()
            .map(|s| {
                let range = start..start + 2 * s.order;
                start = range.end;
                (s.kind, range)
            })
            .collect()
    }

    pub fn regressor_columns(&self) -> Range<usize> {
        let start = self.trend_columns().end
            + self.seasonalities.iter().map(|s| 2 * s.order).sum::<usize>();
        start..start + self.regressors.len()
    }

    pub fn has_seasonality(&self, kind: SeasonKind) -> bool {
        self.seasonalities.iter().any(|s| s.kind == kind)
    }

    fn scaled_time(&self, date: NaiveDate) -> f64 {
        (calendar_day(date) - self.start_day) / self.span_days
    }

    /// Prior precision of each column, relative to the noise variance.
    ///
    /// Intercept and slope are unpenalised.
    pub fn penalties(&self, config: &ModelConfig) -> DVector<f64> {
        let mut p = DVector::zeros(self.n_columns());
        let cp = 1.0 / config.changepoint_prior_scale.powi(2);
        for j in 2..self.trend_columns().end {
            p[j] = cp;
        }
        let seasonal = 1.0 / config.seasonality_prior_scale.powi(2);
        for (_, range) in self.seasonality_columns() {
            for j in range {
                p[j] = seasonal;
            }
        }
        let reg = 1.0 / config.regressor_prior_scale.powi(2);
        for j in self.regressor_columns() {
            p[j] = reg;
        }
        p
    }

    /// Build the design matrix for `dates`. `regressors` holds one column
    /// per registered regressor, each as long as `dates`.
    pub fn matrix(&self, dates: &[NaiveDate], regressors: &[&[f64]]) -> DMatrix<f64> {
        let mut x = DMatrix::zeros(dates.len(), self.n_columns());
        let seasonal = self.seasonality_columns();
        let reg_start = self.regressor_columns().start;

        for (i, date) in dates.iter().enumerate() {
            let t = self.scaled_time(*date);
            x[(i, 0)] = 1.0;
            x[(i, 1)] = t;
            for (k, s) in self.changepoints.iter().enumerate() {
                x[(i, 2 + k)] = (t - s).max(0.0);
            }

            let day = calendar_day(*date);
            for (season, (_, range)) in self.seasonalities.iter().zip(&seasonal) {
                for k in 0..season.order {
                    let angle = 2.0 * PI * (k + 1) as f64 * day / season.period_days;
                    x[(i, range.start + 2 * k)] = angle.sin();
                    x[(i, range.start + 2 * k + 1)] = angle.cos();
                }
            }

            for (r, (column, scale)) in regressors.iter().zip(&self.regressors).enumerate() {
                x[(i, reg_start + r)] = (column[i] - scale.mean) / scale.std;
            }
        }
        x
    }
}

/// Changepoints at evenly spaced positions of the first
/// `changepoint_range` share of the history.
fn changepoints(t: &[f64], config: &ModelConfig) -> Vec<f64> {
    let hist = ((t.len() as f64) * config.changepoint_range).floor() as usize;
    let n = config.n_changepoints.min(hist.saturating_sub(1));
    if n == 0 {
        return Vec::new();
    }
    (1..=n)
        .map(|k| {
            let idx = ((k * (hist - 1)) as f64 / n as f64).round() as usize;
            t[idx]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn daily_series(n: usize) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let dates = (0..n as u64).map(|i| start + Days::new(i)).collect();
        TimeSeries::new(dates, vec![1.0; n]).unwrap()
    }

    #[test]
    fn test_changepoints_within_range() {
        let series = daily_series(100);
        let design = Design::from_history(&series, Frequency::DAILY, &[], &ModelConfig::default());
        assert_eq!(design.n_changepoints(), 25);
        assert!(design.changepoints.iter().all(|s| *s > 0.0 && *s <= 0.8));
        assert!(design.changepoints.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_short_history_has_no_changepoints() {
        let series = daily_series(2);
        let design = Design::from_history(&series, Frequency::DAILY, &[], &ModelConfig::default());
        assert_eq!(design.n_changepoints(), 0);
        assert_eq!(design.n_columns(), 2);
    }

    #[test]
    fn test_auto_seasonality_selection() {
        // 60 daily points: weekly yes, yearly no
        let design = Design::from_history(&daily_series(60), Frequency::DAILY, &[], &ModelConfig::default());
        assert!(design.has_seasonality(SeasonKind::Weekly));
        assert!(!design.has_seasonality(SeasonKind::Yearly));

        let config = ModelConfig::default()
            .with_yearly_seasonality(SeasonalityMode::On)
            .with_weekly_seasonality(SeasonalityMode::Off);
        let design = Design::from_history(&daily_series(60), Frequency::DAILY, &[], &config);
        assert!(design.has_seasonality(SeasonKind::Yearly));
        assert!(!design.has_seasonality(SeasonKind::Weekly));
    }

    #[test]
    fn test_column_layout_and_penalties() {
        let series = daily_series(60);
        let reg = vec![2.0; 60];
        let design = Design::from_history(&series, Frequency::DAILY, &[reg.as_slice()], &ModelConfig::default());
        let x = design.matrix(series.dates(), &[reg.as_slice()]);
        assert_eq!(x.ncols(), design.n_columns());
        assert_eq!(design.regressor_columns().len(), 1);

        // Constant regressor is centred, not divided by zero
        let col = design.regressor_columns().start;
        assert!(x.column(col).iter().all(|v| *v == 0.0));

        let p = design.penalties(&ModelConfig::default());
        assert_eq!(p[0], 0.0);
        assert_eq!(p[1], 0.0);
        assert!((p[2] - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_weekly_follows_given_frequency() {
        // Daily rows, but the caller forecasts in weekly steps
        let series = daily_series(60);
        let design = Design::from_history(&series, Frequency::WEEKLY, &[], &ModelConfig::default());
        assert!(!design.has_seasonality(SeasonKind::Weekly));
    }

    #[test]
    fn test_scaled_time_spans_unit_interval() {
        let series = daily_series(11);
        let design = Design::from_history(&series, Frequency::DAILY, &[], &ModelConfig::default());
        let x = design.matrix(series.dates(), &[]);
        assert_eq!(x[(0, 1)], 0.0);
        assert!((x[(10, 1)] - 1.0).abs() < 1e-12);
    }
}
