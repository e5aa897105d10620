//! Time series and tabular input types shared by the forecast adapters.
//!
//! Requests arrive as loosely-typed JSON points. They are shaped here into a
//! [`Table`]: rows sorted by date, one column per target metric and one
//! column per external regressor. A [`TimeSeries`] for a single metric is
//! then cut out of the table, dropping rows where that metric is null.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// Errors raised while shaping request data into series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("series is empty")]
    Empty,
    #[error("invalid date '{value}': expected YYYY-MM-DD or an RFC 3339 timestamp")]
    InvalidDate { value: String },
    #[error("duplicate date {0}: each date may appear only once")]
    DuplicateDate(NaiveDate),
    #[error("dates must be strictly increasing ({previous} is followed by {next})")]
    NotIncreasing { previous: NaiveDate, next: NaiveDate },
    #[error("series has {dates} dates but {values} values")]
    LengthMismatch { dates: usize, values: usize },
    #[error("non-finite value at {0}")]
    NonFiniteValue(NaiveDate),
    #[error("'{0}' has no non-null values")]
    NoValues(String),
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("regressor '{name}' is missing a value at {date}")]
    MissingRegressorValue { name: String, date: NaiveDate },
    #[error("regressor '{name}' has {got} values, expected {expected}")]
    RegressorLength {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("regressor '{name}' contains a non-finite value")]
    NonFiniteRegressor { name: String },
    #[error("date arithmetic overflowed past {0}")]
    DateOutOfRange(NaiveDate),
}

/// Parse a request date.
///
/// Accepts plain dates and timestamps. Timestamps with an offset are converted
/// to UTC before the time of day is dropped.
pub fn parse_date(raw: &str) -> Result<NaiveDate, SeriesError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc).date_naive());
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
    ] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(ts.date());
        }
    }
    Err(SeriesError::InvalidDate {
        value: raw.to_string(),
    })
}

/// Longest step a request may ask for with `every N days`.
pub const MAX_STEP_DAYS: u64 = 3660;

/// Spacing between consecutive observations, in whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frequency {
    step_days: u64,
}

impl Frequency {
    pub const DAILY: Frequency = Frequency { step_days: 1 };
    pub const WEEKLY: Frequency = Frequency { step_days: 7 };

    /// A frequency of one observation every `days` days. Zero is rejected.
    pub fn every(days: u64) -> Option<Self> {
        (days > 0).then_some(Self { step_days: days })
    }

    /// Parse a request override (`daily`, `weekly`, or `every N days`).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_ascii_lowercase();
        match raw.as_str() {
            "d" | "day" | "daily" => Some(Self::DAILY),
            "w" | "week" | "weekly" => Some(Self::WEEKLY),
            other => other
                .strip_prefix("every ")
                .and_then(|rest| rest.strip_suffix(" days"))
                .and_then(|n| n.trim().parse::<u64>().ok())
                .filter(|n| *n <= MAX_STEP_DAYS)
                .and_then(Self::every),
        }
    }

    /// Infer the frequency as the median gap between sorted dates.
    ///
    /// Fewer than two dates gives daily.
    pub fn infer(dates: &[NaiveDate]) -> Self {
        let mut gaps: Vec<i64> = dates
            .windows(2)
            .map(|w| (w[1] - w[0]).num_days())
            .filter(|d| *d > 0)
            .collect();
        if gaps.is_empty() {
            return Self::DAILY;
        }
        gaps.sort_unstable();
        let median = gaps[(gaps.len() - 1) / 2];
        Self::every(median as u64).unwrap_or(Self::DAILY)
    }

    pub fn step_days(&self) -> u64 {
        self.step_days
    }

    /// The date `periods` steps after `date`.
    pub fn advance(&self, date: NaiveDate, periods: u64) -> Result<NaiveDate, SeriesError> {
        periods
            .checked_mul(self.step_days)
            .and_then(|days| date.checked_add_days(Days::new(days)))
            .ok_or(SeriesError::DateOutOfRange(date))
    }

    /// The `horizon` dates following `last`, one step apart.
    pub fn future_dates(&self, last: NaiveDate, horizon: usize) -> Result<Vec<NaiveDate>, SeriesError> {
        (1..=horizon as u64).map(|k| self.advance(last, k)).collect()
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step_days {
            1 => write!(f, "daily"),
            7 => write!(f, "weekly"),
            n => write!(f, "every {} days", n),
        }
    }
}

/// A stretch between two consecutive observations longer than allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: i64,
}

/// A single metric observed on strictly increasing dates.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self, SeriesError> {
        if dates.len() != values.len() {
            return Err(SeriesError::LengthMismatch {
                dates: dates.len(),
                values: values.len(),
            });
        }
        if dates.is_empty() {
            return Err(SeriesError::Empty);
        }
        for w in dates.windows(2) {
            if w[0] == w[1] {
                return Err(SeriesError::DuplicateDate(w[0]));
            }
            if w[0] > w[1] {
                return Err(SeriesError::NotIncreasing {
                    previous: w[0],
                    next: w[1],
                });
            }
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(SeriesError::NonFiniteValue(dates[i]));
        }
        Ok(Self { dates, values })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.dates[0]
    }

    pub fn last_date(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    /// Days between the first and last observation.
    pub fn span_days(&self) -> i64 {
        (self.last_date() - self.first_date()).num_days()
    }

    pub fn frequency(&self) -> Frequency {
        Frequency::infer(&self.dates)
    }

    /// Share of expected periods that carry an observation.
    pub fn density(&self, frequency: Frequency) -> f64 {
        density(&self.dates, frequency)
    }

    /// Gaps longer than `max_steps` periods.
    pub fn gaps(&self, frequency: Frequency, max_steps: u64) -> Vec<Gap> {
        gaps(&self.dates, frequency, max_steps)
    }
}

pub(crate) fn density(dates: &[NaiveDate], frequency: Frequency) -> f64 {
    let (Some(first), Some(last)) = (dates.first(), dates.last()) else {
        return 0.0;
    };
    let span = (*last - *first).num_days().max(0) as f64;
    let expected = (span / frequency.step_days() as f64).floor() + 1.0;
    dates.len() as f64 / expected
}

pub(crate) fn gaps(dates: &[NaiveDate], frequency: Frequency, max_steps: u64) -> Vec<Gap> {
    let limit = i64::try_from(max_steps.saturating_mul(frequency.step_days())).unwrap_or(i64::MAX);
    dates
        .windows(2)
        .filter_map(|w| {
            let days = (w[1] - w[0]).num_days();
            (days > limit).then_some(Gap {
                start: w[0],
                end: w[1],
                days,
            })
        })
        .collect()
}

/// Named regressor columns, all of the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegressorSet {
    columns: BTreeMap<String, Vec<f64>>,
}

impl RegressorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column. Every column must have the same length as the first one.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<(), SeriesError> {
        let name = name.into();
        if let Some(expected) = self.row_count() {
            if values.len() != expected {
                return Err(SeriesError::RegressorLength {
                    name,
                    expected,
                    got: values.len(),
                });
            }
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(SeriesError::NonFiniteRegressor { name });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Length of the columns, or `None` when the set is empty.
    pub fn row_count(&self) -> Option<usize> {
        self.columns.values().next().map(Vec::len)
    }

    pub fn into_map(self) -> BTreeMap<String, Vec<f64>> {
        self.columns
    }

    fn select_rows(&self, keep: &[bool]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| {
                let kept = values
                    .iter()
                    .zip(keep)
                    .filter_map(|(v, k)| k.then_some(*v))
                    .collect();
                (name.clone(), kept)
            })
            .collect();
        Self { columns }
    }
}

/// One input row: a date, target metrics (possibly null) and regressors.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub date: NaiveDate,
    pub targets: BTreeMap<String, Option<f64>>,
    pub regressors: BTreeMap<String, f64>,
}

impl Row {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            targets: BTreeMap::new(),
            regressors: BTreeMap::new(),
        }
    }

    pub fn with_target(mut self, name: &str, value: Option<f64>) -> Self {
        self.targets.insert(name.to_string(), value);
        self
    }

    pub fn with_regressors(mut self, regressors: BTreeMap<String, f64>) -> Self {
        self.regressors = regressors;
        self
    }
}

/// Rows sorted by date with aligned target and regressor columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    dates: Vec<NaiveDate>,
    targets: BTreeMap<String, Vec<Option<f64>>>,
    regressors: RegressorSet,
}

impl Table {
    /// Assemble rows into columns.
    ///
    /// Rows are sorted by date. Duplicate dates are rejected, as is a row
    /// that lacks a regressor some other row carries.
    pub fn from_rows(mut rows: Vec<Row>) -> Result<Self, SeriesError> {
        if rows.is_empty() {
            return Err(SeriesError::Empty);
        }
        rows.sort_by_key(|r| r.date);
        if let Some(w) = rows.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(SeriesError::DuplicateDate(w[0].date));
        }

        let target_names: BTreeSet<&String> = rows.iter().flat_map(|r| r.targets.keys()).collect();
        let regressor_names: BTreeSet<&String> =
            rows.iter().flat_map(|r| r.regressors.keys()).collect();

        let mut targets = BTreeMap::new();
        for name in target_names {
            let column = rows
                .iter()
                .map(|r| r.targets.get(name).copied().flatten())
                .collect::<Vec<_>>();
            targets.insert(name.clone(), column);
        }

        let mut regressors = RegressorSet::new();
        for name in regressor_names {
            let column = rows
                .iter()
                .map(|r| {
                    r.regressors
                        .get(name)
                        .copied()
                        .ok_or_else(|| SeriesError::MissingRegressorValue {
                            name: name.clone(),
                            date: r.date,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            regressors.insert(name.clone(), column)?;
        }

        Ok(Self {
            dates: rows.iter().map(|r| r.date).collect(),
            targets,
            regressors,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.dates[0]
    }

    pub fn last_date(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    pub fn regressors(&self) -> &RegressorSet {
        &self.regressors
    }

    /// Number of rows where `target` is null.
    pub fn null_count(&self, target: &str) -> usize {
        self.targets
            .get(target)
            .map_or(self.dates.len(), |c| c.iter().filter(|v| v.is_none()).count())
    }

    /// Cut out the series for `target` with its aligned regressors.
    ///
    /// Rows where the target is null are dropped from both.
    pub fn series(&self, target: &str) -> Result<(TimeSeries, RegressorSet), SeriesError> {
        let column = self
            .targets
            .get(target)
            .ok_or_else(|| SeriesError::UnknownColumn(target.to_string()))?;
        let keep: Vec<bool> = column.iter().map(Option::is_some).collect();
        if !keep.iter().any(|k| *k) {
            return Err(SeriesError::NoValues(target.to_string()));
        }

        let (dates, values): (Vec<_>, Vec<_>) = self
            .dates
            .iter()
            .zip(column)
            .filter_map(|(d, v)| v.map(|v| (*d, v)))
            .unzip();

        Ok((TimeSeries::new(dates, values)?, self.regressors.select_rows(&keep)))
    }
}
