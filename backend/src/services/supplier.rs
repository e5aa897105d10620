//! Supplier performance forecasting: quality rating and lead-time
//! reliability, each modelled on its own.

use tracing::{info, instrument, warn};

use super::pipeline::{self, FitOutput};
use super::plot::{self, ChartData};
use super::regressors::{self, ResolvedRegressors};
use super::ServiceResult;
use crate::api::{
    numeric_extras, ForecastMetadata, ForecastPoint, SupplierDebugInfo, SupplierPerformanceRequest,
    SupplierPerformanceResponse, SupplierPlots,
};
use crate::config::ForecastSettings;
use crate::forecast::{ModelConfig, SeasonalityMode};
use chrono::NaiveDate;

use crate::models::{parse_date, Frequency, Row, Table, TimeSeries};

const QUALITY: &str = "qualityRating";
const LEAD_TIME: &str = "leadTimeReliability";

/// Trend flexibility per metric. Lead times shift more abruptly.
const QUALITY_CHANGEPOINT_PRIOR: f64 = 0.05;
const LEAD_TIME_CHANGEPOINT_PRIOR: f64 = 0.1;

fn table(request: &SupplierPerformanceRequest) -> ServiceResult<Table> {
    let rows = request
        .historical_data
        .iter()
        .map(|point| {
            let date = parse_date(&point.date)?;
            Ok(Row::new(date)
                .with_target(QUALITY, point.quality_rating)
                .with_target(LEAD_TIME, point.lead_time_reliability)
                .with_regressors(numeric_extras(&point.extra)))
        })
        .collect::<ServiceResult<Vec<_>>>()?;
    Ok(Table::from_rows(rows)?)
}

fn model_config(changepoint_prior: f64, frequency: Frequency, settings: &ForecastSettings) -> ModelConfig {
    let weekly = if frequency.step_days() < 7 {
        SeasonalityMode::On
    } else {
        SeasonalityMode::Off
    };
    ModelConfig::default()
        .with_interval_width(settings.interval_width)
        .with_changepoint_prior_scale(changepoint_prior)
        .with_yearly_seasonality(SeasonalityMode::On)
        .with_weekly_seasonality(weekly)
}

/// Scores and reliabilities are shares.
fn clamp_unit(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

struct MetricForecast {
    series: TimeSeries,
    output: FitOutput,
    dropped: usize,
}

fn forecast_metric(
    table: &Table,
    metric: &str,
    changepoint_prior: f64,
    frequency: Frequency,
    future_dates: &[NaiveDate],
    resolved: &ResolvedRegressors,
    settings: &ForecastSettings,
) -> ServiceResult<MetricForecast> {
    info!(metric, "Generating forecast");
    let dropped = table.null_count(metric);
    if dropped > 0 {
        warn!(metric, rows = dropped, "Found null values, dropping rows");
    }

    let (series, history_regressors) = table.series(metric)?;
    let output = pipeline::fit_and_predict(
        &series,
        &history_regressors,
        future_dates,
        &resolved.future,
        frequency,
        model_config(changepoint_prior, frequency, settings),
    )?;
    Ok(MetricForecast {
        series,
        output,
        dropped,
    })
}

impl MetricForecast {
    fn points(&self, include_history: bool) -> Vec<ForecastPoint> {
        pipeline::to_points(&self.output.returned(include_history), clamp_unit)
    }

    fn plot(&self, label: &str, settings: &ForecastSettings) -> Option<String> {
        let rows = self.output.fitted.clone().chain(self.output.forecast.clone());
        let data = ChartData {
            history_dates: self.series.dates(),
            history_values: self.series.values(),
            model: &rows,
        };
        plot::render_or_none(label, &data, settings.plot_width, settings.plot_height)
    }
}

/// Forecast both supplier metrics `futurePeriods` ahead.
///
/// Values and bounds are clamped to `[0, 1]`. Low density only warns.
#[instrument(skip_all, fields(supplier = %request.supplier_id))]
pub fn forecast_supplier_performance(
    request: &SupplierPerformanceRequest,
    settings: &ForecastSettings,
) -> ServiceResult<SupplierPerformanceResponse> {
    info!(
        points = request.historical_data.len(),
        periods = request.future_periods,
        "Received supplier performance request"
    );
    let table = table(request)?;

    let frequency = pipeline::frequency_for(table.dates(), request.frequency.as_deref());
    let quality = pipeline::assess(table.dates(), frequency, settings.max_gap_steps);
    if quality.density < settings.min_density {
        warn!(
            "Low data density: {:.2}%. Results may be less reliable.",
            quality.density * 100.0
        );
    }

    let resolved = regressors::resolve(
        table.dates(),
        table.regressors(),
        &request.future_regressors,
        request.future_periods,
        frequency,
        request.project_missing_regressors,
    )?;
    // Both metrics share the horizon after the last observed row, whichever
    // metric is null there
    let future_dates = frequency.future_dates(table.last_date(), request.future_periods)?;

    let quality_fc = forecast_metric(
        &table,
        QUALITY,
        QUALITY_CHANGEPOINT_PRIOR,
        frequency,
        &future_dates,
        &resolved,
        settings,
    )?;
    let lead_time_fc = forecast_metric(
        &table,
        LEAD_TIME,
        LEAD_TIME_CHANGEPOINT_PRIOR,
        frequency,
        &future_dates,
        &resolved,
        settings,
    )?;

    let quality_rows = quality_fc.output.returned(request.include_history);
    let lead_time_rows = lead_time_fc.output.returned(request.include_history);
    let metadata = ForecastMetadata {
        confidence_interval: settings.interval_width,
        seasonality_strength: (quality_rows.seasonality_strength()
            + lead_time_rows.seasonality_strength())
            / 2.0,
        trend_strength: (quality_rows.trend_strength() + lead_time_rows.trend_strength()) / 2.0,
        frequency: frequency.to_string(),
    };

    let plots = if request.include_plot.unwrap_or(settings.render_plots) {
        SupplierPlots {
            quality: quality_fc.plot("quality", settings),
            lead_time: lead_time_fc.plot("leadTime", settings),
        }
    } else {
        SupplierPlots {
            quality: None,
            lead_time: None,
        }
    };

    let debug_info = SupplierDebugInfo {
        data_points: table.len(),
        date_range: pipeline::date_range(table.first_date(), table.last_date()),
        regressors_used: resolved.names(),
        future_periods: request.future_periods,
        generated_regressors: resolved.generated.clone(),
        dropped_quality_rows: quality_fc.dropped,
        dropped_lead_time_rows: lead_time_fc.dropped,
        density: quality.density,
    };

    info!("Successfully generated supplier performance forecast");
    Ok(SupplierPerformanceResponse {
        supplier_id: request.supplier_id.clone(),
        quality_forecast: quality_fc.points(request.include_history),
        lead_time_forecast: lead_time_fc.points(request.include_history),
        metadata,
        plots,
        debug_info,
    })
}
