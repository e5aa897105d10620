//! Demand forecasting for a location/model pair.

use tracing::{error, info, instrument};

use super::pipeline;
use super::plot::{self, ChartData};
use super::regressors;
use super::{ServiceError, ServiceResult};
use crate::api::{numeric_extras, DemandDebugInfo, DemandRequest, DemandResponse, ForecastMetadata};
use crate::config::ForecastSettings;
use crate::forecast::ModelConfig;
use crate::models::{parse_date, Row, Table};

const TARGET: &str = "demand";

/// Build the input table of a demand request.
fn table(request: &DemandRequest) -> ServiceResult<Table> {
    let rows = request
        .historical_data
        .iter()
        .map(|point| {
            let date = parse_date(&point.date)?;
            Ok(Row::new(date)
                .with_target(TARGET, Some(point.demand))
                .with_regressors(numeric_extras(&point.extra)))
        })
        .collect::<ServiceResult<Vec<_>>>()?;
    Ok(Table::from_rows(rows)?)
}

/// Forecast demand `futurePeriods` ahead.
///
/// Rejects histories whose density falls below `settings.min_density`.
#[instrument(skip_all, fields(location = ?request.location_id, model = ?request.model_id))]
pub fn forecast_demand(request: &DemandRequest, settings: &ForecastSettings) -> ServiceResult<DemandResponse> {
    info!(
        points = request.historical_data.len(),
        periods = request.future_periods,
        "Received demand prediction request"
    );
    let table = table(request)?;
    let (series, history_regressors) = table.series(TARGET)?;

    let frequency = pipeline::frequency_for(series.dates(), request.frequency.as_deref());
    let quality = pipeline::assess(series.dates(), frequency, settings.max_gap_steps);
    if quality.density < settings.min_density {
        let detail = format!(
            "Only {:.2}% of periods have data points. Need at least {:.0}% coverage.",
            quality.density * 100.0,
            settings.min_density * 100.0
        );
        error!("{}", detail);
        return Err(ServiceError::invalid("Insufficient data density", vec![detail]));
    }

    let resolved = regressors::resolve(
        series.dates(),
        &history_regressors,
        &request.future_regressors,
        request.future_periods,
        frequency,
        request.project_missing_regressors,
    )?;
    if !resolved.future.is_empty() {
        info!("Added regressors: {}", resolved.names().join(", "));
    }

    let future_dates = frequency.future_dates(series.last_date(), request.future_periods)?;
    let config = ModelConfig::default().with_interval_width(settings.interval_width);
    let output = pipeline::fit_and_predict(
        &series,
        &history_regressors,
        &future_dates,
        &resolved.future,
        frequency,
        config,
    )?;
    let returned = output.returned(request.include_history);

    let plot = if request.include_plot.unwrap_or(settings.render_plots) {
        let model_rows = output.fitted.clone().chain(output.forecast.clone());
        let data = ChartData {
            history_dates: series.dates(),
            history_values: series.values(),
            model: &model_rows,
        };
        plot::render_or_none("demand", &data, settings.plot_width, settings.plot_height)
    } else {
        None
    };

    let metadata = ForecastMetadata {
        confidence_interval: settings.interval_width,
        seasonality_strength: returned.seasonality_strength(),
        trend_strength: returned.trend_strength(),
        frequency: frequency.to_string(),
    };
    let debug_info = DemandDebugInfo {
        data_points: series.len(),
        date_range: pipeline::date_range(series.first_date(), series.last_date()),
        regressors_used: resolved.names(),
        future_periods: request.future_periods,
        generated_regressors: resolved.generated.clone(),
        density: quality.density,
    };

    info!("Successfully generated demand forecast");
    Ok(DemandResponse {
        forecast: pipeline::to_points(&returned, |v| v),
        plot,
        location_id: request.location_id.clone(),
        model_id: request.model_id.clone(),
        metadata,
        future_regressors: resolved.future.into_map(),
        debug_info,
    })
}
