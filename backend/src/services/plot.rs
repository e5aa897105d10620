//! PNG charts of a fitted series and its forecast.
//!
//! The chart is drawn without any text so that rendering does not depend on
//! system fonts: grid, shaded confidence band, forecast line and the
//! observed history as dots.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::NaiveDate;
use image::{ImageFormat, RgbImage};
use plotters::prelude::*;
use thiserror::Error;
use tracing::warn;

use crate::forecast::ForecastFrame;

const HISTORY_COLOR: RGBColor = RGBColor(0, 0, 0);
const FORECAST_COLOR: RGBColor = RGBColor(0, 114, 178);
const GRID_COLOR: RGBColor = RGBColor(220, 220, 220);
const GRID_LINES: usize = 6;

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("nothing to plot")]
    Empty,
    #[error("invalid chart size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("drawing failed: {0}")]
    Draw(String),
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// What a chart shows: observations and the model's rows over them and
/// beyond.
#[derive(Debug, Clone, Copy)]
pub struct ChartData<'a> {
    pub history_dates: &'a [NaiveDate],
    pub history_values: &'a [f64],
    /// Fitted and forecast rows, in date order.
    pub model: &'a ForecastFrame,
}

impl ChartData<'_> {
    fn origin(&self) -> Option<NaiveDate> {
        let first_history = self.history_dates.first().copied();
        let first_model = self.model.rows().first().map(|r| r.date);
        match (first_history, first_model) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn bounds(&self) -> (f64, f64) {
        let values = self
            .history_values
            .iter()
            .copied()
            .chain(self.model.rows().iter().flat_map(|r| [r.yhat_lower, r.yhat_upper]))
            .filter(|v| v.is_finite());
        let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if !(lo.is_finite() && hi.is_finite()) {
            return (-1.0, 1.0);
        }
        let pad = if hi > lo { (hi - lo) * 0.05 } else { 1.0 };
        (lo - pad, hi + pad)
    }
}

fn day_offset(origin: NaiveDate, date: NaiveDate) -> f64 {
    (date - origin).num_days() as f64
}

fn draw_err<E: std::fmt::Display>(e: E) -> PlotError {
    PlotError::Draw(e.to_string())
}

/// Render the chart as PNG bytes.
pub fn render_png(data: &ChartData<'_>, width: u32, height: u32) -> Result<Vec<u8>, PlotError> {
    if width == 0 || height == 0 {
        return Err(PlotError::InvalidSize { width, height });
    }
    let origin = data.origin().ok_or(PlotError::Empty)?;
    let x_end = data
        .history_dates
        .iter()
        .copied()
        .chain(data.model.rows().iter().map(|r| r.date))
        .map(|d| day_offset(origin, d))
        .fold(1.0_f64, f64::max);
    let (y_lo, y_hi) = data.bounds();

    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .build_cartesian_2d(0.0..x_end, y_lo..y_hi)
            .map_err(draw_err)?;

        let grid = GRID_COLOR.stroke_width(1);
        for k in 0..=GRID_LINES {
            let y = y_lo + (y_hi - y_lo) * k as f64 / GRID_LINES as f64;
            let x = x_end * k as f64 / GRID_LINES as f64;
            chart
                .draw_series([
                    PathElement::new(vec![(0.0, y), (x_end, y)], grid),
                    PathElement::new(vec![(x, y_lo), (x, y_hi)], grid),
                ])
                .map_err(draw_err)?;
        }

        let rows = data.model.rows();
        if !rows.is_empty() {
            let band: Vec<(f64, f64)> = rows
                .iter()
                .map(|r| (day_offset(origin, r.date), r.yhat_upper))
                .chain(rows.iter().rev().map(|r| (day_offset(origin, r.date), r.yhat_lower)))
                .collect();
            chart
                .draw_series(std::iter::once(Polygon::new(band, FORECAST_COLOR.mix(0.2).filled())))
                .map_err(draw_err)?;

            chart
                .draw_series(LineSeries::new(
                    rows.iter().map(|r| (day_offset(origin, r.date), r.yhat)),
                    FORECAST_COLOR.stroke_width(2),
                ))
                .map_err(draw_err)?;
        }

        chart
            .draw_series(
                data.history_dates
                    .iter()
                    .zip(data.history_values)
                    .map(|(d, v)| Circle::new((day_offset(origin, *d), *v), 2, HISTORY_COLOR.filled())),
            )
            .map_err(draw_err)?;

        root.present().map_err(draw_err)?;
    }

    let image = RgbImage::from_raw(width, height, buffer).ok_or(PlotError::InvalidSize { width, height })?;
    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

/// Render the chart as a base64-encoded PNG.
pub fn render_base64(data: &ChartData<'_>, width: u32, height: u32) -> Result<String, PlotError> {
    Ok(STANDARD.encode(render_png(data, width, height)?))
}

/// Render the chart, logging a failure instead of returning it.
pub fn render_or_none(label: &str, data: &ChartData<'_>, width: u32, height: u32) -> Option<String> {
    match render_base64(data, width, height) {
        Ok(encoded) => Some(encoded),
        Err(e) => {
            warn!(chart = label, error = %e, "Chart rendering failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::ForecastRow;
    use chrono::Days;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn frame(start: NaiveDate, n: u64) -> ForecastFrame {
        ForecastFrame::new(
            (0..n)
                .map(|i| ForecastRow {
                    date: start + Days::new(i),
                    yhat: i as f64,
                    yhat_lower: i as f64 - 1.0,
                    yhat_upper: i as f64 + 1.0,
                    trend: i as f64,
                    yearly: 0.0,
                    weekly: 0.0,
                    extra_regressors: 0.0,
                })
                .collect(),
        )
    }

    #[test]
    fn test_render_png_signature() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = (0..10).map(|i| start + Days::new(i)).collect();
        let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let model = frame(start, 15);
        let data = ChartData {
            history_dates: &dates,
            history_values: &values,
            model: &model,
        };

        let png = render_png(&data, 320, 200).unwrap();
        assert_eq!(&png[..8], &PNG_SIGNATURE);

        let encoded = render_base64(&data, 320, 200).unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap(), png);
    }

    #[test]
    fn test_flat_series_renders() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = vec![start];
        let values = vec![5.0];
        let model = ForecastFrame::default();
        let data = ChartData {
            history_dates: &dates,
            history_values: &values,
            model: &model,
        };
        assert!(render_png(&data, 100, 80).is_ok());
    }

    #[test]
    fn test_empty_and_invalid_size() {
        let model = ForecastFrame::default();
        let data = ChartData {
            history_dates: &[],
            history_values: &[],
            model: &model,
        };
        assert!(matches!(render_png(&data, 100, 100), Err(PlotError::Empty)));
        assert!(matches!(
            render_png(&data, 0, 100),
            Err(PlotError::InvalidSize { .. })
        ));
        assert_eq!(render_or_none("test", &data, 100, 100), None);
    }
}
