//! Summary strengths of the fitted components.

use statrs::statistics::Statistics;

use super::model::ForecastFrame;

/// `|std(component) / std(total)|`, capped at 1.
///
/// Zero when the total is flat or either spread is undefined.
pub fn strength(component: &[f64], total: &[f64]) -> f64 {
    let component_std = component.std_dev();
    let total_std = total.std_dev();
    if component_std.is_finite() && total_std.is_finite() && total_std > 0.0 {
        (component_std / total_std).abs().min(1.0)
    } else {
        0.0
    }
}

impl ForecastFrame {
    /// Strength of the seasonal components (yearly plus weekly).
    pub fn seasonality_strength(&self) -> f64 {
        let seasonal: Vec<f64> = self.rows().iter().map(|r| r.yearly + r.weekly).collect();
        strength(&seasonal, &self.yhat())
    }

    pub fn trend_strength(&self) -> f64 {
        let trend: Vec<f64> = self.rows().iter().map(|r| r.trend).collect();
        strength(&trend, &self.yhat())
    }
}
