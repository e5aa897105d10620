//! Request and response bodies of the HTTP API.
//!
//! Field names are camelCase on the wire. Requests are checked by
//! [`crate::services::validation`] before they are decoded into these types.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Keys of a historical point that identify an entity and are never
/// treated as regressors.
pub const RESERVED_POINT_KEYS: &[&str] = &["locationId", "modelId", "supplierId"];

/// Numeric fields of a point other than its targets, by name.
///
/// Non-numeric values (identifiers, labels) are skipped.
pub fn numeric_extras(extra: &BTreeMap<String, Value>) -> BTreeMap<String, f64> {
    extra
        .iter()
        .filter(|(key, _)| !RESERVED_POINT_KEYS.contains(&key.as_str()))
        .filter_map(|(key, value)| value.as_f64().map(|v| (key.clone(), v)))
        .collect()
}

/// Treat an explicit `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Requests
// =============================================================================

/// One historical observation of a demand request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandPoint {
    pub date: String,
    pub demand: f64,
    /// Every other field; numeric ones are regressors.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Body of `POST /predict/demand`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandRequest {
    pub historical_data: Vec<DemandPoint>,
    pub future_periods: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub future_regressors: BTreeMap<String, Vec<f64>>,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    /// `"daily"`, `"weekly"` or `"every N days"`; inferred when absent.
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub include_history: bool,
    #[serde(default)]
    pub include_plot: Option<bool>,
    /// Forecast regressors that have no future values instead of rejecting
    /// the request.
    #[serde(default, deserialize_with = "null_as_default")]
    pub project_missing_regressors: bool,
}

/// One historical observation of a supplier request. Either metric may be
/// null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierPoint {
    pub date: String,
    pub quality_rating: Option<f64>,
    pub lead_time_reliability: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Body of `POST /predict/supplier-performance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierPerformanceRequest {
    pub historical_data: Vec<SupplierPoint>,
    pub future_periods: usize,
    pub supplier_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub future_regressors: BTreeMap<String, Vec<f64>>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub include_history: bool,
    #[serde(default)]
    pub include_plot: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub project_missing_regressors: bool,
}

// =============================================================================
// Responses
// =============================================================================

/// A forecast value with its confidence bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// `YYYY-MM-DD`
    pub date: String,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastMetadata {
    pub confidence_interval: f64,
    pub seasonality_strength: f64,
    pub trend_strength: f64,
    pub frequency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandDebugInfo {
    pub data_points: usize,
    pub date_range: DateRange,
    pub regressors_used: Vec<String>,
    pub future_periods: usize,
    /// Regressors whose future values were projected by the service.
    pub generated_regressors: Vec<String>,
    pub density: f64,
}

/// Body of a successful `POST /predict/demand`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandResponse {
    pub forecast: Vec<ForecastPoint>,
    /// Base64 PNG chart.
    pub plot: Option<String>,
    pub location_id: Option<String>,
    pub model_id: Option<String>,
    pub metadata: ForecastMetadata,
    /// Future regressor values used for the forecast, supplied or projected.
    pub future_regressors: BTreeMap<String, Vec<f64>>,
    pub debug_info: DemandDebugInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierPlots {
    pub quality: Option<String>,
    pub lead_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierDebugInfo {
    pub data_points: usize,
    pub date_range: DateRange,
    pub regressors_used: Vec<String>,
    pub future_periods: usize,
    pub generated_regressors: Vec<String>,
    /// Rows dropped per metric because the metric was null.
    pub dropped_quality_rows: usize,
    pub dropped_lead_time_rows: usize,
    pub density: f64,
}

/// Body of a successful `POST /predict/supplier-performance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierPerformanceResponse {
    pub supplier_id: String,
    pub quality_forecast: Vec<ForecastPoint>,
    pub lead_time_forecast: Vec<ForecastPoint>,
    pub metadata: ForecastMetadata,
    pub plots: SupplierPlots,
    pub debug_info: SupplierDebugInfo,
}
