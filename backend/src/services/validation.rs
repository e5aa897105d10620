//! Structural checks on raw request bodies.
//!
//! Validation runs on the untyped JSON so that every problem can be reported
//! at once, in words a client can act on, before anything is decoded or
//! fitted.

use serde_json::{Map, Value};

use super::{ServiceError, ServiceResult};
use crate::models::{parse_date, Frequency};

/// Most per-point problems listed before the rest are summarised.
const MAX_POINT_ISSUES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Array,
    Integer,
    String,
}

impl Kind {
    fn name(self) -> &'static str {
        match self {
            Kind::Array => "array",
            Kind::Integer => "integer",
            Kind::String => "string",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Kind::Array => value.is_array(),
            Kind::Integer => value.is_i64() || value.is_u64(),
            Kind::String => value.is_string(),
        }
    }
}

/// How a per-point metric may be given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metric {
    Required,
    Nullable,
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Problems with a `POST /predict/demand` body. Empty when the body is usable.
pub fn validate_demand(body: &Value, max_future_periods: usize) -> Vec<String> {
    validate(
        body,
        &[("historicalData", Kind::Array), ("futurePeriods", Kind::Integer)],
        &[("demand", Metric::Required)],
        max_future_periods,
    )
}

/// Problems with a `POST /predict/supplier-performance` body.
pub fn validate_supplier(body: &Value, max_future_periods: usize) -> Vec<String> {
    let mut issues = validate(
        body,
        &[
            ("historicalData", Kind::Array),
            ("futurePeriods", Kind::Integer),
            ("supplierId", Kind::String),
        ],
        &[
            ("qualityRating", Metric::Nullable),
            ("leadTimeReliability", Metric::Nullable),
        ],
        max_future_periods,
    );
    if let Some(id) = body.get("supplierId").and_then(Value::as_str) {
        if id.trim().is_empty() {
            issues.push("supplierId must not be empty".to_string());
        }
    }
    issues
}

/// Turn a list of issues into the error returned to the client.
pub fn ensure_valid(issues: Vec<String>) -> ServiceResult<()> {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::invalid("Invalid input data", issues))
    }
}

fn validate(
    body: &Value,
    required: &[(&str, Kind)],
    metrics: &[(&str, Metric)],
    max_future_periods: usize,
) -> Vec<String> {
    let Some(object) = body.as_object() else {
        return vec![format!(
            "Request body must be a JSON object, got {}",
            type_name(body)
        )];
    };

    let mut issues = Vec::new();
    for (field, kind) in required {
        match object.get(*field) {
            None => issues.push(format!("Missing required field: {}", field)),
            Some(value) if !kind.matches(value) => issues.push(format!(
                "Invalid type for {}: expected {}, got {}",
                field,
                kind.name(),
                type_name(value)
            )),
            Some(_) => {}
        }
    }
    if !issues.is_empty() {
        return issues;
    }

    if let Some(periods) = object.get("futurePeriods") {
        let in_range = periods
            .as_u64()
            .is_some_and(|p| p >= 1 && p <= max_future_periods as u64);
        if !in_range {
            issues.push(format!(
                "futurePeriods must be between 1 and {}, got {}",
                max_future_periods, periods
            ));
        }
    }

    let points = object
        .get("historicalData")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if points.is_empty() {
        issues.push("historicalData array is empty".to_string());
    } else {
        issues.extend(point_issues(points, metrics));
    }

    issues.extend(optional_field_issues(object));
    issues
}

fn point_issues(points: &[Value], metrics: &[(&str, Metric)]) -> Vec<String> {
    let mut issues = Vec::new();
    for (i, point) in points.iter().enumerate() {
        let Some(point) = point.as_object() else {
            issues.push(format!(
                "historicalData[{}] must be an object, got {}",
                i,
                type_name(point)
            ));
            continue;
        };

        match point.get("date") {
            None => issues.push(format!(
                "Missing required field in historicalData points: date (index {})",
                i
            )),
            Some(Value::String(raw)) => {
                if let Err(e) = parse_date(raw) {
                    issues.push(format!("historicalData[{}].date: {}", i, e));
                }
            }
            Some(other) => issues.push(format!(
                "historicalData[{}].date must be a string, got {}",
                i,
                type_name(other)
            )),
        }

        for (field, metric) in metrics {
            match (point.get(*field), metric) {
                (None, _) => issues.push(format!(
                    "Missing required field in historicalData points: {} (index {})",
                    field, i
                )),
                (Some(Value::Number(_)), _) | (Some(Value::Null), Metric::Nullable) => {}
                (Some(other), _) => issues.push(format!(
                    "historicalData[{}].{} must be a number, got {}",
                    i,
                    field,
                    type_name(other)
                )),
            }
        }
    }

    if issues.len() > MAX_POINT_ISSUES {
        let rest = issues.len() - MAX_POINT_ISSUES;
        issues.truncate(MAX_POINT_ISSUES);
        issues.push(format!("... and {} more problems in historicalData", rest));
    }
    issues
}

fn optional_field_issues(object: &Map<String, Value>) -> Vec<String> {
    let mut issues = Vec::new();

    if let Some(regressors) = object.get("futureRegressors") {
        match regressors {
            Value::Object(map) => {
                for (name, values) in map {
                    let numeric = values
                        .as_array()
                        .is_some_and(|a| a.iter().all(Value::is_number));
                    if !numeric {
                        issues.push(format!(
                            "futureRegressors.{} must be an array of numbers",
                            name
                        ));
                    }
                }
            }
            Value::Null => {}
            other => issues.push(format!(
                "Invalid type for futureRegressors: expected object, got {}",
                type_name(other)
            )),
        }
    }

    match object.get("frequency") {
        None | Some(Value::Null) => {}
        Some(Value::String(raw)) if Frequency::parse(raw).is_some() => {}
        Some(other) => issues.push(format!(
            "frequency must be \"daily\", \"weekly\" or \"every N days\", got {}",
            other
        )),
    }

    for flag in ["includeHistory", "includePlot", "projectMissingRegressors"] {
        match object.get(flag) {
            None | Some(Value::Null) | Some(Value::Bool(_)) => {}
            Some(other) => issues.push(format!(
                "Invalid type for {}: expected boolean, got {}",
                flag,
                type_name(other)
            )),
        }
    }

    for id in ["locationId", "modelId"] {
        match object.get(id) {
            None | Some(Value::Null) | Some(Value::String(_)) => {}
            Some(other) => issues.push(format!(
                "Invalid type for {}: expected string, got {}",
                id,
                type_name(other)
            )),
        }
    }
    issues
}
