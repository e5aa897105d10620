#![allow(dead_code)]

use chrono::{Days, NaiveDate};
use serde_json::{json, Value};

pub fn day(offset: u64) -> String {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    (start + Days::new(offset)).format("%Y-%m-%d").to_string()
}

/// Daily demand with a weekly pattern and a slow upward drift.
pub fn demand_history(days: u64) -> Vec<Value> {
    (0..days)
        .map(|i| {
            let weekly = [0.0, 2.0, 4.0, 3.0, 1.0, -3.0, -5.0][(i % 7) as usize];
            json!({"date": day(i), "demand": 100.0 + 0.3 * i as f64 + weekly})
        })
        .collect()
}

pub fn demand_body(days: u64, periods: u64) -> Value {
    json!({
        "historicalData": demand_history(days),
        "futurePeriods": periods,
        "locationId": "LOC-1",
        "modelId": "MODEL-9",
        "includePlot": false
    })
}

/// Daily supplier history; every fifth quality rating is missing.
pub fn supplier_body(days: u64, periods: u64) -> Value {
    let points: Vec<Value> = (0..days)
        .map(|i| {
            let quality = if i % 5 == 4 {
                Value::Null
            } else {
                json!(0.85 + 0.002 * i as f64)
            };
            json!({
                "date": day(i),
                "qualityRating": quality,
                "leadTimeReliability": 0.9 - 0.001 * i as f64
            })
        })
        .collect();
    json!({
        "historicalData": points,
        "futurePeriods": periods,
        "supplierId": "SUP-42",
        "includePlot": false
    })
}
