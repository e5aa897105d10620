#![cfg(feature = "http-server")]

mod support;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use supply_forecast::config::ServiceConfig;
use supply_forecast::http::{create_router, AppState};

use support::{demand_body, supplier_body};

fn app() -> Router {
    create_router(AppState::new(ServiceConfig::default()))
}

async fn post_json(path: &str, body: String) -> (StatusCode, Value) {
    let response = app()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn assert_bounds_ordered(points: &Value) {
    for p in points.as_array().unwrap() {
        let (lower, value, upper) = (
            p["lower"].as_f64().unwrap(),
            p["value"].as_f64().unwrap(),
            p["upper"].as_f64().unwrap(),
        );
        assert!(lower <= value && value <= upper, "{}", p);
    }
}

#[tokio::test]
async fn test_health() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_demand_forecast() {
    let (status, body) = post_json("/predict/demand", demand_body(90, 30).to_string()).await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let forecast = &body["forecast"];
    assert_eq!(forecast.as_array().unwrap().len(), 30);
    assert_eq!(forecast[0]["date"], "2024-03-31");
    assert_bounds_ordered(forecast);

    assert_eq!(body["locationId"], "LOC-1");
    assert_eq!(body["modelId"], "MODEL-9");
    assert_eq!(body["plot"], Value::Null);
    assert_eq!(body["metadata"]["confidenceInterval"], 0.95);
    assert_eq!(body["debugInfo"]["dataPoints"], 90);
    assert_eq!(body["debugInfo"]["dateRange"]["start"], "2024-01-01");
}

#[tokio::test]
async fn test_demand_plot_is_base64_png() {
    let mut body = demand_body(30, 7);
    body["includePlot"] = json!(true);
    let (status, body) = post_json("/predict/demand", body.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    // base64 of the PNG signature
    assert!(body["plot"].as_str().unwrap().starts_with("iVBORw0KGgo"));
}

#[tokio::test]
async fn test_missing_historical_data() {
    let (status, body) = post_json("/predict/demand", json!({"futurePeriods": 5}).to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
    assert_eq!(body["message"], "Invalid input data");
    assert_eq!(body["details"][0], "Missing required field: historicalData");
}

#[tokio::test]
async fn test_regressor_without_future_values() {
    let mut body = demand_body(40, 5);
    for (i, point) in body["historicalData"].as_array_mut().unwrap().iter_mut().enumerate() {
        point["mti"] = json!(50.0 + (i % 3) as f64);
    }
    let (status, body) = post_json("/predict/demand", body.to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"][0].as_str().unwrap().contains("mti"));
}

#[tokio::test]
async fn test_regressor_projection_on_request() {
    let mut body = demand_body(40, 5);
    for (i, point) in body["historicalData"].as_array_mut().unwrap().iter_mut().enumerate() {
        point["mti"] = json!(50.0 + (i % 3) as f64);
    }
    body["projectMissingRegressors"] = json!(true);
    let (status, body) = post_json("/predict/demand", body.to_string()).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["debugInfo"]["generatedRegressors"], json!(["mti"]));
    assert_eq!(body["futureRegressors"]["mti"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_supplier_forecast_clamped() {
    let (status, body) =
        post_json("/predict/supplier-performance", supplier_body(60, 20).to_string()).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["supplierId"], "SUP-42");

    for key in ["qualityForecast", "leadTimeForecast"] {
        let points = &body[key];
        assert_eq!(points.as_array().unwrap().len(), 20);
        assert_bounds_ordered(points);
        for p in points.as_array().unwrap() {
            for field in ["value", "lower", "upper"] {
                let v = p[field].as_f64().unwrap();
                assert!((0.0..=1.0).contains(&v), "{} = {}", field, v);
            }
        }
    }
    assert_eq!(body["debugInfo"]["droppedQualityRows"], 12);
}

#[tokio::test]
async fn test_supplier_requires_supplier_id() {
    let mut body = supplier_body(20, 5);
    body.as_object_mut().unwrap().remove("supplierId");
    let (status, body) = post_json("/predict/supplier-performance", body.to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0], "Missing required field: supplierId");
}

#[tokio::test]
async fn test_malformed_json() {
    let (status, body) = post_json("/predict/demand", "{not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_horizon_out_of_range() {
    let (status, body) = post_json("/predict/demand", demand_body(30, 0).to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"][0].as_str().unwrap().contains("futurePeriods"));
}

#[tokio::test]
async fn test_identical_requests_identical_forecasts() {
    let request = demand_body(60, 10).to_string();
    let (_, a) = post_json("/predict/demand", request.clone()).await;
    let (_, b) = post_json("/predict/demand", request).await;
    assert_eq!(a["forecast"], b["forecast"]);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let response = app()
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/predict/demand")
                .header(header::ORIGIN, "http://example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_forecast_failure_is_500_and_server_keeps_serving() {
    let app = app();
    let single = json!({
        "historicalData": [{"date": "2024-01-01", "demand": 10.0}],
        "futurePeriods": 3
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/predict/demand")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(single.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "FORECAST_FAILED");

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/predict/demand")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(demand_body(30, 5).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_null_optional_fields_accepted() {
    let mut body = supplier_body(30, 5);
    body["includeHistory"] = Value::Null;
    body["futureRegressors"] = Value::Null;
    body["projectMissingRegressors"] = Value::Null;
    let (status, body) = post_json("/predict/supplier-performance", body.to_string()).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["qualityForecast"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_oversized_frequency_step_rejected() {
    let mut body = demand_body(30, 5);
    body["frequency"] = json!("every 3000000000000000000 days");
    let (status, body) = post_json("/predict/demand", body.to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
    assert!(body["details"][0].as_str().unwrap().contains("frequency"));
}
