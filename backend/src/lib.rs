//! # Supply Forecast
//!
//! Demand and supplier-performance forecasting service.
//!
//! This crate fits an additive time-series model (piecewise-linear trend,
//! Fourier seasonality, linear regressor effects) to request-supplied
//! history and returns point forecasts with confidence bounds and an
//! optional PNG chart. The service is exposed as a REST API via Axum.
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`api`]: Request and response bodies of the HTTP API
//! - [`config`]: Service configuration from file and environment
//! - [`models`]: Input shaping: dates, series, regressor columns
//! - [`forecast`]: The forecasting engine
//! - [`services`]: Validation, forecasting pipelines and chart rendering
//! - [`http`]: Axum-based HTTP server and request handlers

pub mod api;
pub mod config;
pub mod forecast;
pub mod models;
pub mod services;

#[cfg(feature = "http-server")]
pub mod http;
