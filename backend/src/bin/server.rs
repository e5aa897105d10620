//! Forecast HTTP Server Binary
//!
//! Main entry point for the forecasting REST API.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin forecast-server
//!
//! # Explicit configuration file
//! FORECAST_CONFIG=/etc/forecast.toml cargo run --bin forecast-server
//! ```
//!
//! # Environment Variables
//!
//! - `FORECAST_CONFIG`: Path to a TOML configuration file
//! - `HOST`: Server host (default: 0.0.0.0)
//! - `PORT`: Single port to bind (default: try 5001, 5002, 5000 in order)
//! - `FORECAST_MAX_PERIODS`: Largest accepted `futurePeriods`
//! - `RUST_LOG`: Log level (default: info)

use std::env;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use supply_forecast::config::ServiceConfig;
use supply_forecast::http::{bind_first_available, create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting forecast server");

    let config = ServiceConfig::load()?;
    let host = config.server.host.clone();
    let ports = config.server.ports.clone();

    let (listener, addr) = bind_first_available(&host, &ports).await?;
    let app = create_router(AppState::new(config));

    info!("Server listening on http://{}", addr);
    info!("Endpoints: POST /predict/demand, POST /predict/supplier-performance, GET /health");

    axum::serve(listener, app).await?;

    Ok(())
}
