//! HTTP server module.
//!
//! An axum router in front of the forecasting services.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  HTTP Layer (axum handlers)                               │
//! │  - JSON parsing, CORS, compression, error bodies          │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Service Layer (services/)                                │
//! │  - Request validation                                     │
//! │  - Demand and supplier pipelines, charts                  │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │  spawn_blocking
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Forecast Engine (forecast/)                              │
//! │  - Additive model fit and predict                         │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod dto;
pub mod error;
pub mod handlers;
pub mod listener;
pub mod router;
pub mod state;

pub use listener::{bind_first_available, BindError};
pub use router::create_router;
pub use state::AppState;
