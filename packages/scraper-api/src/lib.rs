//! HTTP surface for the scrape orchestrator.
//!
//! Handlers are thin: they parse the request, call the
//! [`FetchCoordinator`](scrape_orchestrator::FetchCoordinator) or
//! [`BatchScheduler`](scrape_orchestrator::BatchScheduler), and map errors
//! to status codes.

pub mod app;
pub mod config;
pub mod error;
pub mod routes;

pub use app::{build_app, AppState};
pub use config::Config;
pub use error::{ApiError, ApiResult};
