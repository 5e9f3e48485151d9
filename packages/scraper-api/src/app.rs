//! Application setup and router configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, Method},
    routing::{delete, get, post},
    Router,
};
use scrape_orchestrator::{BatchScheduler, FetchCoordinator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes::{
    category_cache_status, clear_cache, get_job, liveness_handler, product_cache_status,
    refetch_product, scrape_category, scrape_navigation, scrape_product, scrape_product_batch,
    scraper_health_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<FetchCoordinator>,
    pub scheduler: Arc<BatchScheduler>,
    pub default_site_url: String,
}

impl AppState {
    pub fn new(coordinator: Arc<FetchCoordinator>, default_site_url: impl Into<String>) -> Self {
        let scheduler = Arc::new(BatchScheduler::new(coordinator.clone()));
        Self {
            coordinator,
            scheduler,
            default_site_url: default_site_url.into(),
        }
    }
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    // CORS configuration - allow any origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE]);

    let scraper = Router::new()
        .route("/navigation/scrape", get(scrape_navigation))
        .route("/category/scrape", post(scrape_category))
        .route("/category/cache-status", get(category_cache_status))
        .route("/product/scrape", post(scrape_product))
        .route("/product/batch", post(scrape_product_batch))
        .route("/product/cache-status", get(product_cache_status))
        .route("/product/refetch", post(refetch_product))
        .route("/jobs/:job_id", get(get_job))
        .route("/cache", delete(clear_cache))
        .route("/health", get(scraper_health_handler))
        .route("/stats", get(scraper_health_handler));

    Router::new()
        .nest("/api/scraper", scraper)
        // Liveness probe
        .route("/health", get(liveness_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
