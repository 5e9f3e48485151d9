// Main entry point for the scraper API

use std::sync::Arc;

use anyhow::{Context, Result};
use scrape_orchestrator::{
    FetchCoordinator, HtmlExtractor, JobStore, MemoryJobStore, PostgresJobStore,
};
use scraper_api::{build_app, AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scrape_orchestrator=debug,scraper_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting scraper API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        cache_ttl_ms = config.orchestrator.cache_ttl_ms,
        rate_limit_max_requests = config.orchestrator.rate_limit_max_requests,
        rate_limit_window_ms = config.orchestrator.rate_limit_window_ms,
        batch_concurrency = config.orchestrator.batch.concurrency,
        "Configuration loaded"
    );

    // Job history store
    let job_store: Arc<dyn JobStore> = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let store = PostgresJobStore::new(database_url)
                .await
                .context("Failed to connect to job database")?;
            tracing::info!("Database connected");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, job history is kept in memory");
            Arc::new(MemoryJobStore::new())
        }
    };

    let extractor = HtmlExtractor::new().context("Failed to create HTML extractor")?;
    let coordinator = Arc::new(FetchCoordinator::new(
        config.orchestrator.clone(),
        Arc::new(extractor),
        job_store,
    ));

    let app = build_app(AppState::new(coordinator, config.default_site_url.clone()));

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
