use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use scrape_orchestrator::{BatchConfig, OrchestratorConfig};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Job history goes to PostgreSQL when set, otherwise stays in memory
    pub database_url: Option<String>,
    /// Site scraped by the navigation endpoint when no `siteUrl` is given
    pub default_site_url: String,
    pub orchestrator: OrchestratorConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = OrchestratorConfig::default();
        let orchestrator = OrchestratorConfig {
            cache_ttl_ms: parse_or("SCRAPER_CACHE_TTL_MS", defaults.cache_ttl_ms)?,
            rate_limit_window_ms: parse_or("SCRAPER_RATE_LIMIT_WINDOW_MS", defaults.rate_limit_window_ms)?,
            rate_limit_max_requests: parse_or(
                "SCRAPER_RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            )?,
            extraction_timeout_ms: parse_or(
                "SCRAPER_EXTRACTION_TIMEOUT_MS",
                defaults.extraction_timeout_ms,
            )?,
            batch: BatchConfig {
                concurrency: parse_or("SCRAPER_BATCH_CONCURRENCY", defaults.batch.concurrency)?,
                inter_batch_delay_ms: parse_or(
                    "SCRAPER_BATCH_DELAY_MS",
                    defaults.batch.inter_batch_delay_ms,
                )?,
            },
            max_retries: parse_or("SCRAPER_MAX_RETRIES", defaults.max_retries)?,
            retry_backoff_ms: parse_or("SCRAPER_RETRY_BACKOFF_MS", defaults.retry_backoff_ms)?,
        };

        Ok(Self {
            port: parse_or("PORT", 8080)?,
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            default_site_url: env::var("SCRAPER_DEFAULT_SITE_URL")
                .unwrap_or_else(|_| "https://www.worldofbooks.com/".to_string()),
            orchestrator,
        })
    }
}

/// Parse `name` if set, else fall back to `default`.
fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", name)),
        Err(_) => Ok(default),
    }
}
