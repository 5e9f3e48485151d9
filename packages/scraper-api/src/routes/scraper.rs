//! Scrape, cache and job endpoints under `/api/scraper`.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use scrape_orchestrator::{
    BatchResult, CacheStatus, FetchRequest, Job, JobId, ProductDetail, ProductListing,
    TargetKind,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};

/// Products returned per category response.
const CATEGORY_RESPONSE_LIMIT: usize = 50;

// Request bodies

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationQuery {
    pub site_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScrapeRequest {
    pub category_url: String,
    pub category_title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductScrapeRequest {
    pub product_url: String,
    pub source_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchScrapeRequest {
    pub products: Vec<ProductScrapeRequest>,
    pub concurrency: Option<usize>,
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefetchRequest {
    pub source_url: String,
    pub product_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ClearCacheQuery {
    pub url: Option<String>,
}

// Responses

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationItemResponse {
    pub title: String,
    pub slug: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub title: String,
    pub url: String,
    pub product_count: usize,
    pub products: Vec<ProductListing>,
    pub last_scraped_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    #[serde(flatten)]
    pub result: BatchResult,
    pub success_rate: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearCacheResponse {
    pub cleared: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

// Handlers

/// GET /api/scraper/navigation/scrape
pub async fn scrape_navigation(
    Extension(state): Extension<AppState>,
    Query(query): Query<NavigationQuery>,
) -> ApiResult<Json<Vec<NavigationItemResponse>>> {
    let site_url = query.site_url.unwrap_or_else(|| state.default_site_url.clone());
    let items = state.coordinator.fetch_navigation(&site_url).await?;

    Ok(Json(
        items
            .into_iter()
            .map(|item| NavigationItemResponse {
                slug: item.slug(),
                title: item.title,
                url: item.url,
            })
            .collect(),
    ))
}

/// POST /api/scraper/category/scrape
pub async fn scrape_category(
    Extension(state): Extension<AppState>,
    Json(request): Json<CategoryScrapeRequest>,
) -> ApiResult<(StatusCode, Json<CategoryResponse>)> {
    let page = state
        .coordinator
        .fetch_category(&request.category_url, &request.category_title)
        .await?;

    let mut products = page.products;
    products.truncate(CATEGORY_RESPONSE_LIMIT);

    Ok((
        StatusCode::CREATED,
        Json(CategoryResponse {
            title: page.title,
            url: page.url,
            product_count: page.count,
            products,
            last_scraped_at: Utc::now(),
        }),
    ))
}

/// POST /api/scraper/product/scrape
pub async fn scrape_product(
    Extension(state): Extension<AppState>,
    Json(request): Json<ProductScrapeRequest>,
) -> ApiResult<(StatusCode, Json<ProductDetail>)> {
    let detail = state
        .coordinator
        .fetch_product_detail(&request.product_url, &request.source_id)
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// POST /api/scraper/product/batch
pub async fn scrape_product_batch(
    Extension(state): Extension<AppState>,
    Json(request): Json<BatchScrapeRequest>,
) -> ApiResult<(StatusCode, Json<BatchResponse>)> {
    if request.products.is_empty() {
        return Err(ApiError::BadRequest("products must not be empty".to_string()));
    }

    let defaults = state.scheduler.config();
    let concurrency = request.concurrency.unwrap_or(defaults.concurrency);
    let delay = request
        .delay_ms
        .map(std::time::Duration::from_millis)
        .unwrap_or_else(|| defaults.inter_batch_delay());

    let items: Vec<FetchRequest> = request
        .products
        .into_iter()
        .map(|p| FetchRequest::product(p.product_url, p.source_id))
        .collect();

    let started_at = Utc::now();
    let result = state.scheduler.run_batch(items, concurrency, delay).await;
    let finished_at = Utc::now();

    info!(
        total = result.total,
        success_count = result.success_count,
        failure_count = result.failure_count,
        "Product batch finished"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchResponse {
            success_rate: result.success_rate(),
            result,
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds(),
        }),
    ))
}

/// GET /api/scraper/product/cache-status?url=
pub async fn product_cache_status(
    Extension(state): Extension<AppState>,
    Query(query): Query<UrlQuery>,
) -> Json<CacheStatus> {
    Json(state.coordinator.cache_status(TargetKind::ProductDetail, &query.url))
}

/// GET /api/scraper/category/cache-status?url=
pub async fn category_cache_status(
    Extension(state): Extension<AppState>,
    Query(query): Query<UrlQuery>,
) -> Json<CacheStatus> {
    Json(state.coordinator.cache_status(TargetKind::Category, &query.url))
}

/// POST /api/scraper/product/refetch
///
/// Drops the cached detail page, then scrapes it live.
pub async fn refetch_product(
    Extension(state): Extension<AppState>,
    Json(request): Json<RefetchRequest>,
) -> ApiResult<(StatusCode, Json<ProductDetail>)> {
    let detail = state
        .coordinator
        .refetch_product_detail(&request.source_url, &request.product_id)
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/scraper/jobs/:job_id
pub async fn get_job(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let id: JobId = job_id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid job id {}: {}", job_id, e)))?;
    Ok(Json(state.coordinator.job(id).await?))
}

/// DELETE /api/scraper/cache?url=
///
/// Without `url` the whole cache is cleared.
pub async fn clear_cache(
    Extension(state): Extension<AppState>,
    Query(query): Query<ClearCacheQuery>,
) -> Json<ClearCacheResponse> {
    let cleared = match &query.url {
        Some(url) => state.coordinator.invalidate_url(url),
        None => state.coordinator.clear_cache(),
    };
    Json(ClearCacheResponse {
        cleared,
        url: query.url,
    })
}
