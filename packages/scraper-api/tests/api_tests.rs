//! HTTP surface tests, driven through the router with `oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use scrape_orchestrator::{
    testing::MockExtractor, ExtractedRecord, FetchCoordinator, MemoryJobStore, NavigationItem,
    OrchestratorConfig, ProductListing,
};
use scraper_api::{build_app, AppState};

const SITE: &str = "https://books.example.com/";
const CATEGORY: &str = "https://books.example.com/c/fiction";

fn extractor() -> MockExtractor {
    MockExtractor::new()
        .with_record(
            SITE,
            ExtractedRecord::Navigation(vec![
                NavigationItem::new("Fiction", CATEGORY),
                NavigationItem::new("Rare Books", "https://books.example.com/c/rare"),
            ]),
        )
        .with_record(
            CATEGORY,
            ExtractedRecord::Listing(vec![
                ProductListing::new("Dune", "https://books.example.com/p/dune"),
                ProductListing::new("Dune", "https://books.example.com/p/dune"),
                ProductListing::new("Emma", "https://books.example.com/p/emma"),
            ]),
        )
        .with_failure("https://books.example.com/p/broken", "no product container")
}

/// Helper to build the app over a mock extractor.
fn app_with(config: OrchestratorConfig) -> Router {
    let coordinator = FetchCoordinator::new(
        config,
        Arc::new(extractor()),
        Arc::new(MemoryJobStore::new()),
    );
    build_app(AppState::new(Arc::new(coordinator), SITE))
}

fn app() -> Router {
    app_with(OrchestratorConfig::default())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_liveness() {
    let (status, body) = send(&app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_navigation_uses_default_site() {
    let (status, body) = send(&app(), get("/api/scraper/navigation/scrape")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[1]["slug"], "rare-books");
}

#[tokio::test]
async fn test_category_scrape_dedupes_and_caches() {
    let app = app();
    let (status, body) = send(
        &app,
        post(
            "/api/scraper/category/scrape",
            json!({ "categoryUrl": CATEGORY, "categoryTitle": "Fiction" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["productCount"], 2);
    assert_eq!(body["title"], "Fiction");
    assert_eq!(body["products"][0]["sourceUrl"], "https://books.example.com/p/dune");
    assert!(body["products"][0].get("source_url").is_none());

    let (status, body) = send(
        &app,
        get(&format!("/api/scraper/category/cache-status?url={}", CATEGORY)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isCached"], true);
    assert_eq!(body["expired"], false);
}

#[tokio::test]
async fn test_error_status_mapping() {
    let config = OrchestratorConfig::default().with_rate_limit(1, Duration::from_secs(60));
    let app = app_with(config);

    let (status, body) = send(
        &app,
        post(
            "/api/scraper/product/scrape",
            json!({ "productUrl": "not a url", "sourceId": "sku-1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["statusCode"], 400);

    let (status, _) = send(
        &app,
        post(
            "/api/scraper/product/scrape",
            json!({ "productUrl": "https://books.example.com/p/broken", "sourceId": "sku-2" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, body) = send(
        &app,
        post(
            "/api/scraper/product/scrape",
            json!({ "productUrl": "https://books.example.com/p/dune", "sourceId": "sku-3" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["message"].as_str().unwrap().contains("books.example.com"));
}

#[tokio::test]
async fn test_product_scrape_and_job_lookup() {
    let app = app();
    let (status, body) = send(
        &app,
        post(
            "/api/scraper/product/scrape",
            json!({ "productUrl": "https://books.example.com/p/dune", "sourceId": "sku-1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sourceId"], "sku-1");
    assert_eq!(body["sourceUrl"], "https://books.example.com/p/dune");
    assert_eq!(body["ratingAvg"], 0.0);
    assert!(body["lastScrapedAt"].is_string());
    assert!(body.get("source_id").is_none());

    let (status, _) = send(&app, get("/api/scraper/jobs/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        get("/api/scraper/jobs/0191b6a8-7c3e-7d2a-9f00-000000000000"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_batch_reports_partition() {
    let app = app();
    let (status, body) = send(
        &app,
        post(
            "/api/scraper/product/batch",
            json!({
                "products": [
                    { "productUrl": "https://books.example.com/p/1", "sourceId": "1" },
                    { "productUrl": "https://books.example.com/p/broken", "sourceId": "2" },
                    { "productUrl": "https://books.example.com/p/3", "sourceId": "3" }
                ],
                "concurrency": 2,
                "delayMs": 0
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["total"], 3);
    assert_eq!(body["successCount"], 2);
    assert_eq!(body["failureCount"], 1);
    assert_eq!(body["failures"][0]["url"], "https://books.example.com/p/broken");

    let (status, _) = send(
        &app,
        post("/api/scraper/product/batch", json!({ "products": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_clear_cache_and_health() {
    let app = app();
    send(&app, get("/api/scraper/navigation/scrape")).await;
    send(
        &app,
        post(
            "/api/scraper/category/scrape",
            json!({ "categoryUrl": CATEGORY, "categoryTitle": "Fiction" }),
        ),
    )
    .await;

    let (status, body) = send(&app, get("/api/scraper/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["completedJobsLast24h"], 2);
    assert_eq!(body["cacheSize"], 2);

    let (_, body) = send(&app, delete(&format!("/api/scraper/cache?url={}", CATEGORY))).await;
    assert_eq!(body["cleared"], 1);

    let (_, body) = send(&app, delete("/api/scraper/cache")).await;
    assert_eq!(body["cleared"], 1);

    let (_, body) = send(&app, get("/api/scraper/stats")).await;
    assert_eq!(body["cacheSize"], 0);
}

#[tokio::test]
async fn test_refetch_replaces_cached_detail() {
    let app = app();
    send(
        &app,
        post(
            "/api/scraper/product/scrape",
            json!({ "productUrl": "https://books.example.com/p/emma", "sourceId": "sku-1" }),
        ),
    )
    .await;

    let (status, body) = send(
        &app,
        post(
            "/api/scraper/product/refetch",
            json!({ "sourceUrl": "https://books.example.com/p/emma", "productId": "sku-2" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sourceId"], "sku-2");

    let (_, body) = send(&app, get("/api/scraper/health")).await;
    assert_eq!(body["completedJobsLast24h"], 2);
}
