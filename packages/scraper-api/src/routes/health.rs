use axum::{extract::Extension, Json};
use scrape_orchestrator::HealthSnapshot;
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiResult;

#[derive(Serialize)]
pub struct LivenessResponse {
    status: &'static str,
}

/// Liveness probe. Answers as long as the process serves requests.
pub async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "ok" })
}

/// Scraper health: open jobs, 24h outcomes, cache hit rate and size.
///
/// `status` turns `degraded` when more than 5 jobs are still open.
pub async fn scraper_health_handler(
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<HealthSnapshot>> {
    let snapshot = state.coordinator.health().await?;
    Ok(Json(snapshot))
}
