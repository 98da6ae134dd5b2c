//! Directory maintenance routes

use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;

use crate::{ApiResponse, AppError, AppState};

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReloadResponse {
    pub record_count: usize,
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/api/admin/tickers/reload", post(reload_tickers))
}

#[utoipa::path(
    post,
    path = "/api/admin/tickers/reload",
    responses(
        (status = 200, description = "Directory snapshot replaced", body = ReloadResponse),
        (status = 503, description = "Directory source unavailable; previous snapshot kept")
    ),
    tag = "Admin"
)]
pub async fn reload_tickers(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ReloadResponse>>, AppError> {
    let record_count = state.directory.reload().await?;
    Ok(Json(ApiResponse::success(ReloadResponse { record_count })))
}
