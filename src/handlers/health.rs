use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub version: String,
}

pub fn health_router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

/// Liveness plus a database ping
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.db.ping().await.is_ok();
    let (status, body) = if db_ok {
        (
            StatusCode::OK,
            HealthResponse {
                status: "ok".to_string(),
                database: "up".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            HealthResponse {
                status: "degraded".to_string(),
                database: "down".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        )
    };
    (status, Json(body))
}
