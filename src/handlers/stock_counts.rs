use crate::{
    errors::ServiceError, handlers::movements::MovementResponse, ApiResponse, AppState,
};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StockCountRequest {
    pub product_id: Uuid,
    #[validate(range(min = 0))]
    pub counted_quantity: i32,
    pub document_number: Option<String>,
    pub notes: Option<String>,
    pub performed_by: Option<Uuid>,
}

pub fn stock_counts_router() -> Router<AppState> {
    Router::new().route("/", post(record_stock_count))
}

/// Reconcile a physical count against the system stock
#[utoipa::path(
    post,
    path = "/api/v1/stock-counts",
    request_body = StockCountRequest,
    responses(
        (status = 201, description = "Count recorded; an adjustment row when stock differed, an informational row otherwise", body = MovementResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-counts"
)]
pub async fn record_stock_count(
    State(state): State<AppState>,
    Json(payload): Json<StockCountRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;
    let movement = state
        .services
        .stock_counts
        .reconcile(
            payload.product_id,
            payload.counted_quantity,
            payload.document_number,
            payload.notes,
            payload.performed_by,
        )
        .await?;
    let response = MovementResponse::from_model(movement, None);
    Ok((StatusCode::CREATED, axum::Json(ApiResponse::success(response))))
}
