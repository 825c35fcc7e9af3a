use crate::{
    errors::ServiceError,
    handlers::movements::MovementResponse,
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderStockRequest {
    pub performed_by: Option<Uuid>,
}

pub fn orders_router() -> Router<AppState> {
    Router::new()
        .route("/:id/reserve", post(reserve_order))
        .route("/:id/cancel", post(cancel_order))
}

/// Reserve stock for every line of an order, all-or-nothing
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/reserve",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = OrderStockRequest,
    responses(
        (status = 201, description = "All lines reserved"),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock for at least one line", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn reserve_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<OrderStockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let movements = state
        .services
        .reservations
        .apply_to_order(order_id, true, payload.performed_by)
        .await?;
    let items: Vec<MovementResponse> = movements
        .into_iter()
        .map(|m| MovementResponse::from_model(m, None))
        .collect();
    Ok((StatusCode::CREATED, axum::Json(ApiResponse::success(items))))
}

/// Return stock for every line of a cancelled order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = OrderStockRequest,
    responses(
        (status = 201, description = "All lines returned"),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<OrderStockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let movements = state
        .services
        .reservations
        .apply_to_order(order_id, false, payload.performed_by)
        .await?;
    let items: Vec<MovementResponse> = movements
        .into_iter()
        .map(|m| MovementResponse::from_model(m, None))
        .collect();
    Ok((StatusCode::CREATED, axum::Json(ApiResponse::success(items))))
}
