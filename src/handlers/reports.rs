use crate::{
    errors::ServiceError,
    services::reports::{DailySummary, TopProduct, TopProductsBy},
    ApiResponse, AppState,
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
pub struct DailySummaryQuery {
    pub product_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TopProductsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// "count" (default) or "quantity"
    pub by: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DailySummaryResponse {
    pub date: NaiveDate,
    pub stock_in: i64,
    pub stock_out: i64,
    pub net_change: i64,
    pub movement_count: u64,
}

impl From<DailySummary> for DailySummaryResponse {
    fn from(row: DailySummary) -> Self {
        Self {
            date: row.date,
            stock_in: row.stock_in,
            stock_out: row.stock_out,
            net_change: row.net_change,
            movement_count: row.movement_count,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopProductResponse {
    pub product_id: Uuid,
    pub name: String,
    pub code: String,
    pub movement_count: u64,
    pub total_quantity: i64,
}

impl From<TopProduct> for TopProductResponse {
    fn from(row: TopProduct) -> Self {
        Self {
            product_id: row.product_id,
            name: row.name,
            code: row.code,
            movement_count: row.movement_count,
            total_quantity: row.total_quantity,
        }
    }
}

pub fn reports_router() -> Router<AppState> {
    Router::new()
        .route("/daily", get(daily_summary))
        .route("/top-products", get(top_products))
}

/// Per-day stock-in/out totals over a date range
#[utoipa::path(
    get,
    path = "/api/v1/reports/daily",
    params(DailySummaryQuery),
    responses(
        (status = 200, description = "Daily rows returned, oldest first"),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "reports"
)]
pub async fn daily_summary(
    State(state): State<AppState>,
    Query(query): Query<DailySummaryQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let rows = state
        .services
        .reports
        .daily_summary(query.product_id, query.from, query.to)
        .await?;
    let items: Vec<DailySummaryResponse> =
        rows.into_iter().map(DailySummaryResponse::from).collect();
    Ok(axum::Json(ApiResponse::success(items)))
}

/// Most-moved products by movement count or total quantity
#[utoipa::path(
    get,
    path = "/api/v1/reports/top-products",
    params(TopProductsQuery),
    responses(
        (status = 200, description = "Ranked products returned"),
        (status = 400, description = "Invalid metric", body = crate::errors::ErrorResponse)
    ),
    tag = "reports"
)]
pub async fn top_products(
    State(state): State<AppState>,
    Query(query): Query<TopProductsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let by = match query.by.as_deref() {
        None | Some("count") => TopProductsBy::MovementCount,
        Some("quantity") => TopProductsBy::TotalQuantity,
        Some(other) => {
            return Err(ServiceError::ValidationError(format!(
                "unknown ranking metric '{}', expected 'count' or 'quantity'",
                other
            )))
        }
    };
    let rows = state
        .services
        .reports
        .top_products(query.from, query.to, by, query.limit.unwrap_or(10).min(100))
        .await?;
    let items: Vec<TopProductResponse> =
        rows.into_iter().map(TopProductResponse::from).collect();
    Ok(axum::Json(ApiResponse::success(items)))
}
