use crate::{
    entities::{product, product_variant},
    errors::ServiceError,
    services::reports::ProductSummary,
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[validate(range(min = 0))]
    pub initial_stock: i32,
    pub unit_cost: Option<Decimal>,
    pub performed_by: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateVariantRequest {
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    #[validate(range(min = 0))]
    pub initial_stock: i32,
    pub performed_by: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub current_stock: i32,
    pub version: i32,
    pub unit_cost: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<product::Model> for ProductResponse {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            code: model.code,
            current_stock: model.current_stock,
            version: model.version,
            unit_cost: model.unit_cost,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VariantResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub current_stock: i32,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<product_variant::Model> for VariantResponse {
    fn from(model: product_variant::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            sku: model.sku,
            current_stock: model.current_stock,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductSummaryResponse {
    pub product_id: Uuid,
    pub name: String,
    pub code: String,
    pub current_stock: i32,
    pub total_stock_in: i64,
    pub total_stock_out: i64,
    pub average_unit_cost: Option<Decimal>,
    pub total_value: Option<Decimal>,
    pub last_movement_date: Option<DateTime<Utc>>,
    pub last_movement_type: Option<String>,
}

impl From<ProductSummary> for ProductSummaryResponse {
    fn from(summary: ProductSummary) -> Self {
        Self {
            product_id: summary.product_id,
            name: summary.name,
            code: summary.code,
            current_stock: summary.current_stock,
            total_stock_in: summary.total_stock_in,
            total_stock_out: summary.total_stock_out,
            average_unit_cost: summary.average_unit_cost,
            total_value: summary.total_value,
            last_movement_date: summary.last_movement_date,
            last_movement_type: summary.last_movement_type,
        }
    }
}

pub fn products_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_product))
        .route("/:id/variants", post(create_variant))
        .route("/:id/summary", get(product_summary))
}

/// Create a product, seeding the ledger when initial stock is non-zero
#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;
    let product = state
        .services
        .products
        .create_product(
            payload.name,
            payload.code,
            payload.initial_stock,
            payload.unit_cost,
            payload.performed_by,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        axum::Json(ApiResponse::success(ProductResponse::from(product))),
    ))
}

/// Add a variant to an existing product
#[utoipa::path(
    post,
    path = "/api/v1/products/{id}/variants",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = CreateVariantRequest,
    responses(
        (status = 201, description = "Variant created", body = VariantResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn create_variant(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<CreateVariantRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;
    let variant = state
        .services
        .products
        .create_variant(
            product_id,
            payload.sku,
            payload.initial_stock,
            payload.performed_by,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        axum::Json(ApiResponse::success(VariantResponse::from(variant))),
    ))
}

/// Per-product totals, weighted average cost and stock value
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}/summary",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Summary returned", body = ProductSummaryResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn product_summary(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.services.reports.product_summary(product_id).await?;
    Ok(axum::Json(ApiResponse::success(
        ProductSummaryResponse::from(summary),
    )))
}
