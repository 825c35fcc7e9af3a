use crate::{
    entities::{
        product,
        stock_movement::{self, MovementStatus, MovementType},
    },
    errors::ServiceError,
    services::bulk_updates::{BulkChangeRow, BulkOperationKind},
    services::reports::MovementFilter,
    AppState, ApiResponse, PaginatedResponse,
};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Product display fields embedded in a movement response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductRef {
    pub id: Uuid,
    pub name: Option<String>,
    pub code: Option<String>,
}

/// Outbound shape of one ledger row.
#[derive(Debug, Serialize, ToSchema)]
pub struct MovementResponse {
    pub id: Uuid,
    pub product: ProductRef,
    pub variant_id: Option<Uuid>,
    pub movement_type: String,
    pub movement_type_label: String,
    pub quantity: i32,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub unit_cost: Option<Decimal>,
    pub total_cost: Option<Decimal>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub document_number: Option<String>,
    pub notes: Option<String>,
    pub performed_by: Option<Uuid>,
    pub movement_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub status_label: String,
}

impl MovementResponse {
    pub fn from_model(movement: stock_movement::Model, product: Option<&product::Model>) -> Self {
        let type_label = movement
            .movement_type()
            .map(|t| t.classification().label.to_string())
            .unwrap_or_else(|| movement.movement_type.clone());
        let status_label = movement
            .status()
            .map(|s| s.display_name().to_string())
            .unwrap_or_else(|| movement.status.clone());
        let total_cost = movement
            .unit_cost
            .map(|cost| cost * Decimal::from(movement.quantity));

        Self {
            id: movement.id,
            product: ProductRef {
                id: movement.product_id,
                name: product.map(|p| p.name.clone()),
                code: product.map(|p| p.code.clone()),
            },
            variant_id: movement.variant_id,
            movement_type: movement.movement_type,
            movement_type_label: type_label,
            quantity: movement.quantity,
            previous_stock: movement.previous_stock,
            new_stock: movement.new_stock,
            unit_cost: movement.unit_cost,
            total_cost,
            batch_number: movement.batch_number,
            expiry_date: movement.expiry_date,
            reference_type: movement.reference_type,
            reference_id: movement.reference_id,
            document_number: movement.document_number,
            notes: movement.notes,
            performed_by: movement.performed_by,
            movement_date: movement.movement_date,
            created_at: movement.created_at,
            status: movement.status,
            status_label,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MovementListQuery {
    /// Movement type code (e.g. ORDER_RESERVED)
    pub movement_type: Option<String>,
    pub product_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// ACTIVE or DELETED
    pub status: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MovementSearchQuery {
    /// Substring matched against product name/code, notes and document number
    pub q: String,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReserveStockRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub order_id: Uuid,
    pub performed_by: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct BulkChangeRowRequest {
    pub product_id: Uuid,
    #[validate(range(min = 0))]
    pub previous_stock: i32,
    #[validate(range(min = 0))]
    pub new_stock: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BulkChangeRequest {
    /// "import" for new stock rows, "update" for corrections
    pub operation: String,
    #[validate(length(min = 1))]
    pub batch_number: String,
    #[validate(length(min = 1))]
    pub rows: Vec<BulkChangeRowRequest>,
    pub performed_by: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkRowOutcome {
    pub product_id: Uuid,
    pub movement: Option<MovementResponse>,
    pub error: Option<String>,
}

pub fn movements_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_movements))
        .route("/search", get(search_movements))
        .route("/reserve", post(reserve_stock))
        .route("/release", post(release_stock))
        .route("/bulk", post(record_bulk_changes))
        .route("/:id", get(get_movement).delete(archive_movement))
}

async fn page_to_responses(
    state: &AppState,
    items: Vec<stock_movement::Model>,
) -> Result<Vec<MovementResponse>, ServiceError> {
    let ids: Vec<Uuid> = items.iter().map(|m| m.product_id).collect();
    let products = state.services.reports.product_refs(ids).await?;
    Ok(items
        .into_iter()
        .map(|m| {
            let product = products.get(&m.product_id);
            MovementResponse::from_model(m, product)
        })
        .collect())
}

/// List ledger rows with optional filters
#[utoipa::path(
    get,
    path = "/api/v1/stock-movements",
    params(MovementListQuery),
    responses(
        (status = 200, description = "Movement page returned"),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-movements"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    Query(query): Query<MovementListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let movement_type = query
        .movement_type
        .as_deref()
        .map(|raw| {
            MovementType::from_str(raw).ok_or_else(|| {
                ServiceError::ValidationError(format!("unknown movement type '{}'", raw))
            })
        })
        .transpose()?;
    let status = query
        .status
        .as_deref()
        .map(|raw| {
            MovementStatus::from_str(raw).ok_or_else(|| {
                ServiceError::ValidationError(format!("unknown movement status '{}'", raw))
            })
        })
        .transpose()?;

    let filter = MovementFilter {
        movement_type,
        product_id: query.product_id,
        from: query.from,
        to: query.to,
        status,
    };

    let page = state
        .services
        .reports
        .list_movements(filter, query.page.unwrap_or(1), query.limit.unwrap_or(20))
        .await?;

    let total = page.total;
    let (page_no, limit) = (page.page, page.limit);
    let items = page_to_responses(&state, page.items).await?;

    Ok(axum::Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page: page_no,
        limit,
        total_pages: total.div_ceil(limit),
    })))
}

/// Free-text search over the ledger
#[utoipa::path(
    get,
    path = "/api/v1/stock-movements/search",
    params(MovementSearchQuery),
    responses(
        (status = 200, description = "Matching movements returned"),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-movements"
)]
pub async fn search_movements(
    State(state): State<AppState>,
    Query(query): Query<MovementSearchQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .services
        .reports
        .search(&query.q, query.page.unwrap_or(1), query.limit.unwrap_or(20))
        .await?;

    let total = page.total;
    let (page_no, limit) = (page.page, page.limit);
    let items = page_to_responses(&state, page.items).await?;

    Ok(axum::Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page: page_no,
        limit,
        total_pages: total.div_ceil(limit),
    })))
}

/// Fetch one ledger row
#[utoipa::path(
    get,
    path = "/api/v1/stock-movements/{id}",
    params(("id" = Uuid, Path, description = "Movement id")),
    responses(
        (status = 200, description = "Movement returned", body = MovementResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-movements"
)]
pub async fn get_movement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state.services.reports.get_movement(id).await?;
    let response = MovementResponse::from_model(detail.movement, Some(&detail.product));
    Ok(axum::Json(ApiResponse::success(response)))
}

/// Archive (soft-delete) one ledger row for retention
#[utoipa::path(
    delete,
    path = "/api/v1/stock-movements/{id}",
    params(("id" = Uuid, Path, description = "Movement id")),
    responses(
        (status = 200, description = "Movement archived", body = MovementResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-movements"
)]
pub async fn archive_movement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let archived = state.services.ledger.archive(id).await?;
    let response = MovementResponse::from_model(archived, None);
    Ok(axum::Json(ApiResponse::success(response)))
}

/// Reserve stock for an order (single product)
#[utoipa::path(
    post,
    path = "/api/v1/stock-movements/reserve",
    request_body = ReserveStockRequest,
    responses(
        (status = 201, description = "Stock reserved", body = MovementResponse),
        (status = 404, description = "Unknown product or order", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-movements"
)]
pub async fn reserve_stock(
    State(state): State<AppState>,
    Json(payload): Json<ReserveStockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;
    let movement = state
        .services
        .reservations
        .reserve(
            payload.product_id,
            payload.quantity,
            payload.performed_by,
            payload.order_id,
        )
        .await?;
    let response = MovementResponse::from_model(movement, None);
    Ok((StatusCode::CREATED, axum::Json(ApiResponse::success(response))))
}

/// Return stock after an order cancellation or return (single product)
#[utoipa::path(
    post,
    path = "/api/v1/stock-movements/release",
    request_body = ReserveStockRequest,
    responses(
        (status = 201, description = "Stock released", body = MovementResponse),
        (status = 404, description = "Unknown product or order", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-movements"
)]
pub async fn release_stock(
    State(state): State<AppState>,
    Json(payload): Json<ReserveStockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;
    let movement = state
        .services
        .reservations
        .release(
            payload.product_id,
            payload.quantity,
            payload.performed_by,
            payload.order_id,
        )
        .await?;
    let response = MovementResponse::from_model(movement, None);
    Ok((StatusCode::CREATED, axum::Json(ApiResponse::success(response))))
}

/// Record a batch of bulk-import stock changes
#[utoipa::path(
    post,
    path = "/api/v1/stock-movements/bulk",
    request_body = BulkChangeRequest,
    responses(
        (status = 200, description = "Per-row outcomes returned"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-movements"
)]
pub async fn record_bulk_changes(
    State(state): State<AppState>,
    Json(payload): Json<BulkChangeRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;
    let kind = match payload.operation.to_lowercase().as_str() {
        "import" => BulkOperationKind::Import,
        "update" => BulkOperationKind::Update,
        other => {
            return Err(ServiceError::ValidationError(format!(
                "unknown bulk operation '{}', expected 'import' or 'update'",
                other
            )))
        }
    };

    let rows: Vec<BulkChangeRow> = payload
        .rows
        .iter()
        .map(|row| BulkChangeRow {
            product_id: row.product_id,
            previous_stock: row.previous_stock,
            new_stock: row.new_stock,
        })
        .collect();

    let results = state
        .services
        .bulk_updates
        .apply_batch(rows, kind, payload.performed_by, payload.batch_number)
        .await;

    let outcomes: Vec<BulkRowOutcome> = results
        .into_iter()
        .zip(payload.rows.iter())
        .map(|(result, row)| match result {
            Ok(outcome) => BulkRowOutcome {
                product_id: outcome.product_id,
                movement: outcome
                    .movement
                    .map(|m| MovementResponse::from_model(m, None)),
                error: None,
            },
            Err(err) => BulkRowOutcome {
                product_id: row.product_id,
                movement: None,
                error: Some(err.response_message()),
            },
        })
        .collect();

    Ok(axum::Json(ApiResponse::success(outcomes)))
}
