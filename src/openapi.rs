use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::errors::ErrorResponse;
use crate::handlers::{
    health::{self, HealthResponse},
    movements::{
        self, BulkChangeRequest, BulkChangeRowRequest, BulkRowOutcome, MovementResponse,
        ProductRef, ReserveStockRequest,
    },
    orders::{self, OrderStockRequest},
    products::{
        self, CreateProductRequest, CreateVariantRequest, ProductResponse,
        ProductSummaryResponse, VariantResponse,
    },
    reports::{self, DailySummaryResponse, TopProductResponse},
    stock_counts::{self, StockCountRequest},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        movements::list_movements,
        movements::search_movements,
        movements::get_movement,
        movements::archive_movement,
        movements::reserve_stock,
        movements::release_stock,
        movements::record_bulk_changes,
        orders::reserve_order,
        orders::cancel_order,
        products::create_product,
        products::create_variant,
        products::product_summary,
        stock_counts::record_stock_count,
        reports::daily_summary,
        reports::top_products,
    ),
    components(schemas(
        ErrorResponse,
        HealthResponse,
        ProductRef,
        MovementResponse,
        ReserveStockRequest,
        BulkChangeRequest,
        BulkChangeRowRequest,
        BulkRowOutcome,
        OrderStockRequest,
        CreateProductRequest,
        CreateVariantRequest,
        ProductResponse,
        VariantResponse,
        ProductSummaryResponse,
        StockCountRequest,
        DailySummaryResponse,
        TopProductResponse,
    )),
    tags(
        (name = "stock-movements", description = "The append-only stock movement ledger"),
        (name = "orders", description = "Order-level reservation and cancellation"),
        (name = "products", description = "Products, variants and per-product summaries"),
        (name = "stock-counts", description = "Physical count reconciliation"),
        (name = "reports", description = "Daily and top-product aggregations"),
        (name = "health", description = "Service health")
    ),
    info(
        title = "Stock Ledger API",
        description = "Order and inventory backend built around an append-only stock movement ledger"
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at /docs, spec served at /api-docs/openapi.json.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
