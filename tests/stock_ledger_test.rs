mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use stockledger_api::entities::{
    product::Entity as Product,
    stock_movement::{self, Entity as StockMovement},
};
use stockledger_api::errors::ServiceError;
use stockledger_api::events::EventSender;
use stockledger_api::services::bulk_updates::{BulkChangeRow, BulkOperationKind};
use stockledger_api::services::AppServices;

use common::{seed_order, seed_order_item, seed_product, setup};

async fn movements_for(
    db: &stockledger_api::db::DbPool,
    product_id: Uuid,
) -> Vec<stock_movement::Model> {
    StockMovement::find()
        .filter(stock_movement::Column::ProductId.eq(product_id))
        .order_by_asc(stock_movement::Column::CreatedAt)
        .all(db)
        .await
        .expect("load movements")
}

async fn current_stock(db: &stockledger_api::db::DbPool, product_id: Uuid) -> i32 {
    Product::find_by_id(product_id)
        .one(db)
        .await
        .expect("load product")
        .expect("product exists")
        .current_stock
}

#[tokio::test]
async fn reservation_decrements_stock_and_writes_one_ledger_row() {
    let (db, services) = setup().await;
    let product = seed_product(&db, "Widget", "WID-1", 100, Some(dec!(2.50))).await;
    let order = seed_order(&db, "ORD-1001").await;

    let movement = services
        .reservations
        .reserve(product.id, 30, None, order.id)
        .await
        .expect("reserve");

    assert_eq!(movement.movement_type, "ORDER_RESERVED");
    assert_eq!(movement.previous_stock, 100);
    assert_eq!(movement.new_stock, 70);
    assert_eq!(movement.quantity, 30);
    assert_eq!(movement.unit_cost, Some(dec!(2.50)));
    assert_eq!(movement.reference_id, Some(order.id));

    assert_eq!(current_stock(&db, product.id).await, 70);
    assert_eq!(movements_for(&db, product.id).await.len(), 1);
}

#[tokio::test]
async fn release_restores_stock_with_a_return_row() {
    let (db, services) = setup().await;
    let product = seed_product(&db, "Widget", "WID-2", 100, None).await;
    let order = seed_order(&db, "ORD-1002").await;

    services
        .reservations
        .reserve(product.id, 30, None, order.id)
        .await
        .expect("reserve");
    let movement = services
        .reservations
        .release(product.id, 30, None, order.id)
        .await
        .expect("release");

    assert_eq!(movement.movement_type, "ORDER_CANCELLED_RETURN");
    assert_eq!(movement.previous_stock, 70);
    assert_eq!(movement.new_stock, 100);
    assert_eq!(current_stock(&db, product.id).await, 100);
}

#[tokio::test]
async fn release_that_would_overflow_stock_is_rejected() {
    let (db, services) = setup().await;
    let product = seed_product(&db, "Maxed", "MAX-1", i32::MAX, None).await;
    let order = seed_order(&db, "ORD-1009").await;

    let err = services
        .reservations
        .release(product.id, 1, None, order.id)
        .await
        .expect_err("must reject");

    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(current_stock(&db, product.id).await, i32::MAX);
    assert!(movements_for(&db, product.id).await.is_empty());
}

#[tokio::test]
async fn over_reservation_is_rejected_without_any_writes() {
    let (db, services) = setup().await;
    let product = seed_product(&db, "Scarce", "SCR-1", 5, None).await;
    let order = seed_order(&db, "ORD-1003").await;

    let err = services
        .reservations
        .reserve(product.id, 6, None, order.id)
        .await
        .expect_err("must reject");

    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(current_stock(&db, product.id).await, 5);
    assert!(movements_for(&db, product.id).await.is_empty());
}

#[tokio::test]
async fn reservation_against_unknown_order_is_rejected() {
    let (db, services) = setup().await;
    let product = seed_product(&db, "Widget", "WID-3", 100, None).await;

    let err = services
        .reservations
        .reserve(product.id, 10, None, Uuid::new_v4())
        .await
        .expect_err("must reject");

    assert_matches!(err, ServiceError::NotFound(_));
    assert_eq!(current_stock(&db, product.id).await, 100);
    assert!(movements_for(&db, product.id).await.is_empty());
}

#[tokio::test]
async fn order_reservation_covers_every_line() {
    let (db, services) = setup().await;
    let first = seed_product(&db, "First", "PRD-A", 50, None).await;
    let second = seed_product(&db, "Second", "PRD-B", 20, None).await;
    let order = seed_order(&db, "ORD-2001").await;
    seed_order_item(&db, order.id, first.id, 10).await;
    seed_order_item(&db, order.id, second.id, 15).await;

    let movements = services
        .reservations
        .apply_to_order(order.id, true, None)
        .await
        .expect("reserve order");

    assert_eq!(movements.len(), 2);
    assert_eq!(current_stock(&db, first.id).await, 40);
    assert_eq!(current_stock(&db, second.id).await, 5);
}

#[tokio::test]
async fn order_reservation_is_all_or_nothing() {
    let (db, services) = setup().await;
    let plentiful = seed_product(&db, "Plentiful", "PRD-C", 100, None).await;
    let scarce = seed_product(&db, "Scarce", "PRD-D", 3, None).await;
    let order = seed_order(&db, "ORD-2002").await;
    seed_order_item(&db, order.id, plentiful.id, 10).await;
    seed_order_item(&db, order.id, scarce.id, 4).await;

    let err = services
        .reservations
        .apply_to_order(order.id, true, None)
        .await
        .expect_err("must reject");

    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(current_stock(&db, plentiful.id).await, 100);
    assert_eq!(current_stock(&db, scarce.id).await, 3);
    assert!(movements_for(&db, plentiful.id).await.is_empty());
    assert!(movements_for(&db, scarce.id).await.is_empty());
}

#[tokio::test]
async fn repeated_lines_for_one_product_are_summed_in_preflight() {
    let (db, services) = setup().await;
    let product = seed_product(&db, "Split", "PRD-E", 10, None).await;
    let order = seed_order(&db, "ORD-2003").await;
    seed_order_item(&db, order.id, product.id, 6).await;
    seed_order_item(&db, order.id, product.id, 6).await;

    let err = services
        .reservations
        .apply_to_order(order.id, true, None)
        .await
        .expect_err("must reject: 12 > 10 even though each line fits alone");

    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(current_stock(&db, product.id).await, 10);
}

#[tokio::test]
async fn order_cancellation_returns_every_line() {
    let (db, services) = setup().await;
    let product = seed_product(&db, "Widget", "WID-4", 100, None).await;
    let order = seed_order(&db, "ORD-2004").await;
    seed_order_item(&db, order.id, product.id, 25).await;

    services
        .reservations
        .apply_to_order(order.id, true, None)
        .await
        .expect("reserve order");
    let movements = services
        .reservations
        .apply_to_order(order.id, false, None)
        .await
        .expect("cancel order");

    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].movement_type, "ORDER_CANCELLED_RETURN");
    assert_eq!(current_stock(&db, product.id).await, 100);
}

#[tokio::test]
async fn stock_count_mismatch_writes_an_adjustment() {
    let (db, services) = setup().await;
    let product = seed_product(&db, "Counted", "CNT-1", 70, None).await;

    let movement = services
        .stock_counts
        .reconcile(product.id, 150, Some("CNT-DOC-1".into()), None, None)
        .await
        .expect("reconcile");

    assert_eq!(movement.movement_type, "ADJUSTMENT_IN");
    assert_eq!(movement.previous_stock, 70);
    assert_eq!(movement.new_stock, 150);
    assert_eq!(movement.quantity, 80);
    assert_eq!(current_stock(&db, product.id).await, 150);
}

#[tokio::test]
async fn stock_count_shortfall_writes_adjustment_out() {
    let (db, services) = setup().await;
    let product = seed_product(&db, "Counted", "CNT-2", 70, None).await;

    let movement = services
        .stock_counts
        .reconcile(product.id, 60, None, None, None)
        .await
        .expect("reconcile");

    assert_eq!(movement.movement_type, "ADJUSTMENT_OUT");
    assert_eq!(movement.quantity, 10);
    assert_eq!(current_stock(&db, product.id).await, 60);
}

#[tokio::test]
async fn matching_stock_count_leaves_an_informational_row() {
    let (db, services) = setup().await;
    let product = seed_product(&db, "Counted", "CNT-3", 70, None).await;

    let movement = services
        .stock_counts
        .reconcile(product.id, 70, None, None, None)
        .await
        .expect("reconcile");

    assert_eq!(movement.movement_type, "STOCK_COUNT");
    assert_eq!(movement.previous_stock, 70);
    assert_eq!(movement.new_stock, 70);
    assert_eq!(movement.quantity, 0);
    assert_eq!(current_stock(&db, product.id).await, 70);

    let rows = movements_for(&db, product.id).await;
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn negative_counted_quantity_is_rejected() {
    let (db, services) = setup().await;
    let product = seed_product(&db, "Counted", "CNT-4", 70, None).await;

    let err = services
        .stock_counts
        .reconcile(product.id, -1, None, None, None)
        .await
        .expect_err("must reject");

    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn bulk_noop_row_writes_nothing() {
    let (db, services) = setup().await;
    let product = seed_product(&db, "Bulk", "BLK-1", 40, None).await;

    let result = services
        .bulk_updates
        .record_bulk_change(
            BulkChangeRow {
                product_id: product.id,
                previous_stock: 40,
                new_stock: 40,
            },
            BulkOperationKind::Update,
            None,
            Uuid::new_v4(),
            "BATCH-1".into(),
        )
        .await
        .expect("bulk update");

    assert!(result.movement.is_none());
    assert!(movements_for(&db, product.id).await.is_empty());
    assert_eq!(current_stock(&db, product.id).await, 40);
}

#[tokio::test]
async fn bulk_update_records_correction_and_moves_aggregate() {
    let (db, services) = setup().await;
    let product = seed_product(&db, "Bulk", "BLK-2", 40, None).await;

    let result = services
        .bulk_updates
        .record_bulk_change(
            BulkChangeRow {
                product_id: product.id,
                previous_stock: 40,
                new_stock: 25,
            },
            BulkOperationKind::Update,
            None,
            Uuid::new_v4(),
            "BATCH-2".into(),
        )
        .await
        .expect("bulk update");

    let movement = result.movement.expect("ledger row");
    assert_eq!(movement.movement_type, "EXCEL_UPDATE");
    assert_eq!(movement.quantity, 15);
    assert_eq!(movement.batch_number.as_deref(), Some("BATCH-2"));
    assert_eq!(current_stock(&db, product.id).await, 25);
}

#[tokio::test]
async fn bulk_row_with_stale_previous_stock_conflicts() {
    let (db, services) = setup().await;
    let product = seed_product(&db, "Bulk", "BLK-3", 40, None).await;

    let err = services
        .bulk_updates
        .record_bulk_change(
            BulkChangeRow {
                product_id: product.id,
                previous_stock: 38,
                new_stock: 50,
            },
            BulkOperationKind::Update,
            None,
            Uuid::new_v4(),
            "BATCH-3".into(),
        )
        .await
        .expect_err("must conflict");

    assert_matches!(err, ServiceError::Conflict(_));
    assert_eq!(current_stock(&db, product.id).await, 40);
}

#[tokio::test]
async fn bulk_row_targeting_negative_stock_is_rejected() {
    let (db, services) = setup().await;
    let product = seed_product(&db, "Bulk", "BLK-4", 40, None).await;

    let err = services
        .bulk_updates
        .record_bulk_change(
            BulkChangeRow {
                product_id: product.id,
                previous_stock: 40,
                new_stock: -5,
            },
            BulkOperationKind::Update,
            None,
            Uuid::new_v4(),
            "BATCH-4".into(),
        )
        .await
        .expect_err("must reject");

    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn bulk_batch_failures_do_not_block_later_rows() {
    let (db, services) = setup().await;
    let good = seed_product(&db, "Good", "BLK-5", 10, None).await;
    let stale = seed_product(&db, "Stale", "BLK-6", 10, None).await;

    let results = services
        .bulk_updates
        .apply_batch(
            vec![
                BulkChangeRow {
                    product_id: stale.id,
                    previous_stock: 7,
                    new_stock: 9,
                },
                BulkChangeRow {
                    product_id: good.id,
                    previous_stock: 10,
                    new_stock: 30,
                },
            ],
            BulkOperationKind::Import,
            None,
            "BATCH-5".into(),
        )
        .await;

    assert_eq!(results.len(), 2);
    assert_matches!(results[0], Err(ServiceError::Conflict(_)));
    assert!(results[1].is_ok());
    assert_eq!(current_stock(&db, stale.id).await, 10);
    assert_eq!(current_stock(&db, good.id).await, 30);
}

#[tokio::test]
async fn bulk_rows_of_one_batch_share_a_reference_id() {
    let (db, services) = setup().await;
    let first = seed_product(&db, "First", "BLK-7", 10, None).await;
    let second = seed_product(&db, "Second", "BLK-8", 20, None).await;

    let results = services
        .bulk_updates
        .apply_batch(
            vec![
                BulkChangeRow {
                    product_id: first.id,
                    previous_stock: 10,
                    new_stock: 15,
                },
                BulkChangeRow {
                    product_id: second.id,
                    previous_stock: 20,
                    new_stock: 18,
                },
            ],
            BulkOperationKind::Import,
            None,
            "BATCH-6".into(),
        )
        .await;

    assert!(results.iter().all(|r| r.is_ok()));
    let first_row = &movements_for(&db, first.id).await[0];
    let second_row = &movements_for(&db, second.id).await[0];
    assert_eq!(first_row.reference_type.as_deref(), Some("EXCEL_BATCH"));
    assert!(first_row.reference_id.is_some());
    assert_eq!(first_row.reference_id, second_row.reference_id);
}

#[tokio::test]
async fn product_creation_seeds_the_ledger() {
    let (db, services) = setup().await;

    let product = services
        .products
        .create_product("Fresh".into(), "FRS-1".into(), 25, Some(dec!(1.10)), None)
        .await
        .expect("create product");

    let rows = movements_for(&db, product.id).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].movement_type, "INITIAL_STOCK");
    assert_eq!(rows[0].previous_stock, 0);
    assert_eq!(rows[0].new_stock, 25);
    assert_eq!(current_stock(&db, product.id).await, 25);
}

#[tokio::test]
async fn zero_initial_stock_writes_no_ledger_row() {
    let (db, services) = setup().await;

    let product = services
        .products
        .create_product("Empty".into(), "EMP-1".into(), 0, None, None)
        .await
        .expect("create product");

    assert!(movements_for(&db, product.id).await.is_empty());
    assert_eq!(current_stock(&db, product.id).await, 0);
}

#[tokio::test]
async fn variant_creation_records_an_initial_movement() {
    let (db, services) = setup().await;
    let product = seed_product(&db, "Parent", "PAR-1", 0, None).await;

    let variant = services
        .products
        .create_variant(product.id, "PAR-1-RED".into(), 12, None)
        .await
        .expect("create variant");

    let rows = movements_for(&db, product.id).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].variant_id, Some(variant.id));
    assert_eq!(rows[0].new_stock, 12);
}

#[tokio::test]
async fn stale_version_write_is_a_concurrent_modification() {
    let (db, _services) = setup().await;
    let product = seed_product(&db, "Guarded", "GRD-1", 50, None).await;

    stockledger_api::services::ledger::set_product_stock(&*db, &product, 45)
        .await
        .expect("first write with live version");

    // The in-memory model still carries version 0; the row moved on.
    let err = stockledger_api::services::ledger::set_product_stock(&*db, &product, 40)
        .await
        .expect_err("stale version must lose");
    assert_matches!(err, ServiceError::ConcurrentModification(_));
    assert_eq!(current_stock(&db, product.id).await, 45);
}

#[tokio::test]
async fn variant_stock_writes_share_the_version_guard() {
    let (db, services) = setup().await;
    let product = seed_product(&db, "Parent", "PAR-2", 0, None).await;
    let variant = services
        .products
        .create_variant(product.id, "PAR-2-BLUE".into(), 10, None)
        .await
        .expect("create variant");

    stockledger_api::services::ledger::set_variant_stock(&*db, &variant, 8)
        .await
        .expect("first write with live version");

    let err = stockledger_api::services::ledger::set_variant_stock(&*db, &variant, 6)
        .await
        .expect_err("stale version must lose");
    assert_matches!(err, ServiceError::ConcurrentModification(_));
}

#[tokio::test]
async fn archive_soft_deletes_and_is_idempotent() {
    let (db, services) = setup().await;
    let product = seed_product(&db, "Widget", "WID-5", 100, None).await;
    let order = seed_order(&db, "ORD-3001").await;

    let movement = services
        .reservations
        .reserve(product.id, 10, None, order.id)
        .await
        .expect("reserve");

    let archived = services.ledger.archive(movement.id).await.expect("archive");
    assert_eq!(archived.status, "DELETED");

    let again = services
        .ledger
        .archive(movement.id)
        .await
        .expect("second archive is a no-op");
    assert_eq!(again.status, "DELETED");

    // The aggregate is not recomputed; archiving only hides the row from
    // reporting.
    assert_eq!(current_stock(&db, product.id).await, 90);

    let stored = movements_for(&db, product.id).await;
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].is_active());
}

#[tokio::test]
async fn committed_writes_survive_a_dead_event_channel() {
    let (db, _services) = setup().await;
    let product = seed_product(&db, "Widget", "WID-6", 100, None).await;
    let order = seed_order(&db, "ORD-3002").await;

    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let services = AppServices::new(db.clone(), Arc::new(EventSender::new(tx)));

    let movement = services
        .reservations
        .reserve(product.id, 10, None, order.id)
        .await
        .expect("reserve despite closed channel");

    assert_eq!(movement.new_stock, 90);
    assert_eq!(current_stock(&db, product.id).await, 90);
    assert_eq!(movements_for(&db, product.id).await.len(), 1);
}
