use crate::{
    db::DbPool,
    entities::{
        product::Entity as Product,
        stock_movement::{self, MovementType, ReferenceType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::ledger::{self, NewMovement},
    services::reservations::unwrap_txn_err,
};
use sea_orm::{EntityTrait, TransactionTrait};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Which external bulk operation produced a row of before/after values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOperationKind {
    Import,
    Update,
}

impl BulkOperationKind {
    fn movement_type(&self) -> MovementType {
        match self {
            BulkOperationKind::Import => MovementType::ExcelImport,
            BulkOperationKind::Update => MovementType::ExcelUpdate,
        }
    }
}

/// One already-parsed row from a bulk import collaborator.
#[derive(Debug, Clone, Copy)]
pub struct BulkChangeRow {
    pub product_id: Uuid,
    pub previous_stock: i32,
    pub new_stock: i32,
}

/// Outcome of one bulk row: the created movement, or `None` when the row was
/// a no-op (previous == new).
#[derive(Debug)]
pub struct BulkChangeResult {
    pub product_id: Uuid,
    pub movement: Option<stock_movement::Model>,
}

/// Records stock deltas handed over by external bulk-import collaborators.
/// File parsing happens upstream; this only consumes resolved before/after
/// pairs.
#[derive(Clone)]
pub struct BulkUpdateService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl BulkUpdateService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Applies one bulk row: version-guarded aggregate write plus one ledger
    /// row, in a single transaction. No-op (no row) when previous == new.
    ///
    /// The supplied `previous_stock` must still match the live aggregate;
    /// a mismatch means the import snapshot is stale and is rejected as a
    /// conflict rather than silently overwriting newer movements. Targets
    /// below zero are rejected outright, same policy as reservations.
    ///
    /// `batch_id` identifies the batch the row came from; every row of one
    /// batch carries it as the EXCEL_BATCH reference id.
    #[instrument(skip(self))]
    pub async fn record_bulk_change(
        &self,
        row: BulkChangeRow,
        kind: BulkOperationKind,
        performed_by: Option<Uuid>,
        batch_id: Uuid,
        batch_number: String,
    ) -> Result<BulkChangeResult, ServiceError> {
        if row.new_stock < 0 {
            return Err(ServiceError::ValidationError(format!(
                "bulk change for product {} targets negative stock {}",
                row.product_id, row.new_stock
            )));
        }

        if row.previous_stock == row.new_stock {
            return Ok(BulkChangeResult {
                product_id: row.product_id,
                movement: None,
            });
        }

        let db = self.db_pool.as_ref();
        let batch_label = batch_number.clone();

        let movement = db
            .transaction::<_, stock_movement::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let product = Product::find_by_id(row.product_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Product {} not found", row.product_id))
                        })?;

                    if product.current_stock != row.previous_stock {
                        return Err(ServiceError::Conflict(format!(
                            "bulk row for product {} expects stock {}, system has {}",
                            product.code, row.previous_stock, product.current_stock
                        )));
                    }

                    ledger::set_product_stock(txn, &product, row.new_stock).await?;

                    ledger::record_change(
                        txn,
                        NewMovement {
                            performed_by,
                            reference: Some((ReferenceType::ExcelBatch, batch_id)),
                            batch_number: Some(batch_label),
                            unit_cost: product.unit_cost,
                            ..NewMovement::new(
                                row.product_id,
                                kind.movement_type(),
                                Some(row.previous_stock),
                                Some(row.new_stock),
                            )
                        },
                    )
                    .await?
                    .ok_or_else(|| {
                        ServiceError::InternalError("bulk change produced no movement".to_string())
                    })
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        if let Err(e) = self
            .event_sender
            .send(Event::BulkStockRecorded {
                product_id: row.product_id,
                batch_number,
                previous_stock: row.previous_stock,
                new_stock: row.new_stock,
            })
            .await
        {
            warn!(error = %e, "failed to publish bulk stock event");
        }

        Ok(BulkChangeResult {
            product_id: row.product_id,
            movement: Some(movement),
        })
    }

    /// Applies a whole batch row by row. Each row commits independently, so
    /// one stale or invalid row does not discard the rest of the file; its
    /// error is reported in place.
    #[instrument(skip(self, rows))]
    pub async fn apply_batch(
        &self,
        rows: Vec<BulkChangeRow>,
        kind: BulkOperationKind,
        performed_by: Option<Uuid>,
        batch_number: String,
    ) -> Vec<Result<BulkChangeResult, ServiceError>> {
        let batch_id = Uuid::new_v4();
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let result = self
                .record_bulk_change(row, kind, performed_by, batch_id, batch_number.clone())
                .await;
            results.push(result);
        }

        let applied = results.iter().filter(|r| r.is_ok()).count();
        info!(
            batch = %batch_number,
            total = results.len(),
            applied,
            "processed bulk stock batch"
        );
        results
    }
}
