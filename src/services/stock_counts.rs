use crate::{
    db::DbPool,
    entities::{
        product::Entity as Product,
        stock_movement::{self, MovementType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::ledger::{self, NewMovement},
    services::reservations::unwrap_txn_err,
};
use sea_orm::{EntityTrait, QuerySelect, TransactionTrait};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Reconciles physical stock counts against the system aggregate.
#[derive(Clone)]
pub struct StockCountService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl StockCountService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Compares a counted quantity to the system aggregate under a row lock
    /// and emits either one informational STOCK_COUNT row (match) or one
    /// ADJUSTMENT_IN/OUT correction that also sets the aggregate to the
    /// counted value. The lock stops a concurrent reservation from racing
    /// the counted-vs-system comparison.
    #[instrument(skip(self, notes))]
    pub async fn reconcile(
        &self,
        product_id: Uuid,
        counted_quantity: i32,
        document_number: Option<String>,
        notes: Option<String>,
        performed_by: Option<Uuid>,
    ) -> Result<stock_movement::Model, ServiceError> {
        if counted_quantity < 0 {
            return Err(ServiceError::ValidationError(
                "counted quantity cannot be negative".to_string(),
            ));
        }

        let db = self.db_pool.as_ref();

        let movement = db
            .transaction::<_, stock_movement::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let current = Product::find_by_id(product_id)
                        .lock_exclusive()
                        .one(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Product {} not found", product_id))
                        })?;

                    let difference = counted_quantity - current.current_stock;

                    if difference == 0 {
                        return ledger::record_stock_count(
                            txn,
                            product_id,
                            counted_quantity,
                            document_number,
                            notes,
                            performed_by,
                        )
                        .await;
                    }

                    let movement_type = if difference > 0 {
                        MovementType::AdjustmentIn
                    } else {
                        MovementType::AdjustmentOut
                    };

                    ledger::set_product_stock(txn, &current, counted_quantity).await?;

                    ledger::record_change(
                        txn,
                        NewMovement {
                            performed_by,
                            document_number,
                            notes,
                            unit_cost: current.unit_cost,
                            ..NewMovement::new(
                                product_id,
                                movement_type,
                                Some(current.current_stock),
                                Some(counted_quantity),
                            )
                        },
                    )
                    .await?
                    .ok_or_else(|| {
                        ServiceError::InternalError(
                            "stock correction produced no movement".to_string(),
                        )
                    })
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        let difference = counted_quantity - movement.previous_stock;
        info!(
            %product_id,
            counted = counted_quantity,
            system = movement.previous_stock,
            difference,
            "reconciled stock count"
        );

        if let Err(e) = self
            .event_sender
            .send(Event::StockReconciled {
                product_id,
                counted: counted_quantity,
                difference,
            })
            .await
        {
            warn!(error = %e, "failed to publish stock count event");
        }

        Ok(movement)
    }
}
