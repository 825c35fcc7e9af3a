use crate::{
    db::DbPool,
    entities::{
        product::{self, Entity as Product},
        product_variant,
        stock_movement::{MovementType, ReferenceType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::ledger::{self, NewMovement},
    services::reservations::unwrap_txn_err,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Creates products and variants, seeding the ledger with their
/// INITIAL_STOCK movement in the same transaction as the aggregate row.
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn create_product(
        &self,
        name: String,
        code: String,
        initial_stock: i32,
        unit_cost: Option<Decimal>,
        performed_by: Option<Uuid>,
    ) -> Result<product::Model, ServiceError> {
        if initial_stock < 0 {
            return Err(ServiceError::ValidationError(
                "initial stock cannot be negative".to_string(),
            ));
        }

        let db = self.db_pool.as_ref();

        let created = db
            .transaction::<_, product::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let model = product::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        name: Set(name),
                        code: Set(code),
                        current_stock: Set(initial_stock),
                        version: Set(0),
                        unit_cost: Set(unit_cost),
                        created_at: Set(now),
                        updated_at: Set(now),
                    };

                    let created = model
                        .insert(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?;

                    // record_change no-ops for a zero initial stock
                    ledger::record_change(
                        txn,
                        NewMovement {
                            performed_by,
                            unit_cost,
                            ..NewMovement::new(
                                created.id,
                                MovementType::InitialStock,
                                Some(0),
                                Some(initial_stock),
                            )
                        },
                    )
                    .await?;

                    Ok(created)
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        info!(product_id = %created.id, code = %created.code, initial_stock, "created product");

        if let Err(e) = self.event_sender.send(Event::ProductCreated(created.id)).await {
            warn!(error = %e, "failed to publish product created event");
        }

        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn create_variant(
        &self,
        product_id: Uuid,
        sku: String,
        initial_stock: i32,
        performed_by: Option<Uuid>,
    ) -> Result<product_variant::Model, ServiceError> {
        if initial_stock < 0 {
            return Err(ServiceError::ValidationError(
                "initial stock cannot be negative".to_string(),
            ));
        }

        let db = self.db_pool.as_ref();

        let created = db
            .transaction::<_, product_variant::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    Product::find_by_id(product_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Product {} not found", product_id))
                        })?;

                    let now = Utc::now();
                    let model = product_variant::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        product_id: Set(product_id),
                        sku: Set(sku),
                        current_stock: Set(initial_stock),
                        version: Set(0),
                        created_at: Set(now),
                        updated_at: Set(now),
                    };

                    let created = model
                        .insert(txn)
                        .await
                        .map_err(ServiceError::DatabaseError)?;

                    ledger::record_change(
                        txn,
                        NewMovement {
                            variant_id: Some(created.id),
                            performed_by,
                            reference: Some((ReferenceType::VariantInit, created.id)),
                            ..NewMovement::new(
                                product_id,
                                MovementType::InitialStock,
                                Some(0),
                                Some(initial_stock),
                            )
                        },
                    )
                    .await?;

                    Ok(created)
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        info!(variant_id = %created.id, sku = %created.sku, initial_stock, "created product variant");

        if let Err(e) = self
            .event_sender
            .send(Event::VariantCreated {
                product_id,
                variant_id: created.id,
            })
            .await
        {
            warn!(error = %e, "failed to publish variant created event");
        }

        Ok(created)
    }
}
