use crate::{
    db::DbPool,
    entities::{
        order::Entity as Order,
        order_item::{self, Entity as OrderItem},
        product::{self, Entity as Product},
        stock_movement::{self, MovementType, ReferenceType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::ledger::{self, NewMovement},
};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, TransactionTrait};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Order-integration flows: stock decrement on reservation, increment on
/// cancellation/return. Every mutation pairs the aggregate write with one
/// ledger row inside a single transaction.
#[derive(Clone)]
pub struct ReservationService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ReservationService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Reserves `quantity` units of a product for an order. Rejects with
    /// InsufficientStock when the aggregate cannot cover the demand; a
    /// reservation never clamps to zero, because clamping hides demand that
    /// exceeds supply.
    #[instrument(skip(self))]
    pub async fn reserve(
        &self,
        product_id: Uuid,
        quantity: i32,
        performed_by: Option<Uuid>,
        order_id: Uuid,
    ) -> Result<stock_movement::Model, ServiceError> {
        validate_quantity(quantity)?;
        let db = self.db_pool.as_ref();

        let movement = db
            .transaction::<_, stock_movement::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    reserve_line(txn, product_id, quantity, performed_by, order_id).await
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        if let Err(e) = self
            .event_sender
            .send(Event::StockReserved {
                product_id,
                order_id,
                quantity,
                new_stock: movement.new_stock,
            })
            .await
        {
            warn!(error = %e, "failed to publish reservation event");
        }

        Ok(movement)
    }

    /// Returns `quantity` units to stock for a cancelled or returned order.
    #[instrument(skip(self))]
    pub async fn release(
        &self,
        product_id: Uuid,
        quantity: i32,
        performed_by: Option<Uuid>,
        order_id: Uuid,
    ) -> Result<stock_movement::Model, ServiceError> {
        validate_quantity(quantity)?;
        let db = self.db_pool.as_ref();

        let movement = db
            .transaction::<_, stock_movement::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    release_line(txn, product_id, quantity, performed_by, order_id).await
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        if let Err(e) = self
            .event_sender
            .send(Event::StockReleased {
                product_id,
                order_id,
                quantity,
                new_stock: movement.new_stock,
            })
            .await
        {
            warn!(error = %e, "failed to publish release event");
        }

        Ok(movement)
    }

    /// Reserves or releases every line item of an order, all-or-nothing.
    /// Availability for the whole order is validated before any line is
    /// mutated, so a late InsufficientStock cannot leave earlier lines
    /// committed.
    #[instrument(skip(self))]
    pub async fn apply_to_order(
        &self,
        order_id: Uuid,
        is_reservation: bool,
        performed_by: Option<Uuid>,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        let db = self.db_pool.as_ref();

        let order = Order::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if items.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "No order lines found for order {}",
                order_id
            )));
        }

        let movements = db
            .transaction::<_, Vec<stock_movement::Model>, ServiceError>(move |txn| {
                Box::pin(async move {
                    if is_reservation {
                        preflight_availability(txn, &items).await?;
                    }

                    let mut movements = Vec::with_capacity(items.len());
                    for item in &items {
                        let movement = if is_reservation {
                            reserve_line(txn, item.product_id, item.quantity, performed_by, order_id)
                                .await?
                        } else {
                            release_line(txn, item.product_id, item.quantity, performed_by, order_id)
                                .await?
                        };
                        movements.push(movement);
                    }
                    Ok(movements)
                })
            })
            .await
            .map_err(unwrap_txn_err)?;

        info!(
            order_number = %order.order_number,
            lines = movements.len(),
            reservation = is_reservation,
            "applied order stock changes"
        );

        for movement in &movements {
            let event = if is_reservation {
                Event::StockReserved {
                    product_id: movement.product_id,
                    order_id,
                    quantity: movement.quantity,
                    new_stock: movement.new_stock,
                }
            } else {
                Event::StockReleased {
                    product_id: movement.product_id,
                    order_id,
                    quantity: movement.quantity,
                    new_stock: movement.new_stock,
                }
            };
            if let Err(e) = self.event_sender.send(event).await {
                warn!(error = %e, "failed to publish order stock event");
            }
        }

        Ok(movements)
    }
}

fn validate_quantity(quantity: i32) -> Result<(), ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::ValidationError(
            "quantity must be positive".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn unwrap_txn_err(err: sea_orm::TransactionError<ServiceError>) -> ServiceError {
    match err {
        sea_orm::TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        sea_orm::TransactionError::Transaction(service_err) => service_err,
    }
}

async fn load_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<product::Model, ServiceError> {
    Product::find_by_id(product_id)
        .one(conn)
        .await
        .map_err(ServiceError::DatabaseError)?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
}

/// Validates the summed per-product demand of the whole order against
/// current stock before any mutation.
async fn preflight_availability<C: ConnectionTrait>(
    conn: &C,
    items: &[order_item::Model],
) -> Result<(), ServiceError> {
    let mut demand: HashMap<Uuid, i32> = HashMap::new();
    for item in items {
        validate_quantity(item.quantity)?;
        *demand.entry(item.product_id).or_insert(0) += item.quantity;
    }

    for (product_id, required) in demand {
        let product = load_product(conn, product_id).await?;
        if product.current_stock < required {
            return Err(ServiceError::InsufficientStock(format!(
                "product {} has {} units, order requires {}",
                product.code, product.current_stock, required
            )));
        }
    }
    Ok(())
}

async fn reserve_line<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
    performed_by: Option<Uuid>,
    order_id: Uuid,
) -> Result<stock_movement::Model, ServiceError> {
    let product = load_product(conn, product_id).await?;

    if product.current_stock < quantity {
        return Err(ServiceError::InsufficientStock(format!(
            "product {} has {} units, reservation requires {}",
            product.code, product.current_stock, quantity
        )));
    }

    let target = product.current_stock - quantity;
    ledger::set_product_stock(conn, &product, target).await?;

    let movement = ledger::record_change(
        conn,
        NewMovement {
            performed_by,
            reference: Some((ReferenceType::Order, order_id)),
            unit_cost: product.unit_cost,
            ..NewMovement::new(
                product_id,
                MovementType::OrderReserved,
                Some(product.current_stock),
                Some(target),
            )
        },
    )
    .await?
    .ok_or_else(|| {
        ServiceError::InternalError("reservation produced no stock change".to_string())
    })?;

    Ok(movement)
}

async fn release_line<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
    performed_by: Option<Uuid>,
    order_id: Uuid,
) -> Result<stock_movement::Model, ServiceError> {
    let product = load_product(conn, product_id).await?;

    let target = product.current_stock.checked_add(quantity).ok_or_else(|| {
        ServiceError::ValidationError(format!(
            "releasing {} units would overflow stock of product {}",
            quantity, product.code
        ))
    })?;
    ledger::set_product_stock(conn, &product, target).await?;

    let movement = ledger::record_change(
        conn,
        NewMovement {
            performed_by,
            reference: Some((ReferenceType::Order, order_id)),
            unit_cost: product.unit_cost,
            ..NewMovement::new(
                product_id,
                MovementType::OrderCancelledReturn,
                Some(product.current_stock),
                Some(target),
            )
        },
    )
    .await?
    .ok_or_else(|| ServiceError::InternalError("release produced no stock change".to_string()))?;

    Ok(movement)
}
