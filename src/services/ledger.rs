use crate::{
    db::DbPool,
    entities::{
        order::Entity as Order,
        product::{self, Entity as Product},
        product_variant::{self, Entity as ProductVariant},
        stock_movement::{self, Entity as StockMovement, MovementStatus, MovementType, ReferenceType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Input to the ledger writer. The caller has already decided the aggregate
/// change; this only describes the row to record.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub movement_type: MovementType,
    pub previous_stock: Option<i32>,
    pub new_stock: Option<i32>,
    pub performed_by: Option<Uuid>,
    pub reference: Option<(ReferenceType, Uuid)>,
    pub document_number: Option<String>,
    pub notes: Option<String>,
    pub unit_cost: Option<Decimal>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

impl NewMovement {
    pub fn new(
        product_id: Uuid,
        movement_type: MovementType,
        previous_stock: Option<i32>,
        new_stock: Option<i32>,
    ) -> Self {
        Self {
            product_id,
            variant_id: None,
            movement_type,
            previous_stock,
            new_stock,
            performed_by: None,
            reference: None,
            document_number: None,
            notes: None,
            unit_cost: None,
            batch_number: None,
            expiry_date: None,
        }
    }
}

/// Appends one immutable ledger row describing an aggregate change the caller
/// has already applied (or is applying) inside the same transaction `conn`.
///
/// Returns `Ok(None)` without writing when previous == new. A persistence
/// failure propagates so the surrounding transaction rolls back the aggregate
/// mutation together with the ledger write.
pub async fn record_change<C: ConnectionTrait>(
    conn: &C,
    input: NewMovement,
) -> Result<Option<stock_movement::Model>, ServiceError> {
    let previous = input.previous_stock.unwrap_or(0);
    let new = input.new_stock.unwrap_or(0);

    if previous == new {
        return Ok(None);
    }

    if !input.movement_type.permits_delta(previous, new) {
        return Err(ServiceError::InvalidOperation(format!(
            "movement type {} does not permit a change from {} to {}",
            input.movement_type.as_str(),
            previous,
            new
        )));
    }

    if let Some((ReferenceType::Order, order_id)) = input.reference {
        Order::find_by_id(order_id)
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} referenced by movement not found", order_id))
            })?;
    }

    let quantity = (new - previous).abs();
    let now = Utc::now();

    let movement = stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(input.product_id),
        variant_id: Set(input.variant_id),
        movement_type: Set(input.movement_type.as_str().to_string()),
        quantity: Set(quantity),
        previous_stock: Set(previous),
        new_stock: Set(new),
        movement_date: Set(now),
        performed_by: Set(input.performed_by),
        reference_type: Set(input.reference.map(|(t, _)| t.as_str().to_string())),
        reference_id: Set(input.reference.map(|(_, id)| id)),
        document_number: Set(input.document_number),
        notes: Set(input.notes),
        unit_cost: Set(input.unit_cost),
        batch_number: Set(input.batch_number),
        expiry_date: Set(input.expiry_date),
        status: Set(MovementStatus::Active.as_str().to_string()),
        created_at: Set(now),
    };

    let inserted = movement
        .insert(conn)
        .await
        .map_err(ServiceError::DatabaseError)?;

    info!(
        movement_id = %inserted.id,
        product_id = %inserted.product_id,
        movement_type = %inserted.movement_type,
        quantity = inserted.quantity,
        previous_stock = previous,
        new_stock = new,
        "recorded stock movement"
    );

    Ok(Some(inserted))
}

/// Writes the informational STOCK_COUNT row for a count that matched the
/// system quantity. The one deliberate exception to the equal-stocks no-op
/// rule: previous == new == counted and the aggregate stays untouched.
pub async fn record_stock_count<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    counted: i32,
    document_number: Option<String>,
    notes: Option<String>,
    performed_by: Option<Uuid>,
) -> Result<stock_movement::Model, ServiceError> {
    let now = Utc::now();
    let movement = stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        variant_id: Set(None),
        movement_type: Set(MovementType::StockCount.as_str().to_string()),
        quantity: Set(0),
        previous_stock: Set(counted),
        new_stock: Set(counted),
        movement_date: Set(now),
        performed_by: Set(performed_by),
        reference_type: Set(Some(ReferenceType::StockCount.as_str().to_string())),
        reference_id: Set(None),
        document_number: Set(document_number),
        notes: Set(notes),
        unit_cost: Set(None),
        batch_number: Set(None),
        expiry_date: Set(None),
        status: Set(MovementStatus::Active.as_str().to_string()),
        created_at: Set(now),
    };

    movement
        .insert(conn)
        .await
        .map_err(ServiceError::DatabaseError)
}

/// Version-guarded write of the product stock projection. A stale `version`
/// means someone else won a concurrent read-then-write race; the caller's
/// transaction must fail rather than overwrite their change.
pub async fn set_product_stock<C: ConnectionTrait>(
    conn: &C,
    current: &product::Model,
    new_stock: i32,
) -> Result<(), ServiceError> {
    let result = Product::update_many()
        .col_expr(product::Column::CurrentStock, Expr::value(new_stock))
        .col_expr(product::Column::Version, Expr::value(current.version + 1))
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(current.id))
        .filter(product::Column::Version.eq(current.version))
        .exec(conn)
        .await
        .map_err(ServiceError::DatabaseError)?;

    if result.rows_affected != 1 {
        return Err(ServiceError::ConcurrentModification(current.id));
    }
    Ok(())
}

/// Version-guarded write of a variant's stock projection.
pub async fn set_variant_stock<C: ConnectionTrait>(
    conn: &C,
    current: &product_variant::Model,
    new_stock: i32,
) -> Result<(), ServiceError> {
    let result = ProductVariant::update_many()
        .col_expr(product_variant::Column::CurrentStock, Expr::value(new_stock))
        .col_expr(
            product_variant::Column::Version,
            Expr::value(current.version + 1),
        )
        .col_expr(product_variant::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product_variant::Column::Id.eq(current.id))
        .filter(product_variant::Column::Version.eq(current.version))
        .exec(conn)
        .await
        .map_err(ServiceError::DatabaseError)?;

    if result.rows_affected != 1 {
        return Err(ServiceError::ConcurrentModification(current.id));
    }
    Ok(())
}

/// Retention operations on existing ledger rows. Quantities are immutable;
/// only the status flag may change.
#[derive(Clone)]
pub struct LedgerService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl LedgerService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Archives a movement (status ACTIVE -> DELETED) for retention policy.
    pub async fn archive(&self, movement_id: Uuid) -> Result<stock_movement::Model, ServiceError> {
        let db = self.db_pool.as_ref();

        let movement = StockMovement::find_by_id(movement_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Stock movement {} not found", movement_id))
            })?;

        if movement.status() == Some(MovementStatus::Deleted) {
            return Ok(movement);
        }

        let mut active: stock_movement::ActiveModel = movement.into();
        active.status = Set(MovementStatus::Deleted.as_str().to_string());
        let archived = active
            .update(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if let Err(e) = self
            .event_sender
            .send(Event::MovementArchived(movement_id))
            .await
        {
            warn!(error = %e, "failed to publish archive event");
        }

        info!(movement_id = %movement_id, "archived stock movement");
        Ok(archived)
    }
}
