use crate::{
    db::DbPool,
    entities::{
        product::{self, Entity as Product},
        stock_movement::{
            self, Entity as StockMovement, MovementCategory, MovementStatus, MovementType,
        },
    },
    errors::ServiceError,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Filters for the paged movement listing. Filters combine conjunctively;
/// supplying all of {type, product, date range} narrows exactly like the
/// most specific lookup would.
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub movement_type: Option<MovementType>,
    pub product_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<MovementStatus>,
}

#[derive(Debug)]
pub struct MovementPage {
    pub items: Vec<stock_movement::Model>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// A movement joined with its product's display fields.
#[derive(Debug)]
pub struct MovementDetail {
    pub movement: stock_movement::Model,
    pub product: product::Model,
}

#[derive(Debug, Clone)]
pub struct ProductSummary {
    pub product_id: Uuid,
    pub name: String,
    pub code: String,
    pub current_stock: i32,
    pub total_stock_in: i64,
    pub total_stock_out: i64,
    /// Quantity-weighted mean over movements carrying a unit cost.
    pub average_unit_cost: Option<Decimal>,
    /// average cost x current stock
    pub total_value: Option<Decimal>,
    pub last_movement_date: Option<DateTime<Utc>>,
    pub last_movement_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub stock_in: i64,
    pub stock_out: i64,
    pub net_change: i64,
    pub movement_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopProductsBy {
    MovementCount,
    TotalQuantity,
}

#[derive(Debug, Clone)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub code: String,
    pub movement_count: u64,
    pub total_quantity: i64,
}

/// Read-only queries and aggregations over the movement ledger. No locking;
/// these never mutate anything.
#[derive(Clone)]
pub struct ReportService {
    db_pool: Arc<DbPool>,
}

impl ReportService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn get_movement(&self, movement_id: Uuid) -> Result<MovementDetail, ServiceError> {
        let db = self.db_pool.as_ref();

        let movement = StockMovement::find_by_id(movement_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Stock movement {} not found", movement_id))
            })?;

        let product = Product::find_by_id(movement.product_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", movement.product_id))
            })?;

        Ok(MovementDetail { movement, product })
    }

    /// Paged listing, newest first, filtered by any combination of
    /// {type, product, date range, status}.
    #[instrument(skip(self))]
    pub async fn list_movements(
        &self,
        filter: MovementFilter,
        page: u64,
        limit: u64,
    ) -> Result<MovementPage, ServiceError> {
        let db = self.db_pool.as_ref();
        let page = page.max(1);
        let limit = limit.clamp(1, 100);

        let mut query = StockMovement::find();
        if let Some(movement_type) = filter.movement_type {
            query = query.filter(stock_movement::Column::MovementType.eq(movement_type.as_str()));
        }
        if let Some(product_id) = filter.product_id {
            query = query.filter(stock_movement::Column::ProductId.eq(product_id));
        }
        if let Some(from) = filter.from {
            query = query.filter(stock_movement::Column::MovementDate.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(stock_movement::Column::MovementDate.lte(to));
        }
        if let Some(status) = filter.status {
            query = query.filter(stock_movement::Column::Status.eq(status.as_str()));
        }

        let paginator = query
            .order_by_desc(stock_movement::Column::MovementDate)
            .paginate(db, limit);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(MovementPage {
            items,
            total,
            page,
            limit,
        })
    }

    /// Case-insensitive substring search across product name/code, notes and
    /// document number.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        term: &str,
        page: u64,
        limit: u64,
    ) -> Result<MovementPage, ServiceError> {
        let db = self.db_pool.as_ref();
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let pattern = format!("%{}%", term.to_lowercase());

        let matching_products = Product::find()
            .filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            product::Entity,
                            product::Column::Name,
                        ))))
                        .like(&pattern),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            product::Entity,
                            product::Column::Code,
                        ))))
                        .like(&pattern),
                    ),
            )
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut condition = Condition::any()
            .add(
                Expr::expr(Func::lower(Expr::col((
                    stock_movement::Entity,
                    stock_movement::Column::Notes,
                ))))
                .like(&pattern),
            )
            .add(
                Expr::expr(Func::lower(Expr::col((
                    stock_movement::Entity,
                    stock_movement::Column::DocumentNumber,
                ))))
                .like(&pattern),
            );
        if !matching_products.is_empty() {
            let ids: Vec<Uuid> = matching_products.iter().map(|p| p.id).collect();
            condition = condition.add(stock_movement::Column::ProductId.is_in(ids));
        }

        let paginator = StockMovement::find()
            .filter(stock_movement::Column::Status.eq(MovementStatus::Active.as_str()))
            .filter(condition)
            .order_by_desc(stock_movement::Column::MovementDate)
            .paginate(db, limit);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(MovementPage {
            items,
            total,
            page,
            limit,
        })
    }

    /// Batch lookup of product display fields for a page of movements.
    pub async fn product_refs(
        &self,
        ids: Vec<Uuid>,
    ) -> Result<HashMap<Uuid, product::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        let products = Product::find()
            .filter(product::Column::Id.is_in(ids))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }

    /// Per-product rollup over the active movement history.
    #[instrument(skip(self))]
    pub async fn product_summary(&self, product_id: Uuid) -> Result<ProductSummary, ServiceError> {
        let db = self.db_pool.as_ref();

        let product = Product::find_by_id(product_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let movements = StockMovement::find()
            .filter(stock_movement::Column::ProductId.eq(product_id))
            .filter(stock_movement::Column::Status.eq(MovementStatus::Active.as_str()))
            .order_by_asc(stock_movement::Column::MovementDate)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut total_in: i64 = 0;
        let mut total_out: i64 = 0;
        let mut cost_weight = Decimal::ZERO;
        let mut weighted_cost_sum = Decimal::ZERO;

        for movement in &movements {
            match movement.resolved_category() {
                MovementCategory::StockIn => total_in += movement.quantity as i64,
                MovementCategory::StockOut => total_out += movement.quantity as i64,
                MovementCategory::Informational => {}
            }
            if let Some(cost) = movement.unit_cost {
                let weight = Decimal::from(movement.quantity.max(1));
                weighted_cost_sum += cost * weight;
                cost_weight += weight;
            }
        }

        let average_unit_cost = if cost_weight > Decimal::ZERO {
            Some(weighted_cost_sum / cost_weight)
        } else {
            None
        };
        let total_value =
            average_unit_cost.map(|cost| cost * Decimal::from(product.current_stock));

        let last = movements.last();

        Ok(ProductSummary {
            product_id,
            name: product.name,
            code: product.code,
            current_stock: product.current_stock,
            total_stock_in: total_in,
            total_stock_out: total_out,
            average_unit_cost,
            total_value,
            last_movement_date: last.map(|m| m.movement_date),
            last_movement_type: last.map(|m| m.movement_type.clone()),
        })
    }

    /// Groups active movements by calendar date with per-day in/out/net.
    #[instrument(skip(self))]
    pub async fn daily_summary(
        &self,
        product_id: Option<Uuid>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<DailySummary>, ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = StockMovement::find()
            .filter(stock_movement::Column::Status.eq(MovementStatus::Active.as_str()));
        if let Some(product_id) = product_id {
            query = query.filter(stock_movement::Column::ProductId.eq(product_id));
        }
        if let Some(from) = from {
            query = query.filter(stock_movement::Column::MovementDate.gte(from));
        }
        if let Some(to) = to {
            query = query.filter(stock_movement::Column::MovementDate.lte(to));
        }

        let movements = query
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut days: BTreeMap<NaiveDate, DailySummary> = BTreeMap::new();
        for movement in movements {
            let date = movement.movement_date.date_naive();
            let entry = days.entry(date).or_insert(DailySummary {
                date,
                stock_in: 0,
                stock_out: 0,
                net_change: 0,
                movement_count: 0,
            });
            entry.movement_count += 1;
            match movement.resolved_category() {
                MovementCategory::StockIn => entry.stock_in += movement.quantity as i64,
                MovementCategory::StockOut => entry.stock_out += movement.quantity as i64,
                MovementCategory::Informational => {}
            }
            entry.net_change = entry.stock_in - entry.stock_out;
        }

        Ok(days.into_values().collect())
    }

    /// Top-N most-active products in a date range, ranked by movement count
    /// or by total moved quantity.
    #[instrument(skip(self))]
    pub async fn top_products(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        by: TopProductsBy,
        n: usize,
    ) -> Result<Vec<TopProduct>, ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = StockMovement::find()
            .filter(stock_movement::Column::Status.eq(MovementStatus::Active.as_str()));
        if let Some(from) = from {
            query = query.filter(stock_movement::Column::MovementDate.gte(from));
        }
        if let Some(to) = to {
            query = query.filter(stock_movement::Column::MovementDate.lte(to));
        }

        let movements = query
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut per_product: HashMap<Uuid, (u64, i64)> = HashMap::new();
        for movement in movements {
            let entry = per_product.entry(movement.product_id).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += movement.quantity as i64;
        }

        let mut ranked: Vec<(Uuid, u64, i64)> = per_product
            .into_iter()
            .map(|(id, (count, quantity))| (id, count, quantity))
            .collect();
        ranked.sort_by(|a, b| match by {
            TopProductsBy::MovementCount => b.1.cmp(&a.1).then(b.2.cmp(&a.2)),
            TopProductsBy::TotalQuantity => b.2.cmp(&a.2).then(b.1.cmp(&a.1)),
        });
        ranked.truncate(n);

        let ids: Vec<Uuid> = ranked.iter().map(|(id, _, _)| *id).collect();
        let products: HashMap<Uuid, product::Model> = Product::find()
            .filter(product::Column::Id.is_in(ids))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(ranked
            .into_iter()
            .filter_map(|(id, movement_count, total_quantity)| {
                products.get(&id).map(|p| TopProduct {
                    product_id: id,
                    name: p.name.clone(),
                    code: p.code.clone(),
                    movement_count,
                    total_quantity,
                })
            })
            .collect())
    }
}
