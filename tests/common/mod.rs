#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use tokio::sync::mpsc;
use uuid::Uuid;

use stockledger_api::db::{establish_connection_with_config, run_migrations, DbConfig, DbPool};
use stockledger_api::entities::{order, order_item, product};
use stockledger_api::events::{process_events, EventSender};
use stockledger_api::services::AppServices;

/// Fresh in-memory database with the schema applied and services wired up.
/// A single pooled connection keeps every query on the same in-memory file.
pub async fn setup() -> (Arc<DbPool>, AppServices) {
    let config = DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        connect_timeout: Duration::from_secs(5),
        idle_timeout: Duration::from_secs(60),
        acquire_timeout: Duration::from_secs(5),
    };
    let db = establish_connection_with_config(&config)
        .await
        .expect("connect to in-memory database");
    run_migrations(&db).await.expect("apply migrations");

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(process_events(rx));
    let event_sender = Arc::new(EventSender::new(tx));

    let db = Arc::new(db);
    let services = AppServices::new(db.clone(), event_sender);
    (db, services)
}

pub async fn seed_product(
    db: &DbPool,
    name: &str,
    code: &str,
    current_stock: i32,
    unit_cost: Option<Decimal>,
) -> product::Model {
    let now = Utc::now();
    product::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        code: Set(code.to_string()),
        current_stock: Set(current_stock),
        version: Set(0),
        unit_cost: Set(unit_cost),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert product")
}

pub async fn seed_order(db: &DbPool, order_number: &str) -> order::Model {
    let now = Utc::now();
    order::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_number: Set(order_number.to_string()),
        status: Set("OPEN".to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert order")
}

pub async fn seed_order_item(
    db: &DbPool,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> order_item::Model {
    order_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        product_id: Set(product_id),
        quantity: Set(quantity),
    }
    .insert(db)
    .await
    .expect("insert order item")
}
