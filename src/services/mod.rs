pub mod bulk_updates;
pub mod ledger;
pub mod products;
pub mod reports;
pub mod reservations;
pub mod stock_counts;

use crate::db::DbPool;
use crate::events::EventSender;
use std::sync::Arc;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub ledger: Arc<ledger::LedgerService>,
    pub products: Arc<products::ProductService>,
    pub reservations: Arc<reservations::ReservationService>,
    pub stock_counts: Arc<stock_counts::StockCountService>,
    pub bulk_updates: Arc<bulk_updates::BulkUpdateService>,
    pub reports: Arc<reports::ReportService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            ledger: Arc::new(ledger::LedgerService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            products: Arc::new(products::ProductService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            reservations: Arc::new(reservations::ReservationService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            stock_counts: Arc::new(stock_counts::StockCountService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            bulk_updates: Arc::new(bulk_updates::BulkUpdateService::new(
                db_pool.clone(),
                event_sender,
            )),
            reports: Arc::new(reports::ReportService::new(db_pool)),
        }
    }
}
