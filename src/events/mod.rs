use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the ledger services after a successful commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ProductCreated(Uuid),
    VariantCreated {
        product_id: Uuid,
        variant_id: Uuid,
    },
    StockReserved {
        product_id: Uuid,
        order_id: Uuid,
        quantity: i32,
        new_stock: i32,
    },
    StockReleased {
        product_id: Uuid,
        order_id: Uuid,
        quantity: i32,
        new_stock: i32,
    },
    StockReconciled {
        product_id: Uuid,
        counted: i32,
        difference: i32,
    },
    BulkStockRecorded {
        product_id: Uuid,
        batch_number: String,
        previous_stock: i32,
        new_stock: i32,
    },
    MovementArchived(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel and logs each event. Integrations (webhooks,
/// notification fan-out) hook in here.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::StockReserved {
                product_id,
                order_id,
                quantity,
                new_stock,
            } => info!(
                %product_id, %order_id, quantity, new_stock,
                "stock reserved"
            ),
            Event::StockReleased {
                product_id,
                order_id,
                quantity,
                new_stock,
            } => info!(
                %product_id, %order_id, quantity, new_stock,
                "stock released"
            ),
            Event::StockReconciled {
                product_id,
                counted,
                difference,
            } => {
                if *difference != 0 {
                    warn!(%product_id, counted, difference, "stock count required correction");
                } else {
                    info!(%product_id, counted, "stock count matched system records");
                }
            }
            other => info!(event = ?other, "domain event"),
        }
    }
    info!("Event channel closed; processor shutting down");
}
