use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::entities::address::AddressType;
use crate::entities::order_service::ServiceType;

/// Events emitted after every successful basket mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    BasketCleared {
        session: String,
    },
    ProductAdded {
        session: String,
        position: usize,
        product_code: String,
        quantity: u32,
    },
    ProductRemoved {
        session: String,
        position: usize,
    },
    ProductEdited {
        session: String,
        position: usize,
        quantity: u32,
    },
    CouponApplied {
        session: String,
        code: String,
    },
    CouponRemoved {
        session: String,
        code: String,
    },
    AddressSet {
        session: String,
        address_type: AddressType,
    },
    AddressRemoved {
        session: String,
        address_type: AddressType,
    },
    ServiceSet {
        session: String,
        service_type: ServiceType,
        service_code: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Convenience constructor returning the sender and the receiving end.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self::new(sender), receiver)
    }

    /// Sends an event, reporting channel failures to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event and logs a warning if the receiver is gone. Basket
    /// mutations must not fail because nobody listens.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}
