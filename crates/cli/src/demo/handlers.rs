//! Sample payloads and handlers used by the demo.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use notifier::{async_trait, Event, EventHandler, HandlerResult};

/// Raised for every order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPlaced {
    pub order_id: u64,
    pub amount_cents: u64,
}

/// Raised once an order's payment went through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCaptured {
    pub order_id: u64,
    pub amount_cents: u64,
}

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("no stock left for order {order_id}")]
    OutOfStock { order_id: u64 },
}

/// Reserves stock; every `fail_every`-th order is out of stock
pub struct InventoryReserver {
    fail_every: Option<u64>,
    delay: Duration,
    reserved: AtomicU64,
}

impl InventoryReserver {
    pub fn new(fail_every: Option<u64>, delay: Duration) -> Self {
        Self {
            fail_every,
            delay,
            reserved: AtomicU64::new(0),
        }
    }

    pub fn reserved(&self) -> u64 {
        self.reserved.load(Ordering::Relaxed)
    }

    fn out_of_stock(&self, order_id: u64) -> bool {
        self.fail_every.is_some_and(|k| order_id % k == 0)
    }
}

#[async_trait]
impl EventHandler<OrderPlaced> for InventoryReserver {
    async fn handle_event(&self, event: &Event<OrderPlaced>) -> HandlerResult {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let order_id = event.data().order_id;
        if self.out_of_stock(order_id) {
            return Err(InventoryError::OutOfStock { order_id }.into());
        }
        self.reserved.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Flags orders at or above a threshold for manual review
pub struct LargeOrderReview {
    threshold_cents: u64,
    flagged: AtomicU64,
}

impl LargeOrderReview {
    pub fn new(threshold_cents: u64) -> Self {
        Self {
            threshold_cents,
            flagged: AtomicU64::new(0),
        }
    }

    pub fn flagged(&self) -> u64 {
        self.flagged.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventHandler<OrderPlaced> for LargeOrderReview {
    fn can_handle(&self, event: &Event<OrderPlaced>) -> bool {
        event.data().amount_cents >= self.threshold_cents
    }

    async fn handle_event(&self, event: &Event<OrderPlaced>) -> HandlerResult {
        debug!(order_id = event.data().order_id, "Order flagged for review");
        self.flagged.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Audit log shared by every payload type; registered by type and resolved on first use
#[derive(Default)]
pub struct AuditTrail {
    entries: AtomicU64,
}

impl AuditTrail {
    pub fn entries(&self) -> u64 {
        self.entries.load(Ordering::Relaxed)
    }

    fn record(&self, event_name: &str, order_id: u64) {
        debug!(event = event_name, order_id, "Audit entry written");
        self.entries.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl EventHandler<OrderPlaced> for AuditTrail {
    async fn handle_event(&self, event: &Event<OrderPlaced>) -> HandlerResult {
        self.record(event.name(), event.data().order_id);
        Ok(())
    }
}

#[async_trait]
impl EventHandler<PaymentCaptured> for AuditTrail {
    async fn handle_event(&self, event: &Event<PaymentCaptured>) -> HandlerResult {
        self.record(event.name(), event.data().order_id);
        Ok(())
    }
}

/// Deterministic order amount: cycles through 5.00 .. 500.00
pub fn order_amount_cents(order_id: u64) -> u64 {
    500 + (order_id * 7_919 % 100) * 500
}
