use checkout_common::MicroUsdc;

use crate::db_types::{Order, OrderId, OrderStatusType};

#[derive(Debug, Clone)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatusType) -> Self {
        Self { order, old_status }
    }
}

/// How the engine came to believe that an order was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentConfirmation {
    /// A matching transfer was found on the settlement account.
    Confirmed,
    /// An authenticated balance webhook was matched to the order.
    Webhook,
    /// The watch window expired without a match and the order was marked paid anyway.
    Assumed,
    /// No settlement provider is configured; the payment was simulated.
    Simulated,
}

#[derive(Debug, Clone)]
pub struct PaymentDetectedEvent {
    pub order_id: OrderId,
    pub amount: MicroUsdc,
    pub confirmation: PaymentConfirmation,
    /// The provider's transaction id, when there is one.
    pub transaction_id: Option<String>,
}
