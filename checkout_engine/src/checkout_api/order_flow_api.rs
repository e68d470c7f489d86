use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderId},
    lifecycle::LifecycleQueue,
    traits::{OrderManagement, PaymentGatewayError},
};

/// `OrderFlowApi` is the entry point for storefront order traffic: it stores new orders and starts their lifecycle.
pub struct OrderFlowApi<B> {
    db: B,
    queue: LifecycleQueue,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi ({} orders in flight)", self.queue.in_flight_count())
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, queue: LifecycleQueue) -> Self {
        Self { db, queue }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn queue(&self) -> &LifecycleQueue {
        &self.queue
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement
{
    /// Stores a brand-new order and queues its lifecycle. The returned order is the stored snapshot, still
    /// `pending_payment`.
    ///
    /// The order is only queued once it has been stored, so a failed insert never starts a job.
    pub async fn create_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError> {
        let order = self.db.insert_order(order).await?;
        info!("🔄️📦️ Order {} created for {} ({} items)", order.id, order.amount, order.items.len());
        if !self.queue.enqueue(order.id.clone()) {
            warn!("🔄️📦️ The lifecycle of order {} could not be queued. It will be recovered on restart.", order.id);
        }
        Ok(order)
    }

    pub async fn fetch_order(&self, id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        self.db.fetch_order(id).await
    }

    /// All orders, newest first.
    pub async fn fetch_all_orders(&self) -> Result<Vec<Order>, PaymentGatewayError> {
        self.db.fetch_all_orders().await
    }

    /// Re-queues every unfinished order. Call once at start-up.
    pub async fn recover_unfinished_orders(&self) -> Result<usize, PaymentGatewayError> {
        self.queue.recover(&self.db).await
    }
}
