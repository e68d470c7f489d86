use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType},
    traits::{OrderManagement, PaymentGatewayError},
};

#[derive(Default)]
struct Store {
    // Insertion order
    orders: Vec<Order>,
    history: HashMap<OrderId, Vec<OrderStatusType>>,
}

/// An [`OrderManagement`] backend that lives in memory. It also records every distinct status each order has been
/// in, so tests can assert on the path an order took as well as where it ended up.
#[derive(Clone, Default)]
pub struct MemoryOrderStore {
    inner: Arc<Mutex<Store>>,
}

impl MemoryOrderStore {
    pub fn status_history(&self, id: &OrderId) -> Vec<OrderStatusType> {
        self.lock().history.get(id).cloned().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<F>(&self, id: &OrderId, f: F) -> Result<Order, PaymentGatewayError>
    where F: FnOnce(&mut Order) {
        let mut store = self.lock();
        let order = store
            .orders
            .iter_mut()
            .find(|o| &o.id == id)
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(id.clone()))?;
        f(order);
        order.updated_at = Utc::now();
        let order = order.clone();
        let history = store.history.entry(id.clone()).or_default();
        if history.last() != Some(&order.status) {
            history.push(order.status);
        }
        Ok(order)
    }
}

#[async_trait]
impl OrderManagement for MemoryOrderStore {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError> {
        let mut store = self.lock();
        if store.orders.iter().any(|o| o.id == order.id) {
            return Err(PaymentGatewayError::OrderAlreadyExists(order.id));
        }
        let order = Order {
            id: order.id,
            customer_name: order.customer_name,
            customer_email: order.customer_email,
            items: Json(order.items),
            amount: order.amount,
            amount_fiat: None,
            status: OrderStatusType::PendingPayment,
            payout_request_id: None,
            payout_status: None,
            created_at: order.created_at,
            updated_at: order.created_at,
        };
        store.history.insert(order.id.clone(), vec![OrderStatusType::PendingPayment]);
        store.orders.push(order.clone());
        Ok(order)
    }

    async fn fetch_order(&self, id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        Ok(self.lock().orders.iter().find(|o| &o.id == id).cloned())
    }

    async fn fetch_all_orders(&self) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut orders = self.lock().orders.clone();
        orders.reverse();
        // Stable, so orders created in the same instant stay newest-inserted first
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn fetch_unfinished_orders(&self) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut orders =
            self.lock().orders.iter().filter(|o| !o.status.is_terminal()).cloned().collect::<Vec<Order>>();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: &OrderId,
        status: OrderStatusType,
        fiat_estimate: Option<f64>,
    ) -> Result<Order, PaymentGatewayError> {
        self.update(id, |order| {
            order.status = status;
            if fiat_estimate.is_some() {
                order.amount_fiat = fiat_estimate;
            }
        })
    }

    async fn update_payout_metadata(
        &self,
        id: &OrderId,
        payout_request_id: &str,
        payout_status: &str,
    ) -> Result<Order, PaymentGatewayError> {
        if payout_request_id.trim().is_empty() {
            return Err(PaymentGatewayError::InvalidData(format!("Empty payout request id for order {id}")));
        }
        self.update(id, |order| {
            order.payout_request_id = Some(payout_request_id.to_string());
            order.payout_status = Some(payout_status.to_string());
        })
    }

    async fn reset_orders(&self) -> Result<u64, PaymentGatewayError> {
        let mut store = self.lock();
        let count = store.orders.len() as u64;
        store.orders.clear();
        store.history.clear();
        Ok(count)
    }
}
