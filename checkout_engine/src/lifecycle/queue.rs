use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::*;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Mutex as AsyncMutex,
};

use super::PaymentLifecycle;
use crate::{
    db_types::OrderId,
    traits::{OrderManagement, PaymentGatewayError},
};

/// Order ids that are queued or running, mapped to whether another run was requested while they were in flight.
type InFlight = Arc<Mutex<HashMap<OrderId, bool>>>;

/// A bounded job queue feeding a fixed pool of lifecycle workers.
///
/// An order is never run by two workers at once. Enqueuing an order that is already queued or running marks it for
/// one more run once the current one finishes.
///
/// Workers stop once every clone of the queue has been dropped and the channel has drained.
#[derive(Clone)]
pub struct LifecycleQueue {
    sender: mpsc::Sender<OrderId>,
    in_flight: InFlight,
}

impl LifecycleQueue {
    pub fn start<B: OrderManagement>(lifecycle: PaymentLifecycle<B>) -> Self {
        let config = lifecycle.config();
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let in_flight = InFlight::default();
        let workers = config.workers.max(1);
        for worker in 0..workers {
            let receiver = Arc::clone(&receiver);
            let lifecycle = lifecycle.clone();
            let in_flight = Arc::clone(&in_flight);
            tokio::spawn(async move {
                loop {
                    let next = receiver.lock().await.recv().await;
                    let Some(order_id) = next else { break };
                    run_job(&lifecycle, &in_flight, order_id).await;
                }
                debug!("🔄️ Lifecycle worker {worker} stopped");
            });
        }
        info!("🔄️ Lifecycle queue started with {workers} workers");
        Self { sender, in_flight }
    }

    /// Queues a lifecycle run for the order without waiting for room on the queue. Returns `false` if the order was
    /// already in flight (a rerun is scheduled instead), the queue is full, or the queue has shut down.
    ///
    /// An order that could not be queued is still stored, so start-up recovery or a later webhook picks it up.
    pub fn enqueue(&self, order_id: OrderId) -> bool {
        {
            let mut in_flight = lock(&self.in_flight);
            if let Some(rerun) = in_flight.get_mut(&order_id) {
                debug!("🔄️ Order {order_id} is already in flight. Scheduling a rerun.");
                *rerun = true;
                return false;
            }
            in_flight.insert(order_id.clone(), false);
        }
        match self.sender.try_send(order_id) {
            Ok(()) => true,
            Err(TrySendError::Full(order_id)) => {
                warn!("🔄️ The lifecycle queue is full. Order {order_id} was not queued.");
                lock(&self.in_flight).remove(&order_id);
                false
            },
            Err(TrySendError::Closed(order_id)) => {
                error!("🔄️ The lifecycle queue has shut down. Order {order_id} was not queued.");
                lock(&self.in_flight).remove(&order_id);
                false
            },
        }
    }

    /// Queues every order that has not reached a terminal status. Returns the number of orders queued.
    pub async fn recover<B: OrderManagement>(&self, db: &B) -> Result<usize, PaymentGatewayError> {
        let orders = db.fetch_unfinished_orders().await?;
        let mut queued = 0;
        for order in orders {
            if self.enqueue(order.id) {
                queued += 1;
            }
        }
        info!("🔄️ Recovered {queued} unfinished orders");
        Ok(queued)
    }

    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    pub fn is_in_flight(&self, order_id: &OrderId) -> bool {
        lock(&self.in_flight).contains_key(order_id)
    }
}

async fn run_job<B: OrderManagement>(lifecycle: &PaymentLifecycle<B>, in_flight: &InFlight, order_id: OrderId) {
    loop {
        lifecycle.run(&order_id).await;
        let again = {
            let mut in_flight = lock(in_flight);
            match in_flight.get_mut(&order_id) {
                Some(rerun) if *rerun => {
                    *rerun = false;
                    true
                },
                _ => {
                    in_flight.remove(&order_id);
                    false
                },
            }
        };
        if !again {
            break;
        }
        debug!("🔄️ Rerunning the lifecycle of order {order_id}");
    }
}

// The map is never left half-updated, so a poisoned lock is still usable.
fn lock(in_flight: &InFlight) -> MutexGuard<'_, HashMap<OrderId, bool>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}
