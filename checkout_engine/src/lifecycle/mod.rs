//! # Payment lifecycle orchestration
//!
//! Every order goes through the same progression once it has been created:
//!
//! 1. **Deposit watch** ([`deposit_watch`]): poll the settlement account for a matching USDC transfer until a deadline.
//!    When the deadline passes, the order may be marked paid anyway (see [`LifecycleConfig::assume_paid_on_timeout`]).
//! 2. **Quote and payout** ([`payout`]): obtain a COP estimate, then create and execute exactly one payout to the
//!    configured recipient.
//!
//! Orders are processed as jobs on a [`LifecycleQueue`], a fixed pool of workers fed by a bounded channel. Unfinished
//! orders are re-queued on start-up, so a restart never strands an order.
//!
//! Two side channels can also move an order forward:
//! * the authenticated balance webhook ([`webhook`]), which marks a pending order as paid and hands it to the queue;
//! * the on-demand reconciliation read ([`reconcile`]), which folds the live payout status back into the order.
//!
//! When no settlement provider is configured, the whole progression is simulated with fixed delays
//! ([`simulation`]).
mod config;
mod deposit_watch;
mod payout;
mod queue;
mod reconcile;
mod simulation;
mod webhook;

use std::sync::Arc;

pub use config::{LifecycleConfig, SettlementContext, SimulationDelays};
pub use deposit_watch::{is_matching_deposit, DepositOutcome, AUDIT_TARGET};
use log::*;
pub use queue::LifecycleQueue;
pub use reconcile::{PayoutApi, PayoutReconciliation};
pub use webhook::{match_credit_to_order, CreditEvent, WebhookOutcome, WebhookProcessor};

use crate::{
    db_types::{Order, OrderId, OrderStatusType},
    events::{EventProducers, OrderStatusChangedEvent},
    traits::{OrderManagement, PaymentGatewayError, SettlementProvider},
};

/// Runs the lifecycle of a single order. This is the unit of work executed by the [`LifecycleQueue`] workers.
///
/// All settings are immutable snapshots that are shared between jobs.
#[derive(Clone)]
pub struct PaymentLifecycle<B> {
    db: B,
    provider: Option<Arc<dyn SettlementProvider>>,
    context: Arc<SettlementContext>,
    config: Arc<LifecycleConfig>,
    producers: EventProducers,
}

impl<B: OrderManagement> PaymentLifecycle<B> {
    pub fn new(
        db: B,
        provider: Option<Arc<dyn SettlementProvider>>,
        context: SettlementContext,
        config: LifecycleConfig,
        producers: EventProducers,
    ) -> Self {
        Self { db, provider, context: Arc::new(context), config: Arc::new(config), producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn context(&self) -> Arc<SettlementContext> {
        Arc::clone(&self.context)
    }

    pub fn config(&self) -> Arc<LifecycleConfig> {
        Arc::clone(&self.config)
    }

    pub fn producers(&self) -> &EventProducers {
        &self.producers
    }

    /// Drives the order as far as it can go from its current status.
    pub async fn run(&self, order_id: &OrderId) {
        let order = match self.db.fetch_order(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                warn!("🔄️ Lifecycle started for order {order_id}, but it does not exist");
                return;
            },
            Err(e) => {
                error!("🔄️ Could not load order {order_id} to start its lifecycle. {e}");
                return;
            },
        };
        if order.status.is_terminal() {
            debug!("🔄️ Order {order_id} is already {}. Nothing to do.", order.status);
            return;
        }
        let provider = match &self.provider {
            Some(p) => Arc::clone(p),
            None => {
                info!("🔄️ No settlement provider configured. Simulating the lifecycle of order {order_id}");
                self.simulate(order).await;
                return;
            },
        };
        if order.status == OrderStatusType::PendingPayment {
            match self.watch_for_deposit(provider.as_ref(), &order).await {
                DepositOutcome::Unpaid => return,
                outcome => debug!("🔄️ Deposit watch for order {order_id} finished: {outcome:?}"),
            }
        }
        self.settle(provider.as_ref(), order_id).await;
    }
}

/// Moves an order to `next`, provided the state machine allows it, and announces the change.
///
/// The current status is re-read first, so a stale snapshot can never drag an order backwards.
pub(crate) async fn advance_status<B: OrderManagement>(
    db: &B,
    producers: &EventProducers,
    id: &OrderId,
    next: OrderStatusType,
    fiat_estimate: Option<f64>,
) -> Result<Order, PaymentGatewayError> {
    let current = db.fetch_order(id).await?.ok_or_else(|| PaymentGatewayError::OrderNotFound(id.clone()))?;
    if !current.status.can_transition_to(next) {
        warn!("🔄️ Refusing to move order {id} from {} to {next}", current.status);
        return Err(PaymentGatewayError::IllegalStatusTransition { id: id.clone(), from: current.status, to: next });
    }
    let updated = db.update_order_status(id, next, fiat_estimate).await?;
    if current.status != next {
        info!("🔄️ Order {id}: {} ➡️ {next}", current.status);
        producers.publish_status_changed(OrderStatusChangedEvent::new(updated.clone(), current.status)).await;
    }
    Ok(updated)
}
