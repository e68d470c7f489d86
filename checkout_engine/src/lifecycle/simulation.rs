use log::*;
use tokio::time::sleep;

use super::{advance_status, PaymentLifecycle};
use crate::{
    db_types::{Order, OrderStatusType},
    events::PaymentConfirmation,
    traits::OrderManagement,
};

impl<B: OrderManagement> PaymentLifecycle<B> {
    /// Stand-in for the real lifecycle when there is no settlement provider: wait, mark paid, wait, attach a fiat
    /// estimate at the fallback rate, wait, mark withdrawn.
    pub(crate) async fn simulate(&self, order: Order) {
        let delays = &self.config.simulation;
        if order.status == OrderStatusType::PendingPayment {
            sleep(delays.payment).await;
            if let Err(e) = advance_status(&self.db, &self.producers, &order.id, OrderStatusType::Paid, None).await {
                error!("🔄️ Simulated payment for order {} failed. {e}", order.id);
                return;
            }
            self.publish_payment(&order, PaymentConfirmation::Simulated, None).await;
        }
        sleep(delays.conversion).await;
        let estimate = self.config.fallback_fiat_estimate(order.amount);
        if let Err(e) =
            advance_status(&self.db, &self.producers, &order.id, OrderStatusType::Paid, Some(estimate)).await
        {
            error!("🔄️ Simulated conversion for order {} failed. {e}", order.id);
            return;
        }
        sleep(delays.withdrawal).await;
        match advance_status(&self.db, &self.producers, &order.id, OrderStatusType::Withdrawn, Some(estimate)).await {
            Ok(_) => info!("🔄️ Simulated lifecycle of order {} complete", order.id),
            Err(e) => error!("🔄️ Simulated withdrawal for order {} failed. {e}", order.id),
        }
    }
}
