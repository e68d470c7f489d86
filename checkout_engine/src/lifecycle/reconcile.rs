use std::sync::Arc;

use log::*;
use serde::Serialize;

use super::payout::apply_payout_state;
use crate::{
    db_types::{Order, OrderId},
    events::EventProducers,
    traits::{OrderManagement, PaymentGatewayError, PayoutRecord, SettlementProvider},
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutReconciliation {
    pub order: Order,
    /// The payout as the provider currently reports it. `None` when there is no payout yet, or the lookup failed.
    #[serde(rename = "muralPayout")]
    pub live_payout: Option<PayoutRecord>,
}

/// On-demand payout status reads for administrators.
pub struct PayoutApi<B> {
    db: B,
    provider: Arc<dyn SettlementProvider>,
    producers: EventProducers,
}

impl<B: OrderManagement> PayoutApi<B> {
    pub fn new(db: B, provider: Arc<dyn SettlementProvider>, producers: EventProducers) -> Self {
        Self { db, provider, producers }
    }

    /// Fetches the live payout for the order, stores its status, and maps terminal outcomes onto the order.
    ///
    /// A failed provider lookup does not fail the read. The stored order is returned without live data instead.
    pub async fn reconcile(&self, order_id: &OrderId) -> Result<PayoutReconciliation, PaymentGatewayError> {
        let order =
            self.db.fetch_order(order_id).await?.ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
        let payout_id = match order.payout_request_id.as_deref().filter(|s| !s.is_empty()) {
            Some(id) => id.to_string(),
            None => return Ok(PayoutReconciliation { order, live_payout: None }),
        };
        let live = match self.provider.fetch_payout(&payout_id).await {
            Ok(p) => p,
            Err(e) => {
                warn!("🏦️ Could not fetch payout {payout_id} for order {order_id}. Returning stored data only. {e}");
                return Ok(PayoutReconciliation { order, live_payout: None });
            },
        };
        if let Err(e) = self.db.update_payout_metadata(order_id, &payout_id, &live.status).await {
            warn!("🏦️ Could not refresh payout metadata for order {order_id}. {e}");
        }
        apply_payout_state(&self.db, &self.producers, order_id, &live).await;
        let order =
            self.db.fetch_order(order_id).await?.ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
        Ok(PayoutReconciliation { order, live_payout: Some(live) })
    }
}
