//! Turns balance-activity deliveries from the settlement provider into paid orders.
//!
//! Credit events carry no reference to an order, so matching is a heuristic: the most recently created pending order
//! whose total does not exceed the credited amount wins.
use std::sync::Arc;

use checkout_common::MicroUsdc;
use log::*;
use serde::Deserialize;

use super::{advance_status, LifecycleQueue, SettlementContext};
use crate::{
    db_types::{Order, OrderId, OrderStatusType},
    events::{EventProducers, PaymentConfirmation, PaymentDetectedEvent},
    helpers::WebhookError,
    traits::OrderManagement,
};

pub const BALANCE_ACTIVITY_CATEGORY: &str = "MURAL_ACCOUNT_BALANCE_ACTIVITY";
pub const ACCOUNT_CREDITED: &str = "account_credited";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    event_category: String,
    #[serde(default)]
    payload: Option<Payload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Payload {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    account_id: String,
    token_amount: Option<PayloadAmount>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayloadAmount {
    token_amount: f64,
    #[serde(default)]
    token_symbol: String,
}

/// A credit to a provider account, as reported by a balance-activity webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditEvent {
    pub account_id: String,
    pub amount: MicroUsdc,
    pub symbol: String,
}

impl CreditEvent {
    /// Parses a webhook body. Returns `Ok(None)` for well-formed events that are not account credits.
    pub fn from_body(body: &[u8]) -> Result<Option<Self>, WebhookError> {
        let envelope: Envelope =
            serde_json::from_slice(body).map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
        if envelope.event_category != BALANCE_ACTIVITY_CATEGORY {
            return Ok(None);
        }
        let Some(payload) = envelope.payload.filter(|p| p.kind == ACCOUNT_CREDITED) else {
            return Ok(None);
        };
        let (amount, symbol) = match payload.token_amount {
            Some(a) => {
                let amount =
                    MicroUsdc::from_usdc_f64(a.token_amount).map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
                (amount, a.token_symbol)
            },
            None => (MicroUsdc::default(), String::new()),
        };
        Ok(Some(Self { account_id: payload.account_id, amount, symbol }))
    }
}

/// Picks the order a credit most likely pays for.
///
/// `orders` must be sorted newest first, as the store lists them. The first pending order whose total is covered by
/// the credit is selected.
pub fn match_credit_to_order<'a>(orders: &'a [Order], credit: &CreditEvent) -> Option<&'a Order> {
    orders.iter().find(|o| o.status == OrderStatusType::PendingPayment && o.amount <= credit.amount)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The delivery was acknowledged without looking for an order.
    Ignored(String),
    /// No pending order fits the credit.
    Unmatched,
    Matched(OrderId),
}

/// Applies authenticated webhook deliveries to the order store.
#[derive(Clone)]
pub struct WebhookProcessor<B> {
    db: B,
    queue: LifecycleQueue,
    context: Arc<SettlementContext>,
    token_symbol: String,
    producers: EventProducers,
}

impl<B: OrderManagement> WebhookProcessor<B> {
    pub fn new(
        db: B,
        queue: LifecycleQueue,
        context: Arc<SettlementContext>,
        token_symbol: String,
        producers: EventProducers,
    ) -> Self {
        Self { db, queue, context, token_symbol, producers }
    }

    /// Processes a body whose signature has already been checked.
    ///
    /// Only an unparsable body is an error. Storage failures are logged and the delivery is still acknowledged, since
    /// a retry from the provider would not fix them.
    pub async fn process(&self, body: &[u8]) -> Result<WebhookOutcome, WebhookError> {
        let Some(credit) = CreditEvent::from_body(body)? else {
            debug!("🪝️ Ignoring a webhook that is not an account credit");
            return Ok(WebhookOutcome::Ignored("not an account credit".into()));
        };
        if let Some(reason) = self.reject_reason(&credit) {
            debug!("🪝️ Ignoring credit of {} {}: {reason}", credit.amount, credit.symbol);
            return Ok(WebhookOutcome::Ignored(reason));
        }
        let orders = match self.db.fetch_all_orders().await {
            Ok(orders) => orders,
            Err(e) => {
                error!("🪝️ Could not list orders to match a credit of {}. {e}", credit.amount);
                return Ok(WebhookOutcome::Ignored("orders unavailable".into()));
            },
        };
        let Some(order) = match_credit_to_order(&orders, &credit) else {
            info!("🪝️ No pending order matches a credit of {}", credit.amount);
            return Ok(WebhookOutcome::Unmatched);
        };
        info!("🪝️ Credit of {} matched to order {} ({})", credit.amount, order.id, order.amount);
        match advance_status(&self.db, &self.producers, &order.id, OrderStatusType::Paid, None).await {
            Ok(_) => {
                let event = PaymentDetectedEvent {
                    order_id: order.id.clone(),
                    amount: order.amount,
                    confirmation: PaymentConfirmation::Webhook,
                    transaction_id: None,
                };
                self.producers.publish_payment_detected(event).await;
            },
            Err(e) => error!("🪝️ Could not mark order {} as paid. {e}", order.id),
        }
        self.queue.enqueue(order.id.clone());
        Ok(WebhookOutcome::Matched(order.id.clone()))
    }

    fn reject_reason(&self, credit: &CreditEvent) -> Option<String> {
        if credit.account_id.is_empty() {
            return Some("no account id".into());
        }
        if let Some(account_id) = self.context.account_id.as_deref() {
            if account_id != credit.account_id {
                return Some(format!("account {} is not the settlement account", credit.account_id));
            }
        }
        if !credit.symbol.eq_ignore_ascii_case(&self.token_symbol) {
            return Some(format!("{} is not {}", credit.symbol, self.token_symbol));
        }
        None
    }
}
