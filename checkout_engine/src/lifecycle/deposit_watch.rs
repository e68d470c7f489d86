use chrono::{DateTime, Utc};
use checkout_common::MicroUsdc;
use log::*;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

use super::{advance_status, PaymentLifecycle};
use crate::{
    db_types::{Order, OrderStatusType},
    events::{PaymentConfirmation, PaymentDetectedEvent},
    traits::{LedgerTransaction, OrderManagement, SettlementProvider},
};

pub const AUDIT_TARGET: &str = "checkout::audit";

#[derive(Debug, Clone, PartialEq)]
pub enum DepositOutcome {
    /// A matching transfer was found and the order was marked paid.
    Matched(LedgerTransaction),
    /// Someone else (the webhook) already marked the order paid.
    PaidElsewhere,
    /// The window expired and the order was marked paid without a matching transfer.
    Assumed,
    /// The window expired and the order is still pending.
    Unpaid,
}

/// Whether `tx` is the deposit for an order of `expected` created at `not_before`.
///
/// Transfers executed before the order existed never match. Transfers without an execution time are not rejected on
/// time alone. The symbol comparison ignores case.
///
/// Provider amounts have already been rounded to whole micro units, so with the default tolerance of one micro unit a
/// transfer less than 1.5 µUSDC away from the total still matches.
pub fn is_matching_deposit(
    tx: &LedgerTransaction,
    expected: MicroUsdc,
    not_before: DateTime<Utc>,
    token_symbol: &str,
    tolerance: MicroUsdc,
) -> bool {
    if matches!(tx.executed_at, Some(t) if t < not_before) {
        return false;
    }
    if !tx.symbol.eq_ignore_ascii_case(token_symbol) {
        return false;
    }
    tx.amount.abs_diff(expected) <= tolerance
}

impl<B: OrderManagement> PaymentLifecycle<B> {
    /// Polls the settlement account until a matching deposit turns up or the watch window closes.
    ///
    /// Polling errors are logged and retried on the next tick; only the deadline ends the loop.
    pub(crate) async fn watch_for_deposit(&self, provider: &dyn SettlementProvider, order: &Order) -> DepositOutcome {
        let deadline = Instant::now() + self.config.watch_window;
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let account_id = self.context.account_id.clone();
        if account_id.is_none() {
            warn!("🔄️ No settlement account is known. Order {} cannot be matched against deposits.", order.id);
        }
        info!("🔄️ Watching for a deposit of {} for order {}", order.amount, order.id);
        loop {
            let expired = tokio::select! {
                _ = sleep_until(deadline) => true,
                _ = ticker.tick() => false,
            };
            if expired {
                break;
            }
            match self.db.fetch_order(&order.id).await {
                Ok(Some(o)) if o.status != OrderStatusType::PendingPayment => {
                    info!("🔄️ Order {} is already {}. Stopping the deposit watch.", order.id, o.status);
                    return DepositOutcome::PaidElsewhere;
                },
                Ok(_) => {},
                Err(e) => warn!("🔄️ Could not refresh order {} during deposit watch. {e}", order.id),
            }
            let Some(account_id) = account_id.as_deref() else { continue };
            let transactions = match provider.search_transactions(account_id, self.config.page_size).await {
                Ok(txs) => txs,
                Err(e) => {
                    warn!("🔄️ Transaction search failed while watching order {}. Will retry. {e}", order.id);
                    continue;
                },
            };
            trace!("🔄️ {} transactions to check for order {}", transactions.len(), order.id);
            let found = transactions.into_iter().find(|tx| {
                is_matching_deposit(
                    tx,
                    order.amount,
                    order.created_at,
                    &self.config.token_symbol,
                    self.config.match_tolerance,
                )
            });
            if let Some(tx) = found {
                info!("🔄️ Deposit {} of {} matches order {}", tx.id, tx.amount, order.id);
                if let Err(e) = advance_status(&self.db, &self.producers, &order.id, OrderStatusType::Paid, None).await
                {
                    error!("🔄️ Could not mark order {} as paid. {e}", order.id);
                }
                self.publish_payment(order, PaymentConfirmation::Confirmed, Some(tx.id.clone())).await;
                return DepositOutcome::Matched(tx);
            }
        }
        self.on_watch_expired(order).await
    }

    async fn on_watch_expired(&self, order: &Order) -> DepositOutcome {
        // The webhook may have landed between the last tick and the deadline
        if let Ok(Some(o)) = self.db.fetch_order(&order.id).await {
            if o.status != OrderStatusType::PendingPayment {
                return DepositOutcome::PaidElsewhere;
            }
        }
        if !self.config.assume_paid_on_timeout {
            info!(
                "🔄️ No deposit for order {} after {:?}. The order stays pending until a deposit is reported.",
                order.id, self.config.watch_window
            );
            return DepositOutcome::Unpaid;
        }
        warn!(
            target: AUDIT_TARGET,
            "Order {} ({}) marked paid WITHOUT a matching deposit after {:?}",
            order.id,
            order.amount,
            self.config.watch_window
        );
        if let Err(e) = advance_status(&self.db, &self.producers, &order.id, OrderStatusType::Paid, None).await {
            error!("🔄️ Could not mark order {} as paid after the watch window. {e}", order.id);
        }
        self.publish_payment(order, PaymentConfirmation::Assumed, None).await;
        DepositOutcome::Assumed
    }

    pub(crate) async fn publish_payment(
        &self,
        order: &Order,
        confirmation: PaymentConfirmation,
        transaction_id: Option<String>,
    ) {
        let event = PaymentDetectedEvent { order_id: order.id.clone(), amount: order.amount, confirmation, transaction_id };
        self.producers.publish_payment_detected(event).await;
    }
}
