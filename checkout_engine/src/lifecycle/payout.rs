use log::*;

use super::{advance_status, PaymentLifecycle};
use crate::{
    db_types::{Order, OrderId, OrderStatusType},
    events::EventProducers,
    traits::{OrderManagement, PayoutInstruction, PayoutRecord, PayoutState, SettlementProvider},
};

impl<B: OrderManagement> PaymentLifecycle<B> {
    /// Quote, create and execute the payout for a paid order.
    ///
    /// At most one payout request is ever created per order. If the order already carries a payout id, the payout is
    /// only resumed when it is still waiting to be executed. Every failure is logged and ends the job without forcing
    /// a terminal status; the reconciliation read can pick things up later.
    pub(crate) async fn settle(&self, provider: &dyn SettlementProvider, order_id: &OrderId) {
        let order = match self.db.fetch_order(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                warn!("🔄️ Order {order_id} disappeared before its payout");
                return;
            },
            Err(e) => {
                error!("🔄️ Could not load order {order_id} for its payout. {e}");
                return;
            },
        };
        if order.status != OrderStatusType::Paid {
            debug!("🔄️ Order {order_id} is {}, not paid. No payout will be made.", order.status);
            return;
        }
        if let Some(payout_id) = order.payout_request_id.clone().filter(|s| !s.is_empty()) {
            let status = order.payout_status.clone().unwrap_or_default();
            if PayoutState::from_provider_status(&status) == PayoutState::AwaitingExecution {
                info!("🔄️ Resuming execution of payout {payout_id} for order {order_id}");
                self.execute(provider, &order, &payout_id).await;
            } else {
                info!("🔄️ Order {order_id} already has payout {payout_id} ({status}). Not creating another one.");
            }
            return;
        }
        self.attach_fiat_estimate(provider, &order).await;
        let instruction = self.payout_instruction(&order);
        let payout = match provider.create_payout(&instruction).await {
            Ok(p) => p,
            Err(e) => {
                error!("🔄️ Could not create a payout for order {order_id}. {e}");
                return;
            },
        };
        info!("🔄️ Payout {} created for order {order_id} ({})", payout.id, payout.status);
        if let Err(e) = self.db.update_payout_metadata(order_id, &payout.id, &payout.status).await {
            // Carry on: the payout exists at the provider and reconciliation can still find it.
            error!("🔄️ Could not store payout {} for order {order_id}. {e}", payout.id);
        }
        self.execute(provider, &order, &payout.id).await;
    }

    /// Stores a fiat estimate on the order. Falls back to the fixed rate when no quote is available.
    async fn attach_fiat_estimate(&self, provider: &dyn SettlementProvider, order: &Order) {
        let rail = self.config.recipient.fiat_rail_code.as_str();
        let quote = provider.quote_to_fiat(order.amount, &self.config.token_symbol, rail).await;
        let estimate = match quote.map(|q| q.into_iter().next()) {
            Ok(Some(q)) => {
                info!("🔄️ {} is quoted at {:.2} {} for order {}", order.amount, q.amount, q.currency_code, order.id);
                q.amount
            },
            Ok(None) => {
                warn!("🔄️ Empty quote for order {}. Using the fallback rate.", order.id);
                self.config.fallback_fiat_estimate(order.amount)
            },
            Err(e) => {
                warn!("🔄️ Quote failed for order {}. Using the fallback rate. {e}", order.id);
                self.config.fallback_fiat_estimate(order.amount)
            },
        };
        if let Err(e) =
            advance_status(&self.db, &self.producers, &order.id, OrderStatusType::Paid, Some(estimate)).await
        {
            error!("🔄️ Could not store the fiat estimate for order {}. {e}", order.id);
        }
    }

    fn payout_instruction(&self, order: &Order) -> PayoutInstruction {
        PayoutInstruction {
            source_account_id: self.context.account_id.clone().unwrap_or_default(),
            memo: format!("Order {}", order.id),
            amount: order.amount,
            token_symbol: self.config.token_symbol.clone(),
            recipient: self.config.recipient.clone(),
            idempotency_key: Some(order.id.to_string()),
        }
    }

    async fn execute(&self, provider: &dyn SettlementProvider, order: &Order, payout_id: &str) {
        let tolerance = self.config.exchange_rate_tolerance_mode.as_str();
        let payout = match provider.execute_payout(payout_id, tolerance).await {
            Ok(p) => p,
            Err(e) => {
                error!("🔄️ Could not execute payout {payout_id} for order {}. {e}", order.id);
                return;
            },
        };
        if let Err(e) = self.db.update_payout_metadata(&order.id, &payout.id, &payout.status).await {
            error!("🔄️ Could not store the status of payout {payout_id} for order {}. {e}", order.id);
        }
        apply_payout_state(&self.db, &self.producers, &order.id, &payout).await;
    }
}

/// Maps a terminal provider status onto the order. Non-terminal statuses leave the order alone.
///
/// The order state machine still applies, so a settled order is never rewritten and a pending order never jumps
/// straight to a payout outcome.
pub(crate) async fn apply_payout_state<B: OrderManagement>(
    db: &B,
    producers: &EventProducers,
    order_id: &OrderId,
    payout: &PayoutRecord,
) {
    let next = match PayoutState::from_provider_status(&payout.status) {
        PayoutState::Executed => OrderStatusType::Withdrawn,
        PayoutState::Failed => OrderStatusType::PayoutError,
        _ => {
            debug!("🔄️ Payout {} for order {order_id} is {}", payout.id, payout.status);
            return;
        },
    };
    // Re-read so the withdrawal carries the latest stored estimate
    let estimate = match db.fetch_order(order_id).await {
        Ok(Some(o)) => o.amount_fiat,
        Ok(None) => None,
        Err(e) => {
            warn!("🔄️ Could not reload order {order_id} before recording payout {}. {e}", payout.id);
            None
        },
    };
    match advance_status(db, producers, order_id, next, estimate).await {
        Ok(_) => info!("🔄️ Payout {} for order {order_id} is {}", payout.id, payout.status),
        Err(e) => error!("🔄️ Could not record payout {} outcome for order {order_id}. {e}", payout.id),
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use checkout_common::MicroUsdc;
    use mockall::predicate::eq;

    use super::*;
    use crate::{
        db_types::{NewOrder, OrderItem},
        lifecycle::{
            mocks::{payout_record, MockProvider},
            LifecycleConfig,
            SettlementContext,
        },
        test_utils::MemoryOrderStore,
        traits::{FiatQuote, SettlementError},
    };

    async fn paid_order(db: &MemoryOrderStore, usdc: i64) -> Order {
        let item = OrderItem {
            product_id: "p1".into(),
            name: "Coffee".into(),
            price_usdc: MicroUsdc::from_usdc(usdc),
            quantity: 1,
        };
        let order = db.insert_order(NewOrder::new("Bob".into(), None, vec![item]).unwrap()).await.unwrap();
        db.update_order_status(&order.id, OrderStatusType::Paid, None).await.unwrap()
    }

    fn lifecycle(db: MemoryOrderStore, provider: MockProvider) -> PaymentLifecycle<MemoryOrderStore> {
        let context = SettlementContext { account_id: Some("acc-1".into()), ..Default::default() };
        PaymentLifecycle::new(
            db,
            Some(Arc::new(provider)),
            context,
            LifecycleConfig::default(),
            EventProducers::default(),
        )
    }

    #[tokio::test]
    async fn full_payout() {
        let db = MemoryOrderStore::default();
        let order = paid_order(&db, 10).await;
        let mut provider = MockProvider::new();
        provider
            .expect_quote_to_fiat()
            .with(eq(MicroUsdc::from_usdc(10)), eq("USDC"), eq("cop"))
            .times(1)
            .returning(|_, _, _| Ok(vec![FiatQuote { amount: 41_234.5, currency_code: "COP".into() }]));
        let memo = format!("Order {}", order.id);
        let key = order.id.to_string();
        provider
            .expect_create_payout()
            .withf(move |i| {
                i.memo == memo &&
                    i.source_account_id == "acc-1" &&
                    i.amount == MicroUsdc::from_usdc(10) &&
                    i.idempotency_key.as_deref() == Some(key.as_str())
            })
            .times(1)
            .returning(|_| Ok(payout_record("po-1", "AWAITING_EXECUTION")));
        provider
            .expect_execute_payout()
            .with(eq("po-1"), eq("FLEXIBLE"))
            .times(1)
            .returning(|_, _| Ok(payout_record("po-1", "EXECUTED")));
        let lc = lifecycle(db.clone(), provider);
        lc.settle(lc.provider.as_ref().unwrap().as_ref(), &order.id).await;
        let order = db.fetch_order(&order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatusType::Withdrawn);
        assert_eq!(order.amount_fiat, Some(41_234.5));
        assert_eq!(order.payout_request_id.as_deref(), Some("po-1"));
        assert_eq!(order.payout_status.as_deref(), Some("EXECUTED"));
    }

    #[tokio::test]
    async fn quote_failure_uses_fallback_rate_and_create_failure_stops() {
        let db = MemoryOrderStore::default();
        let order = paid_order(&db, 3).await;
        let mut provider = MockProvider::new();
        provider
            .expect_quote_to_fiat()
            .times(1)
            .returning(|_, _, _| Err(SettlementError::Transport("timeout".into())));
        provider.expect_create_payout().times(1).returning(|_| Err(SettlementError::Rejected("no funds".into())));
        provider.expect_execute_payout().never();
        let lc = lifecycle(db.clone(), provider);
        lc.settle(lc.provider.as_ref().unwrap().as_ref(), &order.id).await;
        let order = db.fetch_order(&order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatusType::Paid);
        assert_eq!(order.amount_fiat, Some(12_000.0));
        assert!(order.payout_request_id.is_none());
    }

    #[tokio::test]
    async fn payouts_are_created_at_most_once() {
        let db = MemoryOrderStore::default();
        let order = paid_order(&db, 5).await;
        let mut provider = MockProvider::new();
        provider.expect_quote_to_fiat().times(1).returning(|_, _, _| Ok(vec![]));
        provider.expect_create_payout().times(1).returning(|_| Ok(payout_record("po-9", "AWAITING_EXECUTION")));
        // The first execution fails, the rerun resumes the same payout
        let mut calls = 0;
        provider.expect_execute_payout().with(eq("po-9"), eq("FLEXIBLE")).times(2).returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Err(SettlementError::Transport("connection reset".into()))
            } else {
                Ok(payout_record("po-9", "PENDING"))
            }
        });
        let lc = lifecycle(db.clone(), provider);
        let provider = lc.provider.clone().unwrap();
        lc.settle(provider.as_ref(), &order.id).await;
        lc.settle(provider.as_ref(), &order.id).await;
        // Not awaiting execution any more, so nothing else happens
        lc.settle(provider.as_ref(), &order.id).await;
        let order = db.fetch_order(&order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatusType::Paid);
        assert_eq!(order.amount_fiat, Some(20_000.0));
        assert_eq!(order.payout_status.as_deref(), Some("PENDING"));
    }

    #[tokio::test]
    async fn failed_payouts_become_payout_errors() {
        let db = MemoryOrderStore::default();
        let order = paid_order(&db, 1).await;
        let mut provider = MockProvider::new();
        provider.expect_quote_to_fiat().returning(|_, _, _| Ok(vec![]));
        provider.expect_create_payout().returning(|_| Ok(payout_record("po-2", "AWAITING_EXECUTION")));
        provider.expect_execute_payout().returning(|_, _| Ok(payout_record("po-2", "FAILED")));
        let lc = lifecycle(db.clone(), provider);
        lc.settle(lc.provider.as_ref().unwrap().as_ref(), &order.id).await;
        let order = db.fetch_order(&order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatusType::PayoutError);
        assert_eq!(order.amount_fiat, Some(4000.0));
    }

    #[tokio::test]
    async fn payout_outcomes_follow_the_state_machine() {
        let db = MemoryOrderStore::default();
        let producers = EventProducers::default();
        let failed = paid_order(&db, 2).await;
        db.update_order_status(&failed.id, OrderStatusType::PayoutError, None).await.unwrap();
        apply_payout_state(&db, &producers, &failed.id, &payout_record("po-3", "EXECUTED")).await;
        assert_eq!(db.fetch_order(&failed.id).await.unwrap().unwrap().status, OrderStatusType::PayoutError);

        let item =
            OrderItem { product_id: "p2".into(), name: "Mug".into(), price_usdc: MicroUsdc::from_usdc(4), quantity: 1 };
        let pending = db.insert_order(NewOrder::new("Zoe".into(), None, vec![item]).unwrap()).await.unwrap();
        apply_payout_state(&db, &producers, &pending.id, &payout_record("po-4", "FAILED")).await;
        assert_eq!(db.status_history(&pending.id), vec![OrderStatusType::PendingPayment]);
    }
}
