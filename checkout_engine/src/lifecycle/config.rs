use std::time::Duration;

use checkout_common::{MicroUsdc, USDC_CURRENCY_CODE};

use crate::traits::PayoutRecipient;

/// Fixed delays used when no settlement provider is configured.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationDelays {
    /// Before the order is marked paid.
    pub payment: Duration,
    /// Before the fallback fiat estimate is attached.
    pub conversion: Duration,
    /// Before the order is marked withdrawn.
    pub withdrawal: Duration,
}

impl Default for SimulationDelays {
    fn default() -> Self {
        Self {
            payment: Duration::from_secs(8),
            conversion: Duration::from_secs(5),
            withdrawal: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub poll_interval: Duration,
    /// How long to look for a matching deposit before giving up.
    pub watch_window: Duration,
    pub page_size: usize,
    /// Maximum absolute difference between the order total and a deposit for them to match.
    pub match_tolerance: MicroUsdc,
    /// Mark orders paid when the watch window expires without a matching deposit.
    pub assume_paid_on_timeout: bool,
    pub token_symbol: String,
    /// COP per USDC, used when no quote can be obtained.
    pub fallback_fiat_rate: f64,
    pub exchange_rate_tolerance_mode: String,
    pub recipient: PayoutRecipient,
    pub simulation: SimulationDelays,
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            watch_window: Duration::from_secs(120),
            page_size: 50,
            match_tolerance: MicroUsdc::from(1),
            assume_paid_on_timeout: true,
            token_symbol: USDC_CURRENCY_CODE.to_string(),
            fallback_fiat_rate: 4000.0,
            exchange_rate_tolerance_mode: "FLEXIBLE".to_string(),
            recipient: PayoutRecipient::default(),
            simulation: SimulationDelays::default(),
            workers: 8,
            queue_capacity: 256,
        }
    }
}

impl LifecycleConfig {
    #[allow(clippy::cast_precision_loss)]
    pub fn fallback_fiat_estimate(&self, amount: MicroUsdc) -> f64 {
        amount.as_usdc_f64() * self.fallback_fiat_rate
    }
}

/// Facts about the settlement account, resolved once at start-up and shared read-only by every job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettlementContext {
    /// The provider account that receives deposits and funds payouts.
    pub account_id: Option<String>,
    pub organization_id: Option<String>,
    /// Where customers send USDC.
    pub deposit_address: String,
    pub network: String,
}
