//! # Backend contracts
//!
//! The engine talks to two outside collaborators, and both are hidden behind traits so that the orchestration logic
//! can be exercised without a real database or a real settlement provider.
//!
//! * [`OrderManagement`] is the durable order store. It exclusively owns persisted order state.
//! * [`SettlementProvider`] is the remote service that reports incoming deposits, quotes fiat conversions and executes
//!   payouts. Every call is fallible and the engine treats failures as transient.
mod order_management;
mod settlement;

pub use order_management::{OrderManagement, PaymentGatewayError};
pub use settlement::{
    FiatQuote,
    LedgerTransaction,
    PayoutInstruction,
    PayoutRecipient,
    PayoutRecord,
    PayoutState,
    SettlementError,
    SettlementProvider,
};
