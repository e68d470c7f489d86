//! Checkout Engine
//!
//! The checkout engine accepts storefront orders priced in USDC, watches the settlement account for the matching
//! deposit, and converts the proceeds into a fiat payout. It is provider-agnostic: the settlement provider is reached
//! through the [`traits::SettlementProvider`] trait and the order store through [`traits::OrderManagement`].
//!
//! The library is divided into these sections:
//! 1. Order storage ([`mod@sqlite`] and [`mod@db_types`]). SQLite is the supported backend. The data types used by the
//!    store are public.
//! 2. The payment lifecycle ([`mod@lifecycle`]). Each order is a job on a bounded worker queue that takes it from
//!    `pending_payment` to `withdrawn` (or `payout_error`). The webhook processor and the payout reconciliation read
//!    live here too.
//! 3. The order flow API ([`OrderFlowApi`]), which is what the HTTP layer calls to create and read orders.
//!
//! The engine also emits events when an order changes status or a payment is detected. A small actor framework
//! ([`mod@events`]) lets you hook into these and perform custom actions.
mod checkout_api;

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod lifecycle;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use checkout_api::order_flow_api::{self, OrderFlowApi};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{OrderManagement, PaymentGatewayError};
