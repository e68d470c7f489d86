//! # Checkout server
//! The HTTP surface of the USDC checkout backend. It is responsible for:
//! * Serving the product catalogue and accepting storefront orders.
//! * Handing each new order to the payment lifecycle in `checkout_engine`, which watches for the deposit and pays the
//!   proceeds out in fiat.
//! * Receiving signed balance-activity webhooks from Mural.
//! * Letting an administrator list orders, inspect the settlement account and reconcile payouts.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: Returns `ok`.
//! * `/api/login`: Exchanges a username and password for a bearer token.
//! * `/api/products`: The product catalogue.
//! * `/api/orders` and `/api/orders/{id}`: Create and fetch orders.
//! * `/api/admin/...`: Administrator routes. They need the admin bearer token.
//! * `/api/webhooks/mural`: Webhook deliveries from the settlement provider.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
