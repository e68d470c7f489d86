//! A thin, typed wrapper around the Mural Pay REST API.
//!
//! Only the endpoints the checkout backend needs are covered: accounts, organizations, transaction and pay-in search,
//! token-to-fiat quotes, payout requests and webhook management.
mod api;
mod config;
mod data_objects;
mod error;

pub use api::{MuralApi, ON_BEHALF_OF_HEADER, TRANSFER_KEY_HEADER};
pub use config::{MuralConfig, DEFAULT_MURAL_BASE_URL};
pub use data_objects::*;
pub use error::MuralApiError;
