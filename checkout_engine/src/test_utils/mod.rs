//! Helpers for tests in this crate and in crates that depend on it (enable the `test_utils` feature).
mod memory_store;
pub mod prepare_env;

pub use memory_store::MemoryOrderStore;
pub use prepare_env::{prepare_test_env, random_db_url};
