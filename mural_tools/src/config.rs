use std::time::Duration;

use checkout_common::Secret;
use log::*;

pub const DEFAULT_MURAL_BASE_URL: &str = "https://api-staging.muralpay.com";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct MuralConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
    pub transfer_key: Secret<String>,
    /// Settlement account to use. When empty, the account is discovered at startup.
    pub account_id: Option<String>,
    pub timeout: Duration,
}

impl Default for MuralConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MURAL_BASE_URL.to_string(),
            api_key: Secret::default(),
            transfer_key: Secret::default(),
            account_id: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl MuralConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("CHECKOUT_MURAL_BASE_URL").ok().filter(|s| !s.trim().is_empty()).unwrap_or_else(
            || {
                info!("🏦️ CHECKOUT_MURAL_BASE_URL not set, using {DEFAULT_MURAL_BASE_URL}");
                DEFAULT_MURAL_BASE_URL.to_string()
            },
        );
        let api_key = Secret::new(std::env::var("CHECKOUT_MURAL_API_KEY").unwrap_or_else(|_| {
            warn!("🏦️ CHECKOUT_MURAL_API_KEY not set. The Mural integration will be disabled.");
            String::default()
        }));
        let transfer_key = Secret::new(std::env::var("CHECKOUT_MURAL_TRANSFER_KEY").unwrap_or_else(|_| {
            warn!("🏦️ CHECKOUT_MURAL_TRANSFER_KEY not set. Payouts can be created but not executed.");
            String::default()
        }));
        let account_id = std::env::var("CHECKOUT_MURAL_ACCOUNT_ID").ok().filter(|s| !s.trim().is_empty());
        let timeout = std::env::var("CHECKOUT_MURAL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🏦️ Invalid CHECKOUT_MURAL_TIMEOUT_SECS value ({s}): {e}. Using the default."))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        Self { base_url, api_key, transfer_key, account_id, timeout }
    }
}
