use std::{env, str::FromStr, time::Duration};

use checkout_common::{parse_boolean_flag, MicroUsdc, Secret};
use checkout_engine::{lifecycle::LifecycleConfig, sqlite::db::{db_url, SQLITE_DB_URL}, traits::PayoutRecipient};
use log::*;
use mural_tools::MuralConfig;

const DEFAULT_CHECKOUT_HOST: &str = "0.0.0.0";
const DEFAULT_CHECKOUT_PORT: u16 = 8080;
pub const DEFAULT_DEPOSIT_ADDRESS: &str = "0xDEMOUSDCADDRESSONPOLYGON000000000";
pub const DEFAULT_NETWORK: &str = "POLYGON";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub mural: MuralConfig,
    /// Register (or re-activate) the balance-activity webhook at start-up. Needs `backend_base_url`.
    pub use_webhooks: bool,
    /// The public URL of this server, used to build the webhook callback URL.
    pub backend_base_url: Option<String>,
    /// PEM-encoded P-256 public key that webhook deliveries are verified against. Without it, deliveries are accepted
    /// unauthenticated.
    pub webhook_public_key: Option<String>,
    /// Delete every order on start-up. For demo deployments only.
    pub reset_orders_on_start: bool,
    /// Deposit address and network shown to customers when the provider account cannot be resolved.
    pub mock_deposit_address: String,
    pub mock_network: String,
    /// Browser origins allowed to make credentialed requests. When empty, any origin may call the API, but without
    /// credentials.
    pub cors_allowed_origins: Vec<String>,
    pub lifecycle: LifecycleConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CHECKOUT_HOST.to_string(),
            port: DEFAULT_CHECKOUT_PORT,
            database_url: SQLITE_DB_URL.to_string(),
            auth: AuthConfig::default(),
            mural: MuralConfig::default(),
            use_webhooks: false,
            backend_base_url: None,
            webhook_public_key: None,
            reset_orders_on_start: false,
            mock_deposit_address: DEFAULT_DEPOSIT_ADDRESS.to_string(),
            mock_network: DEFAULT_NETWORK.to_string(),
            cors_allowed_origins: Vec::new(),
            lifecycle: LifecycleConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let host = env::var("CHECKOUT_HOST").ok().unwrap_or_else(|| DEFAULT_CHECKOUT_HOST.into());
        let port = env::var("CHECKOUT_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for CHECKOUT_PORT. {e} Using the default, {DEFAULT_CHECKOUT_PORT}, \
                         instead."
                    );
                    DEFAULT_CHECKOUT_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_CHECKOUT_PORT);
        let database_url = db_url();
        let auth = AuthConfig::from_env_or_default();
        let mural = MuralConfig::new_from_env_or_default();
        let use_webhooks = parse_boolean_flag(env::var("CHECKOUT_USE_WEBHOOKS").ok(), false);
        let backend_base_url = non_empty_env("CHECKOUT_BACKEND_BASE_URL");
        if use_webhooks && backend_base_url.is_none() {
            warn!("🪛️ CHECKOUT_USE_WEBHOOKS is true but CHECKOUT_BACKEND_BASE_URL is not set. Webhooks will not be configured.");
        }
        let webhook_public_key = non_empty_env("CHECKOUT_MURAL_WEBHOOK_PUBLIC_KEY");
        if webhook_public_key.is_none() {
            warn!(
                "🚨️ CHECKOUT_MURAL_WEBHOOK_PUBLIC_KEY is not set. Webhook deliveries will NOT be authenticated. Do not \
                 run like this in production."
            );
        }
        let reset_orders_on_start = parse_boolean_flag(env::var("CHECKOUT_RESET_ORDERS_ON_START").ok(), false);
        let mock_deposit_address =
            non_empty_env("CHECKOUT_MOCK_USDC_ADDRESS").unwrap_or_else(|| DEFAULT_DEPOSIT_ADDRESS.to_string());
        let mock_network = non_empty_env("CHECKOUT_MOCK_NETWORK").unwrap_or_else(|| DEFAULT_NETWORK.to_string());
        let cors_allowed_origins =
            non_empty_env("CHECKOUT_CORS_ALLOWED_ORIGINS").map(|s| parse_origin_list(&s)).unwrap_or_default();
        if cors_allowed_origins.is_empty() {
            info!("🪛️ CHECKOUT_CORS_ALLOWED_ORIGINS is not set. Any origin may call the API, without credentials.");
        } else {
            info!("🪛️ Credentialed CORS requests are allowed from {}", cors_allowed_origins.join(", "));
        }
        let lifecycle = lifecycle_config_from_env();
        Self {
            host,
            port,
            database_url,
            auth,
            mural,
            use_webhooks,
            backend_base_url,
            webhook_public_key,
            reset_orders_on_start,
            mock_deposit_address,
            mock_network,
            cors_allowed_origins,
            lifecycle,
        }
    }
}

/// Splits a comma-separated origin list. Trailing slashes are dropped since browsers never send them.
fn parse_origin_list(s: &str) -> Vec<String> {
    s.split(',').map(|o| o.trim().trim_end_matches('/')).filter(|o| !o.is_empty()).map(String::from).collect()
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

/// Reads and parses `name`, logging and falling back to `default` when it is unset or invalid.
fn parsed_env<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {name} ({s}). {e}. Using the default, {default:?}.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default, {default:?}.");
            default
        },
    }
}

fn lifecycle_config_from_env() -> LifecycleConfig {
    let defaults = LifecycleConfig::default();
    let poll_interval = Duration::from_secs(parsed_env("CHECKOUT_POLL_INTERVAL_SECS", defaults.poll_interval.as_secs()));
    let watch_window = Duration::from_secs(parsed_env("CHECKOUT_WATCH_WINDOW_SECS", defaults.watch_window.as_secs()));
    let assume_paid_on_timeout =
        parse_boolean_flag(env::var("CHECKOUT_ASSUME_PAID_ON_TIMEOUT").ok(), defaults.assume_paid_on_timeout);
    if assume_paid_on_timeout {
        info!(
            "🪛️ Orders will be marked paid when no deposit is seen within {}s. Set CHECKOUT_ASSUME_PAID_ON_TIMEOUT=false \
             to disable.",
            watch_window.as_secs()
        );
    }
    let match_tolerance = MicroUsdc::from(parsed_env("CHECKOUT_MATCH_TOLERANCE_MICRO_USDC", defaults.match_tolerance.value()));
    let fallback_fiat_rate = parsed_env("CHECKOUT_FALLBACK_COP_RATE", defaults.fallback_fiat_rate);
    let token_symbol = non_empty_env("CHECKOUT_TOKEN_SYMBOL").unwrap_or(defaults.token_symbol);
    let exchange_rate_tolerance_mode =
        non_empty_env("CHECKOUT_EXCHANGE_RATE_TOLERANCE_MODE").unwrap_or(defaults.exchange_rate_tolerance_mode);
    let workers = parsed_env("CHECKOUT_LIFECYCLE_WORKERS", defaults.workers);
    let queue_capacity = parsed_env("CHECKOUT_LIFECYCLE_QUEUE_CAPACITY", defaults.queue_capacity);
    LifecycleConfig {
        poll_interval,
        watch_window,
        page_size: defaults.page_size,
        match_tolerance,
        assume_paid_on_timeout,
        token_symbol,
        fallback_fiat_rate,
        exchange_rate_tolerance_mode,
        recipient: recipient_from_env(),
        simulation: defaults.simulation,
        workers,
        queue_capacity,
    }
}

fn recipient_from_env() -> PayoutRecipient {
    let d = PayoutRecipient::default();
    let value = |name: &str, default: String| non_empty_env(name).unwrap_or(default);
    let recipient = PayoutRecipient {
        bank_name: value("CHECKOUT_PAYOUT_BANK_NAME", d.bank_name),
        bank_account_owner: value("CHECKOUT_PAYOUT_BANK_ACCOUNT_OWNER", d.bank_account_owner),
        bank_account_number: value("CHECKOUT_PAYOUT_BANK_ACCOUNT_NUMBER", d.bank_account_number),
        account_type: value("CHECKOUT_PAYOUT_ACCOUNT_TYPE", d.account_type),
        phone_number: value("CHECKOUT_PAYOUT_PHONE_NUMBER", d.phone_number),
        document_number: value("CHECKOUT_PAYOUT_DOCUMENT_NUMBER", d.document_number),
        document_type: value("CHECKOUT_PAYOUT_DOCUMENT_TYPE", d.document_type),
        recipient_name: value("CHECKOUT_PAYOUT_RECIPIENT_NAME", d.recipient_name),
        recipient_email: value("CHECKOUT_PAYOUT_RECIPIENT_EMAIL", d.recipient_email),
        ..d
    };
    info!("🪛️ Payouts go to {} at {} ({})", recipient.bank_account_owner, recipient.bank_name, recipient.fiat_symbol);
    recipient
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
/// The two demo identities. Each has fixed credentials and a fixed bearer token.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub admin_username: String,
    pub admin_password: Secret<String>,
    pub admin_token: Secret<String>,
    pub guest_username: String,
    pub guest_password: Secret<String>,
    pub guest_token: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_username: "admin".into(),
            admin_password: Secret::new("admin".into()),
            admin_token: Secret::new("admin-token".into()),
            guest_username: "guest".into(),
            guest_password: Secret::new("guest".into()),
            guest_token: Secret::new("guest-token".into()),
        }
    }
}

impl AuthConfig {
    pub fn from_env_or_default() -> Self {
        let d = Self::default();
        let secret = |name: &str, default: Secret<String>| non_empty_env(name).map(Secret::new).unwrap_or(default);
        let admin_password = non_empty_env("CHECKOUT_ADMIN_PASSWORD").map(Secret::new).unwrap_or_else(|| {
            warn!(
                "🚨️ CHECKOUT_ADMIN_PASSWORD is not set. The admin account uses the well-known default password. Do not \
                 run like this in production."
            );
            d.admin_password.clone()
        });
        Self {
            admin_username: non_empty_env("CHECKOUT_ADMIN_USERNAME").unwrap_or(d.admin_username),
            admin_password,
            admin_token: secret("CHECKOUT_ADMIN_TOKEN", d.admin_token),
            guest_username: non_empty_env("CHECKOUT_GUEST_USERNAME").unwrap_or(d.guest_username),
            guest_password: secret("CHECKOUT_GUEST_PASSWORD", d.guest_password),
            guest_token: secret("CHECKOUT_GUEST_TOKEN", d.guest_token),
        }
    }
}
