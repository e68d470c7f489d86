use std::{path::Path, sync::Arc, time::Duration};

use actix_cors::Cors;
use actix_web::{
    dev::Server,
    http::{header, KeepAlive},
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use checkout_engine::{
    events::{EventHandlers, EventHooks},
    helpers::WebhookVerifier,
    lifecycle::{
        LifecycleQueue,
        PaymentLifecycle,
        PayoutApi,
        SettlementContext,
        WebhookProcessor,
        AUDIT_TARGET,
    },
    traits::SettlementProvider,
    OrderFlowApi,
    OrderManagement,
    SqliteDatabase,
};
use futures::FutureExt;
use log::*;
use mural_tools::MuralApi;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::{
    config::{AuthConfig, ServerConfig},
    errors::ServerError,
    integrations::mural::{discover_settlement_context, ensure_webhook, webhook_callback_url, MuralSettlement},
    routes::{
        health,
        login,
        products,
        AllOrdersRoute,
        CreateOrderRoute,
        MuralWebhookRoute,
        OrderByIdRoute,
        OrderPayoutRoute,
        SettlementAccountRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 64;
const MAX_DB_CONNECTIONS: u32 = 25;
const CORS_MAX_AGE_SECS: usize = 3600;

/// Everything the request handlers need, wrapped as app data.
///
/// The provider-backed pieces are optional. Without them, the admin payout and account routes and the webhook answer
/// 503, and orders are simulated.
pub struct ServerState<B> {
    orders: web::Data<OrderFlowApi<B>>,
    context: web::Data<SettlementContext>,
    auth: web::Data<AuthConfig>,
    payouts: Option<web::Data<PayoutApi<B>>>,
    webhooks: Option<web::Data<WebhookProcessor<B>>>,
    verifier: Option<web::Data<WebhookVerifier>>,
    settlement: Option<web::Data<MuralSettlement>>,
}

impl<B> Clone for ServerState<B> {
    fn clone(&self) -> Self {
        Self {
            orders: self.orders.clone(),
            context: self.context.clone(),
            auth: self.auth.clone(),
            payouts: self.payouts.clone(),
            webhooks: self.webhooks.clone(),
            verifier: self.verifier.clone(),
            settlement: self.settlement.clone(),
        }
    }
}

impl<B: OrderManagement> ServerState<B> {
    pub fn new(orders: OrderFlowApi<B>, context: SettlementContext, auth: AuthConfig) -> Self {
        Self {
            orders: web::Data::new(orders),
            context: web::Data::new(context),
            auth: web::Data::new(auth),
            payouts: None,
            webhooks: None,
            verifier: None,
            settlement: None,
        }
    }

    pub fn with_payouts(mut self, payouts: PayoutApi<B>) -> Self {
        self.payouts = Some(web::Data::new(payouts));
        self
    }

    pub fn with_webhooks(mut self, processor: WebhookProcessor<B>) -> Self {
        self.webhooks = Some(web::Data::new(processor));
        self
    }

    pub fn with_verifier(mut self, verifier: WebhookVerifier) -> Self {
        self.verifier = Some(web::Data::new(verifier));
        self
    }

    pub fn with_settlement(mut self, settlement: MuralSettlement) -> Self {
        self.settlement = Some(web::Data::new(settlement));
        self
    }

    pub fn orders(&self) -> &OrderFlowApi<B> {
        self.orders.get_ref()
    }

    /// Registers the app data and every route.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.orders.clone()).app_data(self.context.clone()).app_data(self.auth.clone());
        if let Some(payouts) = &self.payouts {
            cfg.app_data(payouts.clone());
        }
        if let Some(webhooks) = &self.webhooks {
            cfg.app_data(webhooks.clone());
        }
        if let Some(verifier) = &self.verifier {
            cfg.app_data(verifier.clone());
        }
        if let Some(settlement) = &self.settlement {
            cfg.app_data(settlement.clone());
        }
        let api_scope = web::scope("/api")
            .service(login)
            .service(products)
            .service(CreateOrderRoute::<B>::new())
            .service(OrderByIdRoute::<B>::new())
            .service(AllOrdersRoute::<B>::new())
            .service(OrderPayoutRoute::<B>::new())
            .service(SettlementAccountRoute::new())
            .service(MuralWebhookRoute::<B>::new());
        cfg.service(health).service(api_scope);
    }
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = open_database(&config).await?;
    let state = build_state(&config, db).await?;
    let srv = create_server_instance(&config, state)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance<B: OrderManagement>(
    config: &ServerConfig,
    state: ServerState<B>,
) -> Result<Server, ServerError> {
    let origins = config.cors_allowed_origins.clone();
    let srv = HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(cors_middleware(&origins))
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("checkout::access_log"))
            .configure(|cfg| state.configure(cfg))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// CORS for the storefront and admin frontends. Preflight requests are answered here and never reach a route.
///
/// With an allow-list, only those origins are accepted and they may send credentials. Without one, any origin is
/// accepted but credentials are not.
pub fn cors_middleware(allowed_origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(CORS_MAX_AGE_SECS);
    if allowed_origins.is_empty() {
        return cors.allow_any_origin();
    }
    allowed_origins.iter().fold(cors, |cors, origin| cors.allowed_origin(origin)).supports_credentials()
}

/// Opens (creating it if needed) and migrates the order database. Clears it when a reset was requested.
pub async fn open_database(config: &ServerConfig) -> Result<SqliteDatabase, ServerError> {
    let url = config.database_url.as_str();
    let exists = Sqlite::database_exists(url).await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if !exists {
        if let Some(dir) = sqlite_path(url).and_then(Path::parent).filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        info!("🗃️ Creating database at {url}");
        Sqlite::create_database(url).await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    }
    let db = SqliteDatabase::new_with_url(url, MAX_DB_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.reset_orders_on_start {
        let count = db.reset_orders().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
        warn!("🗃️ CHECKOUT_RESET_ORDERS_ON_START is set. Deleted {count} orders.");
    }
    Ok(db)
}

fn sqlite_path(url: &str) -> Option<&Path> {
    let path = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or(path);
    (!path.is_empty() && path != ":memory:").then(|| Path::new(path))
}

/// Connects to the settlement provider, starts the event handlers and the lifecycle queue, and re-queues unfinished
/// orders.
pub async fn build_state<B: OrderManagement>(config: &ServerConfig, db: B) -> Result<ServerState<B>, ServerError> {
    let (settlement, context) = connect_provider(config).await;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, audit_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let provider = settlement.clone().map(|s| Arc::new(s) as Arc<dyn SettlementProvider>);
    let lifecycle = PaymentLifecycle::new(
        db.clone(),
        provider.clone(),
        context.clone(),
        config.lifecycle.clone(),
        producers.clone(),
    );
    let shared_context = lifecycle.context();
    let queue = LifecycleQueue::start(lifecycle);
    let orders = OrderFlowApi::new(db.clone(), queue.clone());
    if let Err(e) = orders.recover_unfinished_orders().await {
        error!("🔄️ Could not recover unfinished orders. They will be retried on the next restart. {e}");
    }
    let mut state = ServerState::new(orders, context, config.auth.clone());
    if let Some(pem) = &config.webhook_public_key {
        let verifier = WebhookVerifier::from_pem(pem)
            .map_err(|e| ServerError::ConfigurationError(format!("CHECKOUT_MURAL_WEBHOOK_PUBLIC_KEY: {e}")))?;
        state = state.with_verifier(verifier);
    } else {
        warn!("🪝️ CHECKOUT_MURAL_WEBHOOK_PUBLIC_KEY is not set. Webhook deliveries will NOT be authenticated.");
    }
    if let (Some(settlement), Some(provider)) = (settlement, provider) {
        let token_symbol = config.lifecycle.token_symbol.clone();
        state = state
            .with_payouts(PayoutApi::new(db.clone(), provider, producers.clone()))
            .with_webhooks(WebhookProcessor::new(db, queue, shared_context, token_symbol, producers))
            .with_settlement(settlement);
    }
    Ok(state)
}

/// Builds the Mural client and resolves the settlement context. Without an API key, or if the client cannot be built,
/// there is no provider and the configured mock deposit details are used.
async fn connect_provider(config: &ServerConfig) -> (Option<MuralSettlement>, SettlementContext) {
    let fallback = SettlementContext {
        deposit_address: config.mock_deposit_address.clone(),
        network: config.mock_network.clone(),
        ..Default::default()
    };
    if config.mural.api_key.is_empty() {
        info!("🏦️ No Mural API key configured. Order lifecycles will be simulated.");
        return (None, fallback);
    }
    let api = match MuralApi::new(config.mural.clone()) {
        Ok(api) => api,
        Err(e) => {
            error!("🏦️ Could not create the Mural client. Order lifecycles will be simulated. {e}");
            return (None, fallback);
        },
    };
    let (api, context) = discover_settlement_context(
        &api,
        config.mural.account_id.as_deref(),
        &config.mock_deposit_address,
        &config.mock_network,
    )
    .await;
    if config.use_webhooks {
        if let Some(base) = &config.backend_base_url {
            let url = webhook_callback_url(base);
            match ensure_webhook(&api, &url).await {
                Some(w) => info!("🏦️ Webhook {} for {} is {}", w.id, w.url, w.status),
                None => warn!("🏦️ No webhook is registered for {url}. Deposits will only be found by polling."),
            }
        }
    }
    (Some(MuralSettlement::new(api)), context)
}

fn audit_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_status_changed(|ev| {
        info!(target: AUDIT_TARGET, "Order {} moved from {} to {}", ev.order.id, ev.old_status, ev.order.status);
        async {}.boxed()
    });
    hooks.on_payment_detected(|ev| {
        let tx = ev.transaction_id.as_deref().unwrap_or("none");
        info!(
            target: AUDIT_TARGET,
            "Payment of {} for order {} detected. Confirmation: {:?}. Transaction: {tx}",
            ev.amount,
            ev.order_id,
            ev.confirmation
        );
        async {}.boxed()
    });
    hooks
}

#[cfg(test)]
mod test {
    use super::sqlite_path;

    #[test]
    fn sqlite_urls() {
        assert_eq!(sqlite_path("sqlite://data/checkout_store.db").unwrap().to_str(), Some("data/checkout_store.db"));
        assert_eq!(sqlite_path("sqlite:/tmp/a.db?mode=rwc").unwrap().to_str(), Some("/tmp/a.db"));
        assert!(sqlite_path("sqlite::memory:").is_none());
        assert!(sqlite_path("postgres://localhost").is_none());
    }
}
