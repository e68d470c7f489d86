//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Anything slow (database access, provider calls) must be awaited,
//! never blocked on. Long-running order processing belongs on the lifecycle queue, not in a handler.
use actix_web::{get, post, web, HttpResponse, Responder};
use checkout_engine::{
    db_types::{NewOrder, OrderId},
    lifecycle::{PayoutApi, SettlementContext, WebhookOutcome, WebhookProcessor},
    OrderFlowApi,
    OrderManagement,
};
use log::*;
use serde::de::DeserializeOwned;

use crate::{
    auth::{LoginRequest, Role},
    config::AuthConfig,
    data_objects::{CreateOrderRequest, CreateOrderResponse, PRODUCTS},
    errors::ServerError,
    integrations::mural::MuralSettlement,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
            impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $bound:path) => {
        paste::paste! { pub struct [<$name:camel Route>]<B>(core::marker::PhantomData<fn() -> B>);}
        paste::paste! { impl<B> [<$name:camel Route>]<B> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> B>)
            }
        }}
        paste::paste! { impl<B> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<B>
        where
            B: $bound + 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<B>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $bound:path where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]<B>(core::marker::PhantomData<fn() -> B>);}
        paste::paste! { impl<B> [<$name:camel Route>]<B> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> B>)
            }
        }}
        paste::paste! { impl<B> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<B>
        where
            B: $bound + 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<B>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $bound:path where signed) => {
        paste::paste! { pub struct [<$name:camel Route>]<B>(core::marker::PhantomData<fn() -> B>);}
        paste::paste! { impl<B> [<$name:camel Route>]<B> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> B>)
            }
        }}
        paste::paste! { impl<B> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<B>
        where
            B: $bound + 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<B>)
                    .wrap($crate::middleware::WebhookSignatureFactory::new());
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

fn parse_json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ServerError> {
    serde_json::from_slice(body).map_err(|e| {
        debug!("💻️ Could not parse request body. {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })
}

fn parse_order_id(raw: &str) -> Result<OrderId, ServerError> {
    raw.parse::<OrderId>().map_err(|e| {
        debug!("💻️ {e}");
        ServerError::InvalidRequestPath(e.to_string())
    })
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("ok")
}

//----------------------------------------------   Auth  ----------------------------------------------------
/// Exchanges a username and password for the bearer token of the guest or admin identity.
#[post("/login")]
pub async fn login(body: web::Bytes, auth: web::Data<AuthConfig>) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received login request");
    let request = parse_json_body::<LoginRequest>(&body)?;
    let response = auth.login(&request)?;
    Ok(HttpResponse::Ok().json(response))
}

//----------------------------------------------   Products  ----------------------------------------------------
#[get("/products")]
pub async fn products() -> impl Responder {
    trace!("💻️ GET products");
    HttpResponse::Ok().json(PRODUCTS)
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl OrderManagement);
/// Creates an order and queues its payment lifecycle.
///
/// The response tells the customer how much USDC to send, and where.
pub async fn create_order<B: OrderManagement>(
    body: web::Bytes,
    api: web::Data<OrderFlowApi<B>>,
    context: web::Data<SettlementContext>,
) -> Result<HttpResponse, ServerError> {
    let request = parse_json_body::<CreateOrderRequest>(&body)?;
    let order = NewOrder::try_from(request)?;
    debug!("💻️ POST new order for {} ({} items)", order.customer_name, order.items.len());
    let order = api.create_order(order).await?;
    let response = CreateOrderResponse {
        order_id: order.id.to_string(),
        amount_usdc: order.amount,
        deposit_address: context.deposit_address.clone(),
        network: context.network.clone(),
    };
    Ok(HttpResponse::Created().json(response))
}

route!(order_by_id => Get "/orders/{id}" impl OrderManagement);
pub async fn order_by_id<B: OrderManagement>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = parse_order_id(&path)?;
    debug!("💻️ GET order {id}");
    let order = api.fetch_order(&id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Order {id}")))?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(all_orders => Get "/admin/orders" impl OrderManagement where requires [Role::Admin]);
/// Every order, newest first.
pub async fn all_orders<B: OrderManagement>(api: web::Data<OrderFlowApi<B>>) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET all orders");
    let orders = api.fetch_all_orders().await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(settlement_account => Get "/admin/mural/account" requires [Role::Admin]);
/// The settlement account, as the provider reports it. Mostly useful to check connectivity.
pub async fn settlement_account(
    settlement: Option<web::Data<MuralSettlement>>,
    context: web::Data<SettlementContext>,
) -> Result<HttpResponse, ServerError> {
    let settlement =
        settlement.ok_or_else(|| ServerError::ProviderUnavailable("The Mural client is not configured".into()))?;
    let account_id = context
        .account_id
        .as_deref()
        .ok_or_else(|| ServerError::ProviderUnavailable("No settlement account has been resolved".into()))?;
    debug!("💻️ GET settlement account {account_id}");
    let account = settlement.fetch_account(account_id).await.map_err(|e| {
        warn!("💻️ Could not fetch settlement account {account_id}. {e}");
        ServerError::ProviderError(e.to_string())
    })?;
    Ok(HttpResponse::Ok().json(account))
}

route!(order_payout => Get "/admin/orders/{id}/payout" impl OrderManagement where requires [Role::Admin]);
/// The stored order plus the live payout from the provider. Terminal payout outcomes are applied to the order before
/// it is returned.
pub async fn order_payout<B: OrderManagement>(
    path: web::Path<String>,
    payouts: Option<web::Data<PayoutApi<B>>>,
) -> Result<HttpResponse, ServerError> {
    let payouts =
        payouts.ok_or_else(|| ServerError::ProviderUnavailable("The Mural client is not configured".into()))?;
    let id = parse_order_id(&path)?;
    debug!("💻️ GET payout for order {id}");
    let result = payouts.reconcile(&id).await?;
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(mural_webhook => Post "/webhooks/mural" impl OrderManagement where signed);
/// Balance-activity deliveries from Mural. The signature has been checked by the time this runs.
///
/// Every delivery that parses is acknowledged with 204, whether or not it matched an order.
pub async fn mural_webhook<B: OrderManagement>(
    body: web::Bytes,
    processor: Option<web::Data<WebhookProcessor<B>>>,
) -> Result<HttpResponse, ServerError> {
    let processor =
        processor.ok_or_else(|| ServerError::ProviderUnavailable("The Mural client is not configured".into()))?;
    match processor.process(&body).await? {
        WebhookOutcome::Matched(id) => info!("🪝️ Webhook credit applied to order {id}"),
        WebhookOutcome::Unmatched => debug!("🪝️ Webhook credit did not match any order"),
        WebhookOutcome::Ignored(reason) => debug!("🪝️ Webhook ignored: {reason}"),
    }
    Ok(HttpResponse::NoContent().finish())
}
