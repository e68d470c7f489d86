use std::{sync::Arc, time::Duration};

use actix_web::{
    http::{header::HeaderMap, StatusCode},
    test,
    test::TestRequest,
    App,
};
use checkout_engine::{
    db_types::{MicroUsdc, NewOrder, Order, OrderItem},
    events::EventProducers,
    helpers::{signed_message, WebhookVerifier, SIGNATURE_HEADER, SIGNATURE_VERSION_HEADER, TIMESTAMP_HEADER},
    lifecycle::{
        LifecycleConfig,
        LifecycleQueue,
        PaymentLifecycle,
        PayoutApi,
        SettlementContext,
        SimulationDelays,
        WebhookProcessor,
    },
    test_utils::MemoryOrderStore,
    OrderFlowApi,
    OrderManagement,
};
use log::debug;
use p256::{
    ecdsa::{signature::Signer, Signature, SigningKey},
    pkcs8::{EncodePublicKey, LineEnding},
};

use super::mocks::MockProvider;
use crate::{
    config::AuthConfig,
    server::{cors_middleware, ServerState},
};

pub const ACCOUNT_ID: &str = "acc-test-1";
pub const DEPOSIT_ADDRESS: &str = "0xTESTDEPOSITADDRESS";
pub const ADMIN_TOKEN: &str = "admin-token";
pub const GUEST_TOKEN: &str = "guest-token";

/// A test server backed by an in-memory store. Lifecycle jobs are simulated with delays long enough that they never
/// move an order during a test.
pub struct TestServer {
    pub db: MemoryOrderStore,
    pub state: ServerState<MemoryOrderStore>,
    queue: LifecycleQueue,
    context: Arc<SettlementContext>,
    cors_origins: Vec<String>,
}

impl TestServer {
    pub fn simulated() -> Self {
        let db = MemoryOrderStore::default();
        let slow = Duration::from_secs(3600);
        let config = LifecycleConfig {
            simulation: SimulationDelays { payment: slow, conversion: slow, withdrawal: slow },
            workers: 2,
            ..Default::default()
        };
        let context = SettlementContext {
            account_id: Some(ACCOUNT_ID.into()),
            organization_id: None,
            deposit_address: DEPOSIT_ADDRESS.into(),
            network: "POLYGON".into(),
        };
        let lifecycle = PaymentLifecycle::new(db.clone(), None, context.clone(), config, EventProducers::default());
        let shared_context = lifecycle.context();
        let queue = LifecycleQueue::start(lifecycle);
        let orders = OrderFlowApi::new(db.clone(), queue.clone());
        let state = ServerState::new(orders, context, AuthConfig::default());
        Self { db, state, queue, context: shared_context, cors_origins: Vec::new() }
    }

    /// Adds the provider-backed routes. The lifecycle itself stays simulated.
    pub fn with_provider(mut self, provider: MockProvider) -> Self {
        let payouts = PayoutApi::new(self.db.clone(), Arc::new(provider), EventProducers::default());
        let webhooks = WebhookProcessor::new(
            self.db.clone(),
            self.queue.clone(),
            Arc::clone(&self.context),
            "USDC".into(),
            EventProducers::default(),
        );
        self.state = self.state.with_payouts(payouts).with_webhooks(webhooks);
        self
    }

    pub fn with_cors_origins(mut self, origins: &[&str]) -> Self {
        self.cors_origins = origins.iter().map(|o| o.to_string()).collect();
        self
    }

    pub fn with_verifier(mut self) -> Self {
        let pem = signing_key().verifying_key().to_public_key_pem(LineEnding::LF).expect("Could not encode key");
        let verifier = WebhookVerifier::from_pem(&pem).expect("Invalid test key");
        self.state = self.state.with_verifier(verifier);
        self
    }

    pub async fn call(&self, req: TestRequest) -> Result<(StatusCode, String), String> {
        let state = self.state.clone();
        let app = App::new().wrap(cors_middleware(&self.cors_origins)).configure(|cfg| state.configure(cfg));
        let service = test::init_service(app).await;
        debug!("Making request");
        let res = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?;
        let status = res.status();
        let body = test::read_body(res).await;
        Ok((status, String::from_utf8_lossy(&body).into_owned()))
    }

    pub async fn call_for_headers(&self, req: TestRequest) -> (StatusCode, HeaderMap) {
        let state = self.state.clone();
        let app = App::new().wrap(cors_middleware(&self.cors_origins)).configure(|cfg| state.configure(cfg));
        let service = test::init_service(app).await;
        let res = test::call_service(&service, req.to_request()).await;
        (res.status(), res.headers().clone())
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, String) {
        let mut req = TestRequest::get().uri(path);
        if let Some(token) = token {
            req = req.insert_header(("Authorization", format!("Bearer {token}")));
        }
        self.call(req).await.expect("Request failed")
    }

    pub async fn post_json(&self, path: &str, body: &str) -> (StatusCode, String) {
        let req = TestRequest::post()
            .uri(path)
            .insert_header(("Content-Type", "application/json"))
            .set_payload(body.to_string());
        self.call(req).await.expect("Request failed")
    }

    /// Stores an order directly, without queuing its lifecycle.
    pub async fn insert_order(&self, price_usdc: i64) -> Order {
        let item = OrderItem {
            product_id: "starter-kit".into(),
            name: "Starter Kit".into(),
            price_usdc: MicroUsdc::from_usdc(price_usdc),
            quantity: 1,
        };
        let order = NewOrder::new("Test Customer".into(), None, vec![item]).expect("Invalid order");
        self.db.insert_order(order).await.expect("Could not store order")
    }
}

// DO NOT re-use this key anywhere.
fn signing_key() -> SigningKey {
    SigningKey::from_slice(&[7u8; 32]).expect("Invalid test key")
}

pub fn sign_webhook(timestamp: &str, body: &[u8]) -> String {
    let sig: Signature = signing_key().sign(&signed_message(timestamp, body));
    base64::encode(sig.to_der().as_bytes())
}

pub fn signed_webhook_request(body: &str, signature: &str) -> TestRequest {
    TestRequest::post()
        .uri("/api/webhooks/mural")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((SIGNATURE_HEADER, signature.to_string()))
        .insert_header((SIGNATURE_VERSION_HEADER, "1"))
        .insert_header((TIMESTAMP_HEADER, WEBHOOK_TIMESTAMP))
        .set_payload(body.to_string())
}

pub const WEBHOOK_TIMESTAMP: &str = "1717236000";
