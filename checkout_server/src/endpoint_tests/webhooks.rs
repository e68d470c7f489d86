use actix_web::{http::StatusCode, test::TestRequest};
use checkout_engine::{db_types::OrderStatusType, OrderManagement};
use serde_json::json;

use super::{
    helpers::{sign_webhook, signed_webhook_request, TestServer, ACCOUNT_ID, WEBHOOK_TIMESTAMP},
    mocks::MockProvider,
};

fn credit(account_id: &str, amount: f64) -> String {
    json!({
        "eventId": "evt-1",
        "eventCategory": "MURAL_ACCOUNT_BALANCE_ACTIVITY",
        "payload": {
            "type": "account_credited",
            "accountId": account_id,
            "tokenAmount": { "tokenAmount": amount, "tokenSymbol": "USDC" }
        }
    })
    .to_string()
}

fn signed(body: &str) -> TestRequest {
    signed_webhook_request(body, &sign_webhook(WEBHOOK_TIMESTAMP, body.as_bytes()))
}

#[actix_web::test]
async fn credit_pays_the_newest_covered_order() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated().with_provider(MockProvider::new()).with_verifier();
    let too_big = server.insert_order(9).await;
    let covered = server.insert_order(5).await;
    let body = credit(ACCOUNT_ID, 7.0);
    let (status, _) = server.call(signed(&body)).await.unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    let paid = server.db.fetch_order(&covered.id).await.unwrap().unwrap();
    assert_eq!(paid.status, OrderStatusType::Paid);
    let untouched = server.db.fetch_order(&too_big.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, OrderStatusType::PendingPayment);
}

#[actix_web::test]
async fn unmatched_and_foreign_credits_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated().with_provider(MockProvider::new()).with_verifier();
    let order = server.insert_order(5).await;
    for body in [credit(ACCOUNT_ID, 1.0), credit("someone-else", 50.0)] {
        let (status, _) = server.call(signed(&body)).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
    let order = server.db.fetch_order(&order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::PendingPayment);
}

#[actix_web::test]
async fn tampered_webhooks_are_rejected() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated().with_provider(MockProvider::new()).with_verifier();
    let order = server.insert_order(5).await;
    let body = credit(ACCOUNT_ID, 7.0);
    let signature = sign_webhook(WEBHOOK_TIMESTAMP, body.as_bytes());
    let tampered = credit(ACCOUNT_ID, 70.0);
    let (status, body) = server.call(signed_webhook_request(&tampered, &signature)).await.unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("Invalid webhook signature"));
    let order = server.db.fetch_order(&order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::PendingPayment);
}

#[actix_web::test]
async fn unsigned_webhooks_are_rejected() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated().with_provider(MockProvider::new()).with_verifier();
    let req = TestRequest::post()
        .uri("/api/webhooks/mural")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(credit(ACCOUNT_ID, 7.0));
    let (status, body) = server.call(req).await.unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("Missing webhook signature headers"));
}

#[actix_web::test]
async fn malformed_payloads_are_bad_requests() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated().with_provider(MockProvider::new()).with_verifier();
    let (status, _) = server.call(signed("{\"eventCategory\": ")).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn other_event_categories_are_ignored() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated().with_provider(MockProvider::new()).with_verifier();
    let body = json!({"eventId": "evt-2", "eventCategory": "PAYOUT_REQUEST", "payload": {}}).to_string();
    let (status, _) = server.call(signed(&body)).await.unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[actix_web::test]
async fn webhooks_need_a_provider() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated().with_verifier();
    let (status, _) = server.call(signed(&credit(ACCOUNT_ID, 7.0))).await.unwrap();
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    // The signature is checked first
    let (status, _) = server.call(signed_webhook_request(&credit(ACCOUNT_ID, 7.0), "c2lnbmF0dXJl")).await.unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn without_a_public_key_deliveries_are_not_checked() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated().with_provider(MockProvider::new());
    let order = server.insert_order(5).await;
    let req = TestRequest::post()
        .uri("/api/webhooks/mural")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(credit(ACCOUNT_ID, 5.0));
    let (status, _) = server.call(req).await.unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    let order = server.db.fetch_order(&order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
}
