use actix_web::http::StatusCode;
use checkout_engine::{
    db_types::OrderStatusType,
    traits::{PayoutRecord, SettlementError},
    OrderManagement,
};
use serde_json::Value;

use super::{
    helpers::{TestServer, ADMIN_TOKEN, GUEST_TOKEN},
    mocks::MockProvider,
};

fn payout_record(id: &str, status: &str) -> PayoutRecord {
    PayoutRecord { id: id.into(), status: status.into(), created_at: None, updated_at: None }
}

#[actix_web::test]
async fn admin_routes_need_a_token() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated();
    let (status, body) = server.get("/api/admin/orders", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("bearer token is required"));
    let (status, _) = server.get("/api/admin/mural/account", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn admin_routes_reject_guests_and_strangers() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated();
    let (status, body) = server.get("/api/admin/orders", Some(GUEST_TOKEN)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("Insufficient Permissions"));
    let (status, _) = server.get("/api/admin/orders", Some("made-up-token")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn list_all_orders() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated();
    let first = server.insert_order(2).await;
    let second = server.insert_order(3).await;
    let (status, body) = server.get("/api/admin/orders", Some(ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(orders.len(), 2);
    // Newest first
    assert_eq!(orders[0]["id"], second.id.as_str());
    assert_eq!(orders[1]["id"], first.id.as_str());
}

#[actix_web::test]
async fn provider_routes_without_a_provider() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated();
    let order = server.insert_order(2).await;
    let (status, body) = server.get(&format!("/api/admin/orders/{}/payout", order.id), Some(ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("not configured"));
    let (status, _) = server.get("/api/admin/mural/account", Some(ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn reconcile_executed_payout() {
    let _ = env_logger::try_init().ok();
    let mut provider = MockProvider::new();
    provider.expect_fetch_payout().times(1).returning(|id| Ok(payout_record(id, "EXECUTED")));
    let server = TestServer::simulated().with_provider(provider);
    let order = server.insert_order(5).await;
    server.db.update_order_status(&order.id, OrderStatusType::Paid, Some(20_000.0)).await.unwrap();
    server.db.update_payout_metadata(&order.id, "po-42", "PENDING").await.unwrap();

    let (status, body) = server.get(&format!("/api/admin/orders/{}/payout", order.id), Some(ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["order"]["status"], "withdrawn");
    assert_eq!(json["order"]["muralPayoutStatus"], "EXECUTED");
    assert_eq!(json["muralPayout"]["id"], "po-42");
    assert_eq!(json["muralPayout"]["status"], "EXECUTED");
    let stored = server.db.fetch_order(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatusType::Withdrawn);
}

#[actix_web::test]
async fn reconcile_without_payout_or_with_provider_down() {
    let _ = env_logger::try_init().ok();
    let mut provider = MockProvider::new();
    provider.expect_fetch_payout().times(1).returning(|_| Err(SettlementError::Transport("timeout".into())));
    let server = TestServer::simulated().with_provider(provider);

    let fresh = server.insert_order(1).await;
    let (status, body) = server.get(&format!("/api/admin/orders/{}/payout", fresh.id), Some(ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["order"]["status"], "pending_payment");
    assert!(json["muralPayout"].is_null());

    let paid = server.insert_order(1).await;
    server.db.update_order_status(&paid.id, OrderStatusType::Paid, None).await.unwrap();
    server.db.update_payout_metadata(&paid.id, "po-7", "PENDING").await.unwrap();
    let (status, body) = server.get(&format!("/api/admin/orders/{}/payout", paid.id), Some(ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["order"]["status"], "paid");
    assert!(json["muralPayout"].is_null());
}

#[actix_web::test]
async fn reconcile_unknown_order() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated().with_provider(MockProvider::new());
    let (status, _) = server
        .get("/api/admin/orders/0b5c1f5e-5f3a-4a4e-9d7e-2f8f9e0c1a2b/payout", Some(ADMIN_TOKEN))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = server.get("/api/admin/orders/xyz/payout", Some(ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
