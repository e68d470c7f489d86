use actix_web::http::StatusCode;
use checkout_engine::{
    db_types::{MicroUsdc, OrderId, OrderStatusType},
    OrderManagement,
};
use serde_json::Value;

use super::helpers::{TestServer, DEPOSIT_ADDRESS};
use crate::data_objects::CreateOrderResponse;

const ORDER_JSON: &str = r#"{
    "customerName": "Ana",
    "customerEmail": "ana@example.com",
    "items": [
        {"productId": "retro-kit", "name": "Retro Kit", "priceUsdc": 3.5, "quantity": 2},
        {"productId": "starter-kit", "name": "Starter Kit", "priceUsdc": 1, "quantity": 1}
    ]
}"#;

#[actix_web::test]
async fn product_catalogue() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated();
    let (status, body) = server.get("/api/products", None).await;
    assert_eq!(status, StatusCode::OK);
    let products: Vec<Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(products.len(), 12);
    assert_eq!(products[0]["id"], "starter-kit");
    assert_eq!(products[0]["priceUsdc"], 1.0);
    assert!(products[0]["imageUrl"].as_str().unwrap().starts_with("https://"));
}

#[actix_web::test]
async fn create_and_fetch_order() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated();
    let (status, body) = server.post_json("/api/orders", ORDER_JSON).await;
    assert_eq!(status, StatusCode::CREATED);
    let created: CreateOrderResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(created.amount_usdc, MicroUsdc::from_usdc(8));
    assert_eq!(created.deposit_address, DEPOSIT_ADDRESS);
    assert_eq!(created.network, "POLYGON");

    let id: OrderId = created.order_id.parse().unwrap();
    let stored = server.db.fetch_order(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatusType::PendingPayment);
    assert!(server.state.orders().queue().is_in_flight(&id));

    let (status, body) = server.get(&format!("/api/orders/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let order: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(order["id"], created.order_id.as_str());
    assert_eq!(order["status"], "pending_payment");
    assert_eq!(order["amountUsdc"], 8.0);
    assert_eq!(order["customerEmail"], "ana@example.com");
    assert_eq!(order["items"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn invalid_orders_are_rejected() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated();
    let (status, body) = server.post_json("/api/orders", r#"{"customerName":"Ana","items":[]}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("at least one item"));

    let zero_quantity = r#"{"items":[{"productId":"a","name":"A","priceUsdc":1,"quantity":0}]}"#;
    let (status, _) = server.post_json("/api/orders", zero_quantity).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let oversized = r#"{"items":[{"productId":"a","name":"A","priceUsdc":1e12,"quantity":10}]}"#;
    let (status, body) = server.post_json("/api/orders", oversized).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("too large"));

    let (status, body) = server.post_json("/api/orders", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with(r#"{"error":"#));
    assert!(server.db.fetch_all_orders().await.unwrap().is_empty());
}

#[actix_web::test]
async fn fetch_unknown_order() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated();
    let (status, _) = server.get(&format!("/api/orders/{}", OrderId::random()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = server.get("/api/orders/not-an-order", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("not a valid order id"));
}
