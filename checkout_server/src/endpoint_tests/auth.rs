use actix_web::{
    http::{Method, StatusCode},
    test::TestRequest,
};
use serde_json::Value;

use super::helpers::TestServer;

#[actix_web::test]
async fn health_check() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated();
    let (status, body) = server.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[actix_web::test]
async fn admin_login() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated();
    let (status, body) = server.post_json("/api/login", r#"{"username":"admin","password":"admin"}"#).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["token"], "admin-token");
    assert_eq!(json["role"], "admin");
}

#[actix_web::test]
async fn guest_login() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated();
    let (status, body) = server.post_json("/api/login", r#"{"username":"guest","password":"guest"}"#).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["token"], "guest-token");
    assert_eq!(json["role"], "guest");
}

#[actix_web::test]
async fn login_with_bad_credentials() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated();
    let (status, body) = server.post_json("/api/login", r#"{"username":"admin","password":"guest"}"#).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("Invalid username or password"));
    let (status, _) = server.post_json("/api/login", "username=admin").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn preflight(origin: &str) -> TestRequest {
    TestRequest::default()
        .method(Method::OPTIONS)
        .uri("/api/admin/orders")
        .insert_header(("Origin", origin))
        .insert_header(("Access-Control-Request-Method", "GET"))
        .insert_header(("Access-Control-Request-Headers", "authorization"))
}

#[actix_web::test]
async fn preflight_requests_short_circuit() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated();
    // No bearer token, yet the ACL never sees the request
    let (status, headers) = server.call_for_headers(preflight("http://localhost:3000")).await;
    assert!(status.is_success());
    assert_eq!(headers.get("Access-Control-Allow-Origin").unwrap(), "http://localhost:3000");
    let methods = headers.get("Access-Control-Allow-Methods").unwrap().to_str().unwrap();
    assert!(methods.contains("GET") && methods.contains("POST"));
    let allowed = headers.get("Access-Control-Allow-Headers").unwrap().to_str().unwrap().to_ascii_lowercase();
    assert!(allowed.contains("authorization"));
    // Any origin is accepted, but never with credentials
    assert!(headers.get("Access-Control-Allow-Credentials").is_none());
}

#[actix_web::test]
async fn responses_carry_cors_headers() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated();
    let origin = ("Origin", "https://shop.example.com");
    let (status, headers) =
        server.call_for_headers(TestRequest::get().uri("/api/products").insert_header(origin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("Access-Control-Allow-Origin").unwrap(), "https://shop.example.com");
    let (status, headers) =
        server.call_for_headers(TestRequest::get().uri("/api/admin/orders").insert_header(origin)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers.get("Access-Control-Allow-Origin").unwrap(), "https://shop.example.com");
    // Same-origin and server-to-server calls get no CORS headers at all
    let (_, headers) = server.call_for_headers(TestRequest::get().uri("/api/products")).await;
    assert!(headers.get("Access-Control-Allow-Origin").is_none());
}

#[actix_web::test]
async fn allow_listed_origins_get_credentials() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated().with_cors_origins(&["http://localhost:3000"]);
    let (status, headers) = server.call_for_headers(preflight("http://localhost:3000")).await;
    assert!(status.is_success());
    assert_eq!(headers.get("Access-Control-Allow-Origin").unwrap(), "http://localhost:3000");
    assert_eq!(headers.get("Access-Control-Allow-Credentials").unwrap(), "true");
}

#[actix_web::test]
async fn unknown_origins_are_refused() {
    let _ = env_logger::try_init().ok();
    let server = TestServer::simulated().with_cors_origins(&["http://localhost:3000"]);
    match server.call(preflight("https://evil.example.com")).await {
        Ok((status, _)) => assert!(!status.is_success()),
        Err(e) => assert!(e.contains("not allowed"), "{e}"),
    }
    let req = TestRequest::get().uri("/api/products").insert_header(("Origin", "https://evil.example.com"));
    match server.call(req).await {
        Ok((status, _)) => assert!(!status.is_success()),
        Err(e) => assert!(e.contains("not allowed"), "{e}"),
    }
}
