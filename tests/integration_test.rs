//! Integration tests for the API.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use tower::ServiceExt;

use supplychain_gateway::api::{API_KEY_HEADER, create_router};
use supplychain_gateway::app::{AppState, ServiceSettings};
use supplychain_gateway::domain::{
    EmailOutcome, ErrorResponse, HealthResponse, HealthStatus, OverviewResponse, Product,
    ProductListResponse, Pubkey, RegisterProductRequest, RegisterProductResponse, Role,
    RoleResponse, UpdateProductRequest, VerifyResponse,
};
use supplychain_gateway::test_utils::{MOCK_PROGRAM_ID, MockNotifier, MockProgram, MockRegistry};

const API_KEY: &str = "integration-key";

fn wallet() -> Pubkey {
    Pubkey::new_from_array([1u8; 32])
}

fn updater() -> Pubkey {
    Pubkey::new_from_array([2u8; 32])
}

struct TestApp {
    router: Router,
    program: Arc<MockProgram>,
    notifier: Arc<MockNotifier>,
}

fn test_app_with(program: MockProgram, notifier: MockNotifier) -> TestApp {
    let program = Arc::new(program);
    let notifier = Arc::new(notifier);
    let state = AppState::new(
        program.clone(),
        Arc::new(MockRegistry::new()),
        notifier.clone(),
        ServiceSettings {
            public_base_url: "https://scm.example".to_string(),
            rpc_url: "http://127.0.0.1:8899".to_string(),
        },
        SecretString::from(API_KEY),
    );
    TestApp {
        router: create_router(Arc::new(state)),
        program,
        notifier,
    }
}

fn test_app() -> TestApp {
    test_app_with(MockProgram::new().with_wallet(wallet()), MockNotifier::new())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn get_with_key(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(API_KEY_HEADER, API_KEY)
        .body(Body::empty())
        .unwrap()
}

fn post_json<T: serde::Serialize>(uri: &str, payload: &T) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .header(API_KEY_HEADER, API_KEY)
        .body(Body::from(serde_json::to_string(payload).unwrap()))
        .unwrap()
}

async fn json_body<T: DeserializeOwned>(response: axum::response::Response) -> T {
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body_bytes).unwrap()
}

fn register_payload() -> RegisterProductRequest {
    RegisterProductRequest::new(
        "Widget",
        "Acme",
        "Lagos",
        "buyer@example.com",
        updater().to_string(),
    )
}

fn seeded(address: Pubkey, updater: Pubkey) -> Product {
    Product {
        address,
        product_id: "Widget".to_string(),
        manufacturer: wallet(),
        updater,
        location: "Lagos".to_string(),
        delivered: false,
        bump: 254,
    }
}

#[tokio::test]
async fn test_overview() {
    let app = test_app();
    app.program.set_role(wallet(), Role::Manufacturer);

    let response = app.router.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let overview: OverviewResponse = json_body(response).await;
    assert_eq!(overview.program_id, MOCK_PROGRAM_ID);
    assert_eq!(overview.wallet, Some(wallet()));
    assert_eq!(overview.role, Some(Role::Manufacturer));
}

#[tokio::test]
async fn test_register_product_success() {
    let app = test_app();

    let response = app
        .router
        .oneshot(post_json("/register", &register_payload()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let registered: RegisterProductResponse = json_body(response).await;
    assert_eq!(registered.email, EmailOutcome::Sent);
    assert!(
        registered
            .verification_link
            .starts_with("https://scm.example/verify?address=")
    );
    assert!(app.program.product(&registered.address).is_some());
    assert_eq!(app.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_register_product_email_skipped_still_succeeds() {
    let app = test_app_with(
        MockProgram::new().with_wallet(wallet()),
        MockNotifier::with_outcome(EmailOutcome::Skipped {
            reason: "missing public key".to_string(),
        }),
    );

    let response = app
        .router
        .oneshot(post_json("/register", &register_payload()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let registered: RegisterProductResponse = json_body(response).await;
    assert!(matches!(registered.email, EmailOutcome::Skipped { .. }));
}

#[tokio::test]
async fn test_register_product_validation_error() {
    let app = test_app();
    let mut payload = register_payload();
    payload.name = String::new();

    let response = app
        .router
        .oneshot(post_json("/register", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = json_body(response).await;
    assert_eq!(error.error.r#type, "validation_error");
}

#[tokio::test]
async fn test_register_duplicate_is_rejected() {
    let app = test_app();

    let first = app
        .router
        .clone()
        .oneshot(post_json("/register", &register_payload()))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .router
        .oneshot(post_json("/register", &register_payload()))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_register_without_wallet() {
    let app = test_app_with(MockProgram::new(), MockNotifier::new());

    let response = app
        .router
        .oneshot(post_json("/register", &register_payload()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let error: ErrorResponse = json_body(response).await;
    assert_eq!(error.error.r#type, "wallet_not_connected");
    assert_eq!(error.error.message, "Please connect your wallet first.");
}

#[tokio::test]
async fn test_register_with_wrong_api_key() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/register")
        .header("Content-Type", "application/json")
        .header(API_KEY_HEADER, "wrong")
        .body(Body::from(
            serde_json::to_string(&register_payload()).unwrap(),
        ))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.program.call_count(), 0);
}

#[tokio::test]
async fn test_verify_without_address_lists_products() {
    let app = test_app();
    app.program
        .insert_product(seeded(Pubkey::new_from_array([9u8; 32]), updater()));

    let response = app.router.oneshot(get("/verify")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let list: ProductListResponse = json_body(response).await;
    assert_eq!(list.total, 1);
}

#[tokio::test]
async fn test_verify_with_address() {
    let app = test_app();
    let address = Pubkey::new_from_array([9u8; 32]);
    app.program.insert_product(seeded(address, updater()));

    let response = app
        .router
        .oneshot(get_with_key(&format!("/verify?address={}", address)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let verified: VerifyResponse = json_body(response).await;
    assert_eq!(verified.product.unwrap().address, address);
    assert_eq!(app.program.verified(), vec![address]);
}

#[tokio::test]
async fn test_verify_with_address_without_key_submits_nothing() {
    let app = test_app();
    let address = Pubkey::new_from_array([9u8; 32]);
    app.program.insert_product(seeded(address, updater()));
    let calls_before = app.program.call_count();

    for _ in 0..5 {
        let response = app
            .router
            .clone()
            .oneshot(get(&format!("/verify?address={}", address)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    assert!(app.program.verified().is_empty());
    assert_eq!(app.program.call_count(), calls_before);
}

#[tokio::test]
async fn test_verify_unknown_product() {
    let app = test_app();
    let response = app
        .router
        .oneshot(get_with_key(&format!(
            "/verify?address={}",
            Pubkey::new_from_array([7u8; 32])
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let error: ErrorResponse = json_body(response).await;
    assert_eq!(error.error.r#type, "product_not_found");
}

#[tokio::test]
async fn test_verify_invalid_address() {
    let app = test_app();
    let response = app
        .router
        .oneshot(get_with_key("/verify?address=not-a-key"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_by_wrong_updater_is_forbidden() {
    let app = test_app();
    let address = Pubkey::new_from_array([9u8; 32]);
    app.program.insert_product(seeded(address, updater()));

    let payload = UpdateProductRequest {
        address: address.to_string(),
        location: "Accra".to_string(),
        delivered: false,
    };
    let response = app
        .router
        .oneshot(post_json("/update", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let error: ErrorResponse = json_body(response).await;
    assert_eq!(error.error.r#type, "unauthorized_updater");
}

#[tokio::test]
async fn test_updater_products() {
    let app = test_app();
    app.program
        .insert_product(seeded(Pubkey::new_from_array([9u8; 32]), wallet()));
    app.program
        .insert_product(seeded(Pubkey::new_from_array([10u8; 32]), updater()));

    let response = app.router.oneshot(get("/update")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let list: ProductListResponse = json_body(response).await;
    assert_eq!(list.total, 1);
    assert_eq!(list.products[0].address, Pubkey::new_from_array([9u8; 32]));
}

#[tokio::test]
async fn test_product_qr_is_svg() {
    let app = test_app();
    let response = app
        .router
        .oneshot(get(&format!(
            "/products/{}/qr?size=128",
            Pubkey::new_from_array([9u8; 32])
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/svg+xml"
    );

    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body_bytes).contains("<svg"));
}

#[tokio::test]
async fn test_role_read_only() {
    let app = test_app_with(MockProgram::new(), MockNotifier::new());

    let response = app.router.oneshot(get("/role")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let role: RoleResponse = json_body(response).await;
    assert!(role.wallet.is_none());
    assert!(role.role.is_none());
}

#[tokio::test]
async fn test_assign_role_requires_admin() {
    let app = test_app();
    let payload = serde_json::json!({ "user": updater().to_string(), "role": "Updater" });

    let response = app
        .router
        .oneshot(post_json("/admin/roles", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_initialize_twice_is_rejected() {
    let app = test_app();
    let empty = serde_json::json!({});

    let first = app
        .router
        .clone()
        .oneshot(post_json("/admin/initialize", &empty))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .router
        .oneshot(post_json("/admin/initialize", &empty))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_node_failure_maps_to_server_error() {
    let app = test_app_with(MockProgram::failing("node down"), MockNotifier::new());

    let response = app.router.oneshot(get("/products")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_health_check_endpoint() {
    let app = test_app();

    let response = app.router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health: HealthResponse = json_body(response).await;
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.blockchain, HealthStatus::Healthy);
    assert_eq!(health.registry, HealthStatus::Healthy);
}

#[tokio::test]
async fn test_registry_lookup_not_found() {
    let app = test_app();
    let response = app.router.oneshot(get("/registry/Gadget")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
