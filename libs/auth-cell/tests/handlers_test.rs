use std::sync::Arc;

use axum::extract::{Json, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::handlers;
use auth_cell::models::{LoginRequest, RegisterRequest};
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn state_for(mock_server: &MockServer) -> Arc<AppConfig> {
    TestConfig::with_supabase_url(&mock_server.uri()).to_arc()
}

fn register_request(role: &str) -> RegisterRequest {
    RegisterRequest {
        first_name: "Aoife".to_string(),
        last_name: "Byrne".to_string(),
        email: "aoife@example.com".to_string(),
        phone: Some("0861234567".to_string()),
        password: "secret123".to_string(),
        role: role.to_string(),
    }
}

#[tokio::test]
async fn registration_creates_an_account_and_a_profile_row() {
    let mock_server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "user": { "id": user_id.to_string(), "email": "aoife@example.com" }
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": user_id.to_string()
        }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (status, body) = handlers::register(
        State(state_for(&mock_server)),
        Json(register_request("patient")),
    )
    .await
    .expect("registration should succeed");

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body.0["user"]["role"], "patient");
    assert_eq!(body.0["user"]["id"], user_id.to_string());
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4().to_string(), "email": "aoife@example.com" }
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let err = handlers::register(
        State(state_for(&mock_server)),
        Json(register_request("patient")),
    )
    .await
    .expect_err("duplicate email must be rejected");

    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn invalid_registration_never_reaches_the_auth_provider() {
    let mock_server = MockServer::start().await;

    let mut request = register_request("admin");
    let err = handlers::register(State(state_for(&mock_server)), Json(request.clone()))
        .await
        .expect_err("admin self-registration must fail");
    assert!(matches!(err, AppError::Validation(_)));

    request.role = "patient".to_string();
    request.email = "not-an-email".to_string();
    let err = handlers::register(State(state_for(&mock_server)), Json(request))
        .await
        .expect_err("bad email must fail");
    assert!(matches!(err, AppError::Validation(_)));

    assert!(
        mock_server.received_requests().await.unwrap_or_default().is_empty(),
        "validation failures must not call out"
    );
}

#[tokio::test]
async fn bad_credentials_are_a_401() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_description": "Invalid login credentials"
        })))
        .mount(&mock_server)
        .await;

    let err = handlers::login(
        State(state_for(&mock_server)),
        Json(LoginRequest {
            email: "aoife@example.com".to_string(),
            password: "wrong".to_string(),
        }),
    )
    .await
    .expect_err("bad credentials must fail");

    assert!(matches!(err, AppError::Auth(_)));
}

#[tokio::test]
async fn login_returns_token_and_role() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "session-token",
            "user": {
                "id": Uuid::new_v4().to_string(),
                "email": "aoife@example.com",
                "user_metadata": { "role": "patient" }
            }
        })))
        .mount(&mock_server)
        .await;

    let response = handlers::login(
        State(state_for(&mock_server)),
        Json(LoginRequest {
            email: "aoife@example.com".to_string(),
            password: "secret123".to_string(),
        }),
    )
    .await
    .expect("login should succeed");

    assert_eq!(response.0.token, "session-token");
    assert_eq!(response.0.role.as_deref(), Some("patient"));
}

#[tokio::test]
async fn validate_introspects_a_session_token() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let test_user = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&test_user, &config.jwt_secret, None);

    let mut headers = HeaderMap::new();
    headers.insert(
        "Authorization",
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );

    let response = handlers::validate(State(config.to_arc()), headers)
        .await
        .expect("validation should succeed");

    assert!(response.0.valid);
    assert_eq!(response.0.user_id, test_user.id);
    assert_eq!(response.0.role.as_deref(), Some("doctor"));
}
