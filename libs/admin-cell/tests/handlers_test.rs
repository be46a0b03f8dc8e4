use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use admin_cell::handlers;
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

fn state_for(mock_server: &MockServer) -> Arc<AppConfig> {
    TestConfig::with_supabase_url(&mock_server.uri()).to_arc()
}

fn auth_header() -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer("test-token").unwrap())
}

#[tokio::test]
async fn non_admins_are_turned_away() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doc@example.com").to_user();

    let err = handlers::get_stats(
        State(state_for(&mock_server)),
        auth_header(),
        Extension(doctor),
    )
    .await
    .expect_err("doctor must not see admin stats");

    assert!(matches!(err, AppError::Auth(_)));
}

#[tokio::test]
async fn stats_count_rows_and_pending_appointments() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4().to_string();
    let patient_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(&doctor_id, "Maeve", "Collins", "Cardiology")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(&patient_id, "Aoife", "Byrne", "aoife@example.com"),
            MockSupabaseResponses::patient_row(&Uuid::new_v4().to_string(), "Sean", "Walsh", "sean@example.com"),
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &Uuid::new_v4().to_string(), &doctor_id, &patient_id, "2099-06-01", "09:00", "pending",
            ),
            MockSupabaseResponses::appointment_row(
                &Uuid::new_v4().to_string(), &doctor_id, &patient_id, "2025-01-10", "09:30", "completed",
            ),
        ])))
        .mount(&mock_server)
        .await;

    let admin = TestUser::admin("admin@example.com").to_user();
    let result = handlers::get_stats(
        State(state_for(&mock_server)),
        auth_header(),
        Extension(admin),
    )
    .await
    .expect("stats should load");

    assert_eq!(result.0["totalDoctors"], 1);
    assert_eq!(result.0["totalPatients"], 2);
    assert_eq!(result.0["totalAppointments"], 2);
    assert_eq!(result.0["pendingAppointments"], 1);
}

#[tokio::test]
async fn deleting_a_missing_doctor_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let admin = TestUser::admin("admin@example.com").to_user();
    let err = handlers::delete_doctor(
        State(state_for(&mock_server)),
        Path(Uuid::new_v4()),
        auth_header(),
        Extension(admin),
    )
    .await
    .expect_err("missing doctor must be 404");

    assert!(matches!(err, AppError::NotFound(_)));
}
