use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{
    AppointmentError, AppointmentStatus, BookAppointmentRequest, CancelAppointmentRequest,
    UpdateAppointmentStatusRequest,
};
use appointment_cell::services::booking::BookingService;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

const TOKEN: &str = "test-token";
const FUTURE_DATE: &str = "2099-06-01";

fn booking_request(doctor_id: Uuid, date: &str, time: &str) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id,
        date: date.to_string(),
        time: time.to_string(),
        reason: "checkup".to_string(),
    }
}

async fn service_for(mock_server: &MockServer) -> BookingService {
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    BookingService::new(&config)
}

async fn mount_doctor(mock_server: &MockServer, doctor_id: Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(
                &doctor_id.to_string(),
                "Maeve",
                "Collins",
                "General Practice",
            )
        ])))
        .mount(mock_server)
        .await;
}

async fn mount_patient(mock_server: &MockServer, patient_id: Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(
                &patient_id.to_string(),
                "Aoife",
                "Byrne",
                "aoife@example.com",
            )
        ])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn booking_a_free_slot_creates_a_pending_appointment() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    mount_doctor(&mock_server, doctor_id).await;
    mount_patient(&mock_server, patient_id).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &appointment_id.to_string(),
                &doctor_id.to_string(),
                &patient_id.to_string(),
                FUTURE_DATE,
                "09:30",
                "pending",
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server).await;
    let created = service
        .book_appointment(patient_id, booking_request(doctor_id, FUTURE_DATE, "09:30"), TOKEN)
        .await
        .expect("booking should succeed");

    assert_eq!(created.appointment.id, appointment_id);
    assert_eq!(created.appointment.status, AppointmentStatus::Pending);
    let doctor = created.doctor.expect("doctor subdocument must be resolved");
    assert_eq!(doctor.first_name, "Maeve");
}

#[tokio::test]
async fn losing_the_race_is_a_slot_conflict() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    mount_doctor(&mock_server, doctor_id).await;
    mount_patient(&mock_server, patient_id).await;
    // The unique index fires at commit time: PostgREST answers 409.
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server).await;
    let err = service
        .book_appointment(patient_id, booking_request(doctor_id, FUTURE_DATE, "09:30"), TOKEN)
        .await
        .expect_err("second booking of a slot must fail");

    assert!(matches!(err, AppointmentError::SlotConflict));
}

#[tokio::test]
async fn past_dates_never_reach_storage() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server).await;

    let err = service
        .book_appointment(
            Uuid::new_v4(),
            booking_request(Uuid::new_v4(), "2020-01-01", "09:30"),
            TOKEN,
        )
        .await
        .expect_err("past booking must fail");

    assert!(matches!(err, AppointmentError::Validation(_)));
    assert!(
        mock_server.received_requests().await.unwrap_or_default().is_empty(),
        "validation must happen before storage is touched"
    );
}

#[tokio::test]
async fn off_grid_times_are_rejected() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    mount_doctor(&mock_server, doctor_id).await;

    let service = service_for(&mock_server).await;

    // 09:10 is not on the 30-minute grid; 18:00 is outside working hours.
    for time in ["09:10", "18:00"] {
        let err = service
            .book_appointment(patient_id, booking_request(doctor_id, FUTURE_DATE, time), TOKEN)
            .await
            .expect_err("off-grid time must fail");
        assert!(matches!(err, AppointmentError::Validation(_)), "time {}", time);
    }
}

#[tokio::test]
async fn malformed_time_and_empty_reason_are_validation_errors() {
    let mock_server = MockServer::start().await;
    let service = service_for(&mock_server).await;

    let err = service
        .book_appointment(
            Uuid::new_v4(),
            booking_request(Uuid::new_v4(), FUTURE_DATE, "9.30 am"),
            TOKEN,
        )
        .await
        .expect_err("malformed time must fail");
    assert!(matches!(err, AppointmentError::Validation(_)));

    let mut request = booking_request(Uuid::new_v4(), FUTURE_DATE, "09:30");
    request.reason = "   ".to_string();
    let err = service
        .book_appointment(Uuid::new_v4(), request, TOKEN)
        .await
        .expect_err("blank reason must fail");
    assert!(matches!(err, AppointmentError::Validation(_)));
}

#[tokio::test]
async fn unknown_doctor_and_patient_are_not_found() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server).await;
    let err = service
        .book_appointment(patient_id, booking_request(doctor_id, FUTURE_DATE, "09:30"), TOKEN)
        .await
        .expect_err("unknown doctor must fail");
    assert!(matches!(err, AppointmentError::DoctorNotFound));

    // Same again with a real doctor but no patient row.
    let mock_server = MockServer::start().await;
    mount_doctor(&mock_server, doctor_id).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server).await;
    let err = service
        .book_appointment(patient_id, booking_request(doctor_id, FUTURE_DATE, "09:30"), TOKEN)
        .await
        .expect_err("unknown patient must fail");
    assert!(matches!(err, AppointmentError::PatientNotFound));
}

#[tokio::test]
async fn cancelling_a_pending_appointment_records_the_reason() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .and(query_param("patient_id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &appointment_id.to_string(),
                &doctor_id.to_string(),
                &patient_id.to_string(),
                FUTURE_DATE,
                "09:30",
                "pending",
            )
        ])))
        .mount(&mock_server)
        .await;

    let mut cancelled_row = MockSupabaseResponses::appointment_row(
        &appointment_id.to_string(),
        &doctor_id.to_string(),
        &patient_id.to_string(),
        FUTURE_DATE,
        "09:30",
        "cancelled",
    );
    cancelled_row["cancellation_reason"] = json!("Feeling better");
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled_row])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server).await;
    let cancelled = service
        .cancel(
            appointment_id,
            patient_id,
            CancelAppointmentRequest { reason: "Feeling better".to_string() },
            TOKEN,
        )
        .await
        .expect("cancel should succeed");

    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Feeling better"));
}

#[tokio::test]
async fn cancelling_a_completed_appointment_is_an_invalid_transition() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &appointment_id.to_string(),
                &doctor_id.to_string(),
                &patient_id.to_string(),
                "2025-01-10",
                "09:30",
                "completed",
            )
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server).await;
    let err = service
        .cancel(
            appointment_id,
            patient_id,
            CancelAppointmentRequest { reason: "too late".to_string() },
            TOKEN,
        )
        .await
        .expect_err("terminal state must reject cancellation");

    assert!(matches!(err, AppointmentError::InvalidTransition { .. }));
}

#[tokio::test]
async fn doctor_confirms_a_pending_appointment() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &appointment_id.to_string(),
                &doctor_id.to_string(),
                &patient_id.to_string(),
                FUTURE_DATE,
                "09:30",
                "pending",
            )
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &appointment_id.to_string(),
                &doctor_id.to_string(),
                &patient_id.to_string(),
                FUTURE_DATE,
                "09:30",
                "confirmed",
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server).await;
    let updated = service
        .update_status(
            appointment_id,
            doctor_id,
            UpdateAppointmentStatusRequest {
                status: AppointmentStatus::Confirmed,
                notes: Some("See you then".to_string()),
            },
            TOKEN,
        )
        .await
        .expect("confirmation should succeed");

    assert_eq!(updated.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn status_changes_out_of_cancelled_are_rejected() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &appointment_id.to_string(),
                &doctor_id.to_string(),
                &Uuid::new_v4().to_string(),
                FUTURE_DATE,
                "09:30",
                "cancelled",
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server).await;
    for target in [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
    ] {
        let err = service
            .update_status(
                appointment_id,
                doctor_id,
                UpdateAppointmentStatusRequest { status: target, notes: None },
                TOKEN,
            )
            .await
            .expect_err("cancelled is terminal");
        assert!(matches!(err, AppointmentError::InvalidTransition { .. }));
    }
}

#[tokio::test]
async fn completing_before_the_appointment_date_is_rejected() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &appointment_id.to_string(),
                &doctor_id.to_string(),
                &Uuid::new_v4().to_string(),
                FUTURE_DATE,
                "09:30",
                "confirmed",
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server).await;
    let err = service
        .update_status(
            appointment_id,
            doctor_id,
            UpdateAppointmentStatusRequest {
                status: AppointmentStatus::Completed,
                notes: None,
            },
            TOKEN,
        )
        .await
        .expect_err("completion must wait for the appointment date");

    assert!(matches!(err, AppointmentError::Validation(_)));
}

#[tokio::test]
async fn appointment_owned_by_another_doctor_is_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server).await;
    let err = service
        .update_status(
            Uuid::new_v4(),
            Uuid::new_v4(),
            UpdateAppointmentStatusRequest {
                status: AppointmentStatus::Confirmed,
                notes: None,
            },
            TOKEN,
        )
        .await
        .expect_err("ownership scoping must hide the row");

    assert!(matches!(err, AppointmentError::NotFound));
}
