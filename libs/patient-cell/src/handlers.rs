// libs/patient-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{require_role, user_uuid};

use appointment_cell::models::{
    AvailableSlotsQuery, AvailableSlotsResponse, BookAppointmentRequest, CancelAppointmentRequest,
};
use appointment_cell::services::availability::AvailabilityService;
use appointment_cell::services::booking::BookingService;
use prescription_cell::services::prescription::PrescriptionService;

use crate::models::{ChangePasswordRequest, NotificationSettingsRequest, UpdatePatientProfileRequest};
use crate::services::patient::PatientService;

/// Free slots for the booking form, `{ "availableSlots": ["09:00", ...] }`.
#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<AvailableSlotsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "patient")?;
    let token = auth.token();

    let service = AvailabilityService::new(&state);
    let slots = service.available_slots(query.doctor_id, &query.date, token).await?;

    Ok(Json(json!(AvailableSlotsResponse::from_times(&slots))))
}

/// Book a slot. A lost race comes back as 409; the form re-fetches
/// availability instead of retrying the same slot.
#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&user, "patient")?;
    let patient_id = user_uuid(&user)?;
    let token = auth.token();

    let booking_service = BookingService::new(&state);
    let created = booking_service.book_appointment(patient_id, request, token).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Appointment booked successfully",
            "appointment": created
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "patient")?;
    let patient_id = user_uuid(&user)?;
    let token = auth.token();

    let booking_service = BookingService::new(&state);
    let appointments = booking_service.appointments_for_patient(patient_id, token).await?;
    Ok(Json(json!(appointments)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "patient")?;
    let patient_id = user_uuid(&user)?;
    let token = auth.token();

    let booking_service = BookingService::new(&state);
    let appointment = booking_service
        .cancel(appointment_id, patient_id, request, token)
        .await?;

    Ok(Json(json!({
        "message": "Appointment cancelled",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_prescriptions(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "patient")?;
    let patient_id = user_uuid(&user)?;
    let token = auth.token();

    let service = PrescriptionService::new(&state);
    let prescriptions = service.prescriptions_for_patient(patient_id, token).await?;
    Ok(Json(json!(prescriptions)))
}

/// Completed visits plus issued prescriptions in one response.
#[axum::debug_handler]
pub async fn get_medical_history(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "patient")?;
    let patient_id = user_uuid(&user)?;
    let token = auth.token();

    let booking_service = BookingService::new(&state);
    let prescription_service = PrescriptionService::new(&state);

    let visits = booking_service.completed_for_patient(patient_id, token).await?;
    let prescriptions = prescription_service
        .prescriptions_for_patient(patient_id, token)
        .await?;

    Ok(Json(json!({
        "completedAppointments": visits,
        "prescriptions": prescriptions
    })))
}

#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "patient")?;
    let patient_id = user_uuid(&user)?;
    let token = auth.token();

    let service = PatientService::new(&state);
    let patient = service.get_profile(patient_id, token).await?;
    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdatePatientProfileRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "patient")?;
    let patient_id = user_uuid(&user)?;
    let token = auth.token();

    let service = PatientService::new(&state);
    let patient = service.update_profile(patient_id, request, token).await?;
    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn change_password(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "patient")?;
    let token = auth.token();

    if request.new_password.len() < 6 {
        return Err(AppError::Validation(
            "Password must be at least 6 characters long".to_string(),
        ));
    }

    let client = SupabaseClient::new(&state);
    client
        .update_auth_password(token, &request.new_password)
        .await
        .map_err(|e| AppError::ExternalService(e.to_string()))?;

    Ok(Json(json!({ "message": "Password updated successfully" })))
}

#[axum::debug_handler]
pub async fn update_notifications(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<NotificationSettingsRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "patient")?;
    let patient_id = user_uuid(&user)?;
    let token = auth.token();

    let service = PatientService::new(&state);
    let patient = service.update_notifications(patient_id, request, token).await?;

    Ok(Json(json!({
        "message": "Notification settings updated",
        "emailNotifications": patient.email_notifications,
        "smsNotifications": patient.sms_notifications
    })))
}
