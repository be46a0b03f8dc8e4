// libs/doctor-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{require_role, user_uuid};

use appointment_cell::models::UpdateAppointmentStatusRequest;
use appointment_cell::services::booking::BookingService;
use prescription_cell::models::CreatePrescriptionRequest;
use prescription_cell::services::prescription::PrescriptionService;

use crate::models::{ChangePasswordRequest, NotificationSettingsRequest, UpdateDoctorProfileRequest};
use crate::services::doctor::DoctorService;

/// Roster used by the booking form, so any authenticated user may read it.
#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = DoctorService::new(&state);

    let doctors = service.list_all(token).await?;
    Ok(Json(json!(doctors)))
}

#[axum::debug_handler]
pub async fn get_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "doctor")?;
    let doctor_id = user_uuid(&user)?;
    let token = auth.token();

    let booking_service = BookingService::new(&state);
    let appointments = booking_service.appointments_for_doctor(doctor_id, token).await?;
    Ok(Json(json!(appointments)))
}

/// Status changes go through the lifecycle table; an illegal transition
/// comes back as 409 with the offending pair in the message.
#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentStatusRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "doctor")?;
    let doctor_id = user_uuid(&user)?;
    let token = auth.token();

    let booking_service = BookingService::new(&state);
    let appointment = booking_service
        .update_status(appointment_id, doctor_id, request, token)
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_patients(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "doctor")?;
    let doctor_id = user_uuid(&user)?;
    let token = auth.token();

    let service = DoctorService::new(&state);
    let patients = service.patients_for_doctor(doctor_id, token).await?;
    Ok(Json(json!(patients)))
}

#[axum::debug_handler]
pub async fn get_dashboard(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "doctor")?;
    let doctor_id = user_uuid(&user)?;
    let token = auth.token();

    let service = DoctorService::new(&state);
    let stats = service.dashboard(doctor_id, token).await?;
    Ok(Json(json!(stats)))
}

#[axum::debug_handler]
pub async fn prescribe_medication(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePrescriptionRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&user, "doctor")?;
    let doctor_id = user_uuid(&user)?;
    let token = auth.token();

    let service = PrescriptionService::new(&state);
    let prescription = service.create_prescription(doctor_id, request, token).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Prescription created successfully",
            "prescription": prescription
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_prescriptions(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "doctor")?;
    let doctor_id = user_uuid(&user)?;
    let token = auth.token();

    let service = PrescriptionService::new(&state);
    let prescriptions = service.prescriptions_for_doctor(doctor_id, token).await?;
    Ok(Json(json!(prescriptions)))
}

#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "doctor")?;
    let doctor_id = user_uuid(&user)?;
    let token = auth.token();

    let service = DoctorService::new(&state);
    let doctor = service.get_profile(doctor_id, token).await?;
    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorProfileRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "doctor")?;
    let doctor_id = user_uuid(&user)?;
    let token = auth.token();

    let service = DoctorService::new(&state);
    let doctor = service.update_profile(doctor_id, request, token).await?;
    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn change_password(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, "doctor")?;
    let token = auth.token();

    if request.new_password.len() < 6 {
        return Err(AppError::Validation(
            "Password must be at least 6 characters long".to_string(),
        ));
    }

    let client = shared_database::SupabaseClient::new(&state);
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
    require_role(&user, "doctor")?;
    let doctor_id = user_uuid(&user)?;
    let token = auth.token();

    let service = DoctorService::new(&state);
    let doctor = service.update_notifications(doctor_id, request, token).await?;

    Ok(Json(json!({
        "message": "Notification settings updated",
        "emailNotifications": doctor.email_notifications,
        "smsNotifications": doctor.sms_notifications
    })))
}
