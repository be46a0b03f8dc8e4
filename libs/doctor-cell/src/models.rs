// libs/doctor-cell/src/models.rs
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use appointment_cell::models::slot_time;
use shared_models::error::AppError;

/// Full doctor profile row. The `work_start`/`work_end`/`slot_minutes`
/// triple is the daily schedule template the availability resolver
/// builds its slot grid from; rows predating those columns fall back to
/// a 09:00-17:00 day in 30-minute slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialty: String,
    #[serde(with = "slot_time", default = "default_work_start")]
    pub work_start: NaiveTime,
    #[serde(with = "slot_time", default = "default_work_end")]
    pub work_end: NaiveTime,
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: i64,
    #[serde(default = "default_true")]
    pub email_notifications: bool,
    #[serde(default)]
    pub sms_notifications: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_work_start() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap()
}

fn default_work_end() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).unwrap()
}

fn default_slot_minutes() -> i64 {
    30
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDoctorProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub specialty: Option<String>,
    /// Schedule template edits arrive as "HH:MM" strings and are
    /// validated in the service.
    pub work_start: Option<String>,
    pub work_end: Option<String>,
    pub slot_minutes: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettingsRequest {
    pub email_notifications: bool,
    pub sms_notifications: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub todays_appointments: usize,
    pub pending_appointments: usize,
    pub completed_appointments: usize,
    pub total_patients: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
            DoctorError::Validation(msg) => AppError::Validation(msg),
            DoctorError::Database(msg) => AppError::Database(msg),
        }
    }
}
