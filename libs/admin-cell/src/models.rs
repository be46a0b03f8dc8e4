// libs/admin-cell/src/models.rs
use serde::Serialize;

use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_doctors: usize,
    pub total_patients: usize,
    pub total_appointments: usize,
    pub pending_appointments: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<AdminError> for AppError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            AdminError::Database(msg) => AppError::Database(msg),
        }
    }
}
