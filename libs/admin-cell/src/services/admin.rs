// libs/admin-cell/src/services/admin.rs
use futures::future::try_join3;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{AdminError, AdminStats};

pub struct AdminService {
    supabase: SupabaseClient,
}

impl AdminService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_doctors(&self, auth_token: &str) -> Result<Vec<Value>, AdminError> {
        self.fetch_rows("/rest/v1/doctors?order=last_name.asc", auth_token).await
    }

    pub async fn list_patients(&self, auth_token: &str) -> Result<Vec<Value>, AdminError> {
        self.fetch_rows("/rest/v1/patients?order=last_name.asc", auth_token).await
    }

    pub async fn list_appointments(&self, auth_token: &str) -> Result<Vec<Value>, AdminError> {
        self.fetch_rows(
            "/rest/v1/appointments?order=date.desc,time.asc",
            auth_token,
        )
        .await
    }

    pub async fn delete_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<(), AdminError> {
        self.delete_row("/rest/v1/doctors", doctor_id, "Doctor", auth_token).await
    }

    pub async fn delete_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<(), AdminError> {
        self.delete_row("/rest/v1/patients", patient_id, "Patient", auth_token).await
    }

    /// Counters for the admin landing page; the three tables are
    /// fetched concurrently.
    pub async fn stats(&self, auth_token: &str) -> Result<AdminStats, AdminError> {
        let (doctors, patients, appointments) = try_join3(
            self.fetch_rows("/rest/v1/doctors", auth_token),
            self.fetch_rows("/rest/v1/patients", auth_token),
            self.fetch_rows("/rest/v1/appointments", auth_token),
        )
        .await?;

        let pending_appointments = appointments
            .iter()
            .filter(|row| row["status"] == "pending")
            .count();

        Ok(AdminStats {
            total_doctors: doctors.len(),
            total_patients: patients.len(),
            total_appointments: appointments.len(),
            pending_appointments,
        })
    }

    async fn fetch_rows(&self, path: &str, auth_token: &str) -> Result<Vec<Value>, AdminError> {
        debug!("Admin fetch: {}", path);
        self.supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| AdminError::Database(e.to_string()))
    }

    /// Delete with representation so a missing row is distinguishable
    /// from a deleted one.
    async fn delete_row(
        &self,
        table_path: &str,
        id: Uuid,
        what: &'static str,
        auth_token: &str,
    ) -> Result<(), AdminError> {
        let path = format!("{}?id=eq.{}", table_path, id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let deleted: Vec<Value> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, Some(auth_token), None, Some(headers))
            .await
            .map_err(|e| AdminError::Database(e.to_string()))?;

        if deleted.is_empty() {
            return Err(AdminError::NotFound(what));
        }

        info!("Admin removed {} {}", what.to_lowercase(), id);
        Ok(())
    }
}
