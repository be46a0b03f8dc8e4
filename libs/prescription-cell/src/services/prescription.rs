// libs/prescription-cell/src/services/prescription.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{CreatePrescriptionRequest, Prescription, PrescriptionError};

pub struct PrescriptionService {
    supabase: SupabaseClient,
}

impl PrescriptionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Issue a prescription. Medication entries travel as a jsonb column,
    /// so the list round-trips without a join table.
    pub async fn create_prescription(
        &self,
        doctor_id: Uuid,
        request: CreatePrescriptionRequest,
        auth_token: &str,
    ) -> Result<Prescription, PrescriptionError> {
        if request.diagnosis.trim().is_empty() {
            return Err(PrescriptionError::Validation(
                "A diagnosis is required".to_string(),
            ));
        }
        if request.medications.is_empty() {
            return Err(PrescriptionError::Validation(
                "At least one medication entry is required".to_string(),
            ));
        }
        for medication in &request.medications {
            if medication.name.trim().is_empty() || medication.dosage.trim().is_empty() {
                return Err(PrescriptionError::Validation(
                    "Every medication needs a name and a dosage".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let row = json!({
            "doctor_id": doctor_id,
            "patient_id": request.patient_id,
            "appointment_id": request.appointment_id,
            "diagnosis": request.diagnosis.trim(),
            "symptoms": request.symptoms.trim(),
            "notes": request.notes,
            "follow_up_date": request.follow_up_date,
            "medications": request.medications,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let result = self
            .supabase
            .insert_returning("/rest/v1/prescriptions", Some(auth_token), row)
            .await
            .map_err(|e| PrescriptionError::Database(e.to_string()))?;

        let created = result
            .into_iter()
            .next()
            .ok_or_else(|| PrescriptionError::Database("insert returned no row".to_string()))?;
        let prescription: Prescription = serde_json::from_value(created)
            .map_err(|e| PrescriptionError::Database(e.to_string()))?;

        info!(
            "Prescription {} issued by doctor {} for patient {}",
            prescription.id, doctor_id, request.patient_id
        );
        Ok(prescription)
    }

    pub async fn prescriptions_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Prescription>, PrescriptionError> {
        let path = format!(
            "/rest/v1/prescriptions?patient_id=eq.{}&order=created_at.desc",
            patient_id
        );
        self.fetch_prescriptions(&path, auth_token).await
    }

    pub async fn prescriptions_for_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Prescription>, PrescriptionError> {
        let path = format!(
            "/rest/v1/prescriptions?doctor_id=eq.{}&order=created_at.desc",
            doctor_id
        );
        self.fetch_prescriptions(&path, auth_token).await
    }

    async fn fetch_prescriptions(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Vec<Prescription>, PrescriptionError> {
        debug!("Fetching prescriptions: {}", path);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| PrescriptionError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| PrescriptionError::Database(e.to_string()))
            })
            .collect()
    }
}
