// libs/doctor-cell/src/services/doctor.rs
use chrono::{NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use appointment_cell::models::{slot_time, Appointment, AppointmentStatus, PatientSummary};

use crate::models::{
    DashboardStats, Doctor, DoctorError, NotificationSettingsRequest, UpdateDoctorProfileRequest,
};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Full roster, as the booking form presents it.
    pub async fn list_all(&self, auth_token: &str) -> Result<Vec<Doctor>, DoctorError> {
        let path = "/rest/v1/doctors?order=last_name.asc,first_name.asc";
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string())))
            .collect()
    }

    pub async fn get_profile(&self, doctor_id: Uuid, auth_token: &str) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(DoctorError::NotFound)?;
        serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string()))
    }

    /// Patch only the provided fields. Schedule edits are validated so a
    /// doctor cannot save an inverted or zero-granularity window.
    pub async fn update_profile(
        &self,
        doctor_id: Uuid,
        request: UpdateDoctorProfileRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Updating doctor profile: {}", doctor_id);

        let current = self.get_profile(doctor_id, auth_token).await?;

        let mut update_data = serde_json::Map::new();

        if let Some(first_name) = request.first_name {
            update_data.insert("first_name".to_string(), json!(first_name));
        }
        if let Some(last_name) = request.last_name {
            update_data.insert("last_name".to_string(), json!(last_name));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(specialty) = request.specialty {
            update_data.insert("specialty".to_string(), json!(specialty));
        }

        let work_start = match request.work_start {
            Some(raw) => {
                let parsed = parse_schedule_time(&raw)?;
                update_data.insert("work_start".to_string(), json!(raw));
                parsed
            }
            None => current.work_start,
        };
        let work_end = match request.work_end {
            Some(raw) => {
                let parsed = parse_schedule_time(&raw)?;
                update_data.insert("work_end".to_string(), json!(raw));
                parsed
            }
            None => current.work_end,
        };
        if work_start >= work_end {
            return Err(DoctorError::Validation(
                "Working hours must start before they end".to_string(),
            ));
        }
        if let Some(slot_minutes) = request.slot_minutes {
            if slot_minutes <= 0 {
                return Err(DoctorError::Validation(
                    "Slot duration must be a positive number of minutes".to_string(),
                ));
            }
            update_data.insert("slot_minutes".to_string(), json!(slot_minutes));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let rows = self
            .supabase
            .update_returning(&path, Some(auth_token), Value::Object(update_data))
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(DoctorError::NotFound)?;
        serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string()))
    }

    pub async fn update_notifications(
        &self,
        doctor_id: Uuid,
        request: NotificationSettingsRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        let patch = json!({
            "email_notifications": request.email_notifications,
            "sms_notifications": request.sms_notifications,
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let rows = self
            .supabase
            .update_returning(&path, Some(auth_token), patch)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(DoctorError::NotFound)?;
        serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string()))
    }

    /// Distinct patients who have ever had an appointment with this doctor.
    pub async fn patients_for_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<PatientSummary>, DoctorError> {
        let appointments = self.appointments_raw(doctor_id, auth_token).await?;

        let mut seen = Vec::new();
        let mut patients = Vec::new();
        for appointment in appointments {
            if seen.contains(&appointment.patient_id) {
                continue;
            }
            seen.push(appointment.patient_id);

            let path = format!("/rest/v1/patients?id=eq.{}", appointment.patient_id);
            let rows: Vec<Value> = self
                .supabase
                .request(Method::GET, &path, Some(auth_token), None)
                .await
                .map_err(|e| DoctorError::Database(e.to_string()))?;

            if let Some(row) = rows.into_iter().next() {
                let patient: PatientSummary = serde_json::from_value(row)
                    .map_err(|e| DoctorError::Database(e.to_string()))?;
                patients.push(patient);
            }
        }

        Ok(patients)
    }

    /// Counters for the portal landing page, computed from one fetch of
    /// the doctor's appointments.
    pub async fn dashboard(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<DashboardStats, DoctorError> {
        let appointments = self.appointments_raw(doctor_id, auth_token).await?;
        let today = Utc::now().date_naive();

        let todays_appointments = appointments
            .iter()
            .filter(|apt| apt.date == today && apt.status != AppointmentStatus::Cancelled)
            .count();
        let pending_appointments = appointments
            .iter()
            .filter(|apt| apt.status == AppointmentStatus::Pending)
            .count();
        let completed_appointments = appointments
            .iter()
            .filter(|apt| apt.status == AppointmentStatus::Completed)
            .count();

        let mut patient_ids: Vec<Uuid> = appointments.iter().map(|apt| apt.patient_id).collect();
        patient_ids.sort();
        patient_ids.dedup();

        info!(
            "Dashboard for doctor {}: {} today, {} pending",
            doctor_id, todays_appointments, pending_appointments
        );

        Ok(DashboardStats {
            todays_appointments,
            pending_appointments,
            completed_appointments,
            total_patients: patient_ids.len(),
        })
    }

    async fn appointments_raw(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, DoctorError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&order=date.asc,time.asc",
            doctor_id
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string())))
            .collect()
    }
}

fn parse_schedule_time(raw: &str) -> Result<NaiveTime, DoctorError> {
    NaiveTime::parse_from_str(raw, slot_time::FORMAT).map_err(|_| {
        DoctorError::Validation(format!("Invalid time '{}': expected 24-hour HH:MM", raw))
    })
}
