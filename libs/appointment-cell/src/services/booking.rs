// libs/appointment-cell/src/services/booking.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DbError, SupabaseClient};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AppointmentWithDoctor,
    AppointmentWithPatient, BookAppointmentRequest, CancelAppointmentRequest, DoctorSummary,
    PatientSummary, UpdateAppointmentStatusRequest, slot_time,
};
use crate::services::availability::{
    parse_appointment_date, parse_slot_time, slot_grid, validate_not_past, AvailabilityService,
};
use crate::services::lifecycle::AppointmentLifecycleService;

/// Creates and mutates appointment records. Creation is a single
/// conditional insert: the storage-side unique index on
/// (doctor_id, date, time) over non-cancelled rows decides races, so two
/// concurrent bookings of one slot leave exactly one winner.
pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    availability: AvailabilityService,
    lifecycle: AppointmentLifecycleService,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            availability: AvailabilityService::with_client(Arc::clone(&supabase)),
            lifecycle: AppointmentLifecycleService::new(),
            supabase,
        }
    }

    /// Book a slot for the authenticated patient. Validation failures
    /// never reach storage; a lost race surfaces as `SlotConflict` and
    /// the caller is expected to re-fetch availability, not retry the
    /// same slot.
    pub async fn book_appointment(
        &self,
        patient_id: Uuid,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<AppointmentWithDoctor, AppointmentError> {
        info!(
            "Booking appointment for patient {} with doctor {}",
            patient_id, request.doctor_id
        );

        if request.reason.trim().is_empty() {
            return Err(AppointmentError::Validation(
                "Reason for visit must not be empty".to_string(),
            ));
        }

        let date = parse_appointment_date(&request.date)?;
        let time = parse_slot_time(&request.time)?;
        validate_not_past(date, Utc::now().date_naive())?;

        let doctor = self.availability.fetch_doctor(request.doctor_id, auth_token).await?;

        let grid = slot_grid(doctor.work_start, doctor.work_end, doctor.slot_minutes);
        if !grid.contains(&time) {
            return Err(AppointmentError::Validation(format!(
                "{} is not a bookable slot for this doctor",
                request.time
            )));
        }

        self.verify_patient_exists(patient_id, auth_token).await?;

        let now = Utc::now();
        let row = json!({
            "doctor_id": request.doctor_id,
            "patient_id": patient_id,
            "date": date.format("%Y-%m-%d").to_string(),
            "time": time.format(slot_time::FORMAT).to_string(),
            "reason": request.reason.trim(),
            "status": AppointmentStatus::Pending,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let result = self
            .supabase
            .insert_returning("/rest/v1/appointments", Some(auth_token), row)
            .await
            .map_err(|e| match e {
                DbError::Conflict(_) => {
                    warn!(
                        "Slot {} {} already taken for doctor {}",
                        date, request.time, request.doctor_id
                    );
                    AppointmentError::SlotConflict
                }
                other => AppointmentError::Database(other.to_string()),
            })?;

        let created = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Database("insert returned no row".to_string()))?;
        let appointment: Appointment =
            serde_json::from_value(created).map_err(|e| AppointmentError::Database(e.to_string()))?;

        info!(
            "Appointment {} booked for {} at {}",
            appointment.id, appointment.date, request.time
        );

        Ok(AppointmentWithDoctor {
            appointment,
            doctor: Some(doctor),
        })
    }

    /// Doctor-side status change, gated by the lifecycle table.
    /// Completing is additionally blocked until the appointment date has
    /// arrived.
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        doctor_id: Uuid,
        request: UpdateAppointmentStatusRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!(
            "Doctor {} changing appointment {} to {}",
            doctor_id, appointment_id, request.status
        );

        let current = self
            .fetch_owned(appointment_id, "doctor_id", doctor_id, auth_token)
            .await?;

        self.lifecycle.validate_transition(&current.status, &request.status)?;

        if request.status == AppointmentStatus::Completed
            && current.date > Utc::now().date_naive()
        {
            return Err(AppointmentError::Validation(
                "Cannot complete an appointment before its date".to_string(),
            ));
        }

        let mut patch = serde_json::Map::new();
        patch.insert("status".to_string(), json!(request.status));
        patch.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        if let Some(ref notes) = request.notes {
            patch.insert("notes".to_string(), json!(notes));
        }
        if request.status == AppointmentStatus::Cancelled {
            let reason = request.notes.clone().unwrap_or_else(|| "Cancelled by doctor".to_string());
            patch.insert("cancellation_reason".to_string(), json!(reason));
        }

        self.apply_patch(appointment_id, "doctor_id", doctor_id, Value::Object(patch), auth_token)
            .await
    }

    /// Patient-side cancellation; only legal from pending/confirmed and
    /// always records the reason.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        request: CancelAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        if request.reason.trim().is_empty() {
            return Err(AppointmentError::Validation(
                "A cancellation reason is required".to_string(),
            ));
        }

        let current = self
            .fetch_owned(appointment_id, "patient_id", patient_id, auth_token)
            .await?;

        self.lifecycle
            .validate_transition(&current.status, &AppointmentStatus::Cancelled)?;

        let patch = json!({
            "status": AppointmentStatus::Cancelled,
            "cancellation_reason": request.reason.trim(),
            "updated_at": Utc::now().to_rfc3339()
        });

        info!("Patient {} cancelling appointment {}", patient_id, appointment_id);
        self.apply_patch(appointment_id, "patient_id", patient_id, patch, auth_token)
            .await
    }

    /// The patient's appointments, newest date first, doctors resolved.
    pub async fn appointments_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<AppointmentWithDoctor>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&order=date.desc,time.asc",
            patient_id
        );
        let appointments = self.fetch_appointments(&path, auth_token).await?;

        let mut doctors: HashMap<Uuid, DoctorSummary> = HashMap::new();
        for appointment in &appointments {
            if !doctors.contains_key(&appointment.doctor_id) {
                if let Ok(doctor) = self.availability.fetch_doctor(appointment.doctor_id, auth_token).await {
                    doctors.insert(appointment.doctor_id, doctor);
                }
            }
        }

        Ok(appointments
            .into_iter()
            .map(|appointment| {
                let doctor = doctors.get(&appointment.doctor_id).cloned();
                AppointmentWithDoctor { appointment, doctor }
            })
            .collect())
    }

    /// The doctor's schedule, soonest date first, patients resolved.
    pub async fn appointments_for_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<AppointmentWithPatient>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&order=date.asc,time.asc",
            doctor_id
        );
        let appointments = self.fetch_appointments(&path, auth_token).await?;

        let mut patients: HashMap<Uuid, PatientSummary> = HashMap::new();
        for appointment in &appointments {
            if !patients.contains_key(&appointment.patient_id) {
                if let Ok(Some(patient)) = self.fetch_patient(appointment.patient_id, auth_token).await {
                    patients.insert(appointment.patient_id, patient);
                }
            }
        }

        Ok(appointments
            .into_iter()
            .map(|appointment| {
                let patient = patients.get(&appointment.patient_id).cloned();
                AppointmentWithPatient { appointment, patient }
            })
            .collect())
    }

    /// Completed appointments for the patient, used by the medical
    /// history view.
    pub async fn completed_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<AppointmentWithDoctor>, AppointmentError> {
        let all = self.appointments_for_patient(patient_id, auth_token).await?;
        Ok(all
            .into_iter()
            .filter(|entry| entry.appointment.status == AppointmentStatus::Completed)
            .collect())
    }

    // Private helpers

    async fn verify_patient_exists(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        match self.fetch_patient(patient_id, auth_token).await? {
            Some(_) => Ok(()),
            None => Err(AppointmentError::PatientNotFound),
        }
    }

    async fn fetch_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<PatientSummary>, AppointmentError> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        rows.into_iter()
            .next()
            .map(|row| serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string())))
            .transpose()
    }

    async fn fetch_appointments(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string())))
            .collect()
    }

    /// Fetch an appointment scoped to its owner; a wrong owner looks
    /// identical to a missing row.
    async fn fetch_owned(
        &self,
        appointment_id: Uuid,
        owner_column: &str,
        owner_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&{}=eq.{}",
            appointment_id, owner_column, owner_id
        );
        let mut appointments = self.fetch_appointments(&path, auth_token).await?;
        if appointments.is_empty() {
            return Err(AppointmentError::NotFound);
        }
        Ok(appointments.remove(0))
    }

    async fn apply_patch(
        &self,
        appointment_id: Uuid,
        owner_column: &str,
        owner_id: Uuid,
        patch: Value,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&{}=eq.{}",
            appointment_id, owner_column, owner_id
        );
        let rows = self
            .supabase
            .update_returning(&path, Some(auth_token), patch)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(AppointmentError::NotFound)?;
        serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))
    }
}
