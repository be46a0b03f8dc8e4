// libs/appointment-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{slot_time, Appointment, AppointmentError, DoctorSummary};

/// Computes the bookable slots for a (doctor, date) pair: the doctor's
/// daily grid minus every non-cancelled booking. Read-only; the booking
/// insert remains the authoritative conflict check.
pub struct AvailabilityService {
    supabase: Arc<SupabaseClient>,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Ordered free slot starts for the doctor on the given date.
    /// Rejects past dates before touching appointment data; a doctor
    /// with no bookable window yields an empty list.
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: &str,
        auth_token: &str,
    ) -> Result<Vec<NaiveTime>, AppointmentError> {
        let date = parse_appointment_date(date)?;
        validate_not_past(date, Utc::now().date_naive())?;

        let doctor = self.fetch_doctor(doctor_id, auth_token).await?;

        let grid = slot_grid(doctor.work_start, doctor.work_end, doctor.slot_minutes);
        if grid.is_empty() {
            debug!("Doctor {} has no bookable window configured", doctor_id);
            return Ok(vec![]);
        }

        let booked = self.booked_times(doctor_id, date, auth_token).await?;
        let free = subtract_booked(grid, &booked);

        debug!(
            "Doctor {} on {}: {} free slots ({} booked)",
            doctor_id,
            date,
            free.len(),
            booked.len()
        );
        Ok(free)
    }

    pub(crate) async fn fetch_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<DoctorSummary, AppointmentError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(AppointmentError::DoctorNotFound)?;
        serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))
    }

    /// Slot starts already taken on that date, cancelled bookings excluded.
    pub(crate) async fn booked_times(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<NaiveTime>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&date=eq.{}&status=neq.cancelled&order=time.asc",
            doctor_id, date
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let appointments: Vec<Appointment> = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        Ok(appointments.into_iter().map(|apt| apt.time).collect())
    }
}

// Pure slot arithmetic, kept free of storage so it can be tested directly.

/// All slot starts in [work_start, work_end) at the given granularity,
/// chronological. A slot must end by `work_end` to count.
pub fn slot_grid(work_start: NaiveTime, work_end: NaiveTime, slot_minutes: i64) -> Vec<NaiveTime> {
    if slot_minutes <= 0 || work_start >= work_end {
        return vec![];
    }

    let step = Duration::minutes(slot_minutes);
    let mut slots = Vec::new();
    let mut current = work_start;

    loop {
        // NaiveTime addition wraps at midnight; the wrap marker ends the day.
        let (slot_end, wrapped) = current.overflowing_add_signed(step);
        if wrapped != 0 || slot_end > work_end {
            break;
        }
        slots.push(current);
        current = slot_end;
    }

    slots
}

/// Remove every grid slot whose start matches a booked time.
pub fn subtract_booked(grid: Vec<NaiveTime>, booked: &[NaiveTime]) -> Vec<NaiveTime> {
    grid.into_iter().filter(|slot| !booked.contains(slot)).collect()
}

pub fn parse_appointment_date(raw: &str) -> Result<NaiveDate, AppointmentError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        AppointmentError::Validation(format!("Invalid date '{}': expected YYYY-MM-DD", raw))
    })
}

pub fn parse_slot_time(raw: &str) -> Result<NaiveTime, AppointmentError> {
    NaiveTime::parse_from_str(raw, slot_time::FORMAT).map_err(|_| {
        AppointmentError::Validation(format!("Invalid time '{}': expected 24-hour HH:MM", raw))
    })
}

pub fn validate_not_past(date: NaiveDate, today: NaiveDate) -> Result<(), AppointmentError> {
    if date < today {
        return Err(AppointmentError::Validation(
            "Cannot book appointments for past dates".to_string(),
        ));
    }
    Ok(())
}
