// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};
use shared_models::auth::{Actor, ActorRole};

use doctor_cell::models::ScheduleError;
use doctor_cell::services::availability::{
    generate_available_slots, local_now, AvailabilityService,
};
use doctor_cell::services::timegrid::ClockTime;

use crate::models::{
    Appointment, AppointmentAction, AppointmentError, AppointmentSearchQuery, AppointmentStatus,
    BookAppointmentRequest,
};
use crate::services::conflict::{intervals_overlap, ConflictDetectionService};
use crate::services::lifecycle::AppointmentLifecycleService;

pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    availability_service: AvailabilityService,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
    utc_offset_minutes: i32,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            availability_service: AvailabilityService::new(config),
            conflict_service: ConflictDetectionService::new(Arc::clone(&supabase)),
            lifecycle_service: AppointmentLifecycleService::new(),
            supabase,
            utc_offset_minutes: config.clinic_utc_offset_minutes,
        }
    }

    /// Book a new appointment. The requested start must be in the slot
    /// list generated for that doctor and date right now; the insert
    /// itself is additionally guarded by the storage-side unique index,
    /// so a lost race still comes back as `SlotUnavailable`.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        actor: Actor,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking appointment for patient {} with doctor {} on {}",
            request.patient_id, request.doctor_id, request.appointment_date
        );

        // Patients book for themselves; doctors and admins may book on
        // a patient's behalf.
        if actor.role == ActorRole::Patient && actor.id != request.patient_id {
            return Err(AppointmentError::Forbidden);
        }

        let profile = self
            .availability_service
            .fetch_schedule_profile(request.doctor_id, auth_token)
            .await
            .map_err(schedule_error)?;

        let existing = self
            .conflict_service
            .scheduled_intervals_for_date(request.doctor_id, request.appointment_date, None, auth_token)
            .await?;

        let duration = profile.appointment_duration_minutes;
        let end_time = request
            .start_time
            .checked_add_minutes(duration as u16)
            .ok_or(AppointmentError::SlotUnavailable)?;

        if existing
            .iter()
            .any(|booked| intervals_overlap(booked, request.start_time, end_time))
        {
            warn!(
                "Appointment conflict for doctor {} at {} {}",
                request.doctor_id, request.appointment_date, request.start_time
            );
            return Err(AppointmentError::SlotUnavailable);
        }

        let now = local_now(self.utc_offset_minutes);
        let slots = generate_available_slots(&profile, request.appointment_date, &existing, now);
        if !slots.contains(&request.start_time) {
            warn!(
                "Requested start {} is not a valid slot for doctor {} on {}",
                request.start_time, request.doctor_id, request.appointment_date
            );
            return Err(AppointmentError::SlotUnavailable);
        }

        let created = Utc::now();
        let appointment_data = json!({
            "patient_id": request.patient_id,
            "doctor_id": request.doctor_id,
            "appointment_date": request.appointment_date,
            "start_time": request.start_time,
            "end_time": end_time,
            "duration_minutes": duration,
            "status": AppointmentStatus::Scheduled.to_string(),
            "reason": request.reason,
            "patient_phone": request.patient_phone,
            "created_at": created.to_rfc3339(),
            "updated_at": created.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
                Some(headers),
            )
            .await
            .map_err(|e| match e {
                // The partial unique index caught a concurrent booking of
                // the same slot.
                SupabaseError::Conflict(_) => AppointmentError::SlotUnavailable,
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        let row = result.into_iter().next().ok_or_else(|| {
            AppointmentError::DatabaseError("Failed to create appointment".to_string())
        })?;
        let appointment: Appointment = serde_json::from_value(row).map_err(|e| {
            AppointmentError::DatabaseError(format!("Failed to parse created appointment: {}", e))
        })?;

        info!("Appointment {} booked successfully", appointment.id);
        Ok(appointment)
    }

    /// Route a tagged mutation onto the current appointment.
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        action: AppointmentAction,
        actor: Actor,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;

        match action {
            AppointmentAction::Reschedule {
                new_date,
                new_start_time,
            } => {
                self.reschedule(current, new_date, new_start_time, actor, auth_token)
                    .await
            }
            AppointmentAction::Cancel { reason } => {
                self.cancel(current, reason, actor, auth_token).await
            }
            AppointmentAction::Complete { remarks } => {
                self.complete(current, remarks, actor, auth_token).await
            }
            AppointmentAction::MarkNoShow => self.mark_no_show(current, actor, auth_token).await,
        }
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let row = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        serde_json::from_value(row).map_err(|e| {
            AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e))
        })
    }

    /// Search appointments with filters, ordered by date and start time.
    pub async fn search_appointments(
        &self,
        query: AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Searching appointments with filters: {:?}", query);

        let mut query_parts = Vec::new();

        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(doctor_id) = query.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from_date) = query.from_date {
            query_parts.push(format!("appointment_date=gte.{}", from_date));
        }
        if let Some(to_date) = query.to_date {
            query_parts.push(format!("appointment_date=lte.{}", to_date));
        }

        let mut path = format!(
            "/rest/v1/appointments?{}&order=appointment_date.asc,start_time.asc",
            query_parts.join("&")
        );

        if let Some(limit) = query.limit {
            path.push_str(&format!("&limit={}", limit));
        }
        if let Some(offset) = query.offset {
            path.push_str(&format!("&offset={}", offset));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|row| serde_json::from_value(row))
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| {
                AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e))
            })
    }

    // ==============================================================================
    // PRIVATE LIFECYCLE OPERATIONS
    // ==============================================================================

    async fn reschedule(
        &self,
        current: Appointment,
        new_date: NaiveDate,
        new_start_time: ClockTime,
        actor: Actor,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Rescheduling appointment {} to {} {}", current.id, new_date, new_start_time);

        self.lifecycle_service.authorize_participant(&actor, &current)?;

        if current.status != AppointmentStatus::Scheduled {
            return Err(AppointmentError::InvalidTransition(current.status));
        }

        let profile = self
            .availability_service
            .fetch_schedule_profile(current.doctor_id, auth_token)
            .await
            .map_err(schedule_error)?;

        // The appointment being moved must not block itself.
        let existing = self
            .conflict_service
            .scheduled_intervals_for_date(current.doctor_id, new_date, Some(current.id), auth_token)
            .await?;

        // The snapshotted duration travels with the appointment even if
        // the doctor's default has changed since booking.
        let new_end_time = new_start_time
            .checked_add_minutes(current.duration_minutes as u16)
            .ok_or(AppointmentError::SlotUnavailable)?;

        if existing
            .iter()
            .any(|booked| intervals_overlap(booked, new_start_time, new_end_time))
        {
            return Err(AppointmentError::SlotUnavailable);
        }

        let now = local_now(self.utc_offset_minutes);
        let slots = generate_available_slots(&profile, new_date, &existing, now);
        if !slots.contains(&new_start_time) {
            return Err(AppointmentError::SlotUnavailable);
        }

        let mut update_data = serde_json::Map::new();
        update_data.insert("appointment_date".to_string(), json!(new_date));
        update_data.insert("start_time".to_string(), json!(new_start_time));
        update_data.insert("end_time".to_string(), json!(new_end_time));

        let updated = self.patch_appointment(current.id, update_data, auth_token).await?;
        info!("Appointment {} rescheduled", updated.id);
        Ok(updated)
    }

    async fn cancel(
        &self,
        current: Appointment,
        reason: Option<String>,
        actor: Actor,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment: {}", current.id);

        self.lifecycle_service.authorize_participant(&actor, &current)?;
        self.lifecycle_service
            .validate_transition(&current.status, &AppointmentStatus::Cancelled)?;

        let mut update_data = serde_json::Map::new();
        update_data.insert(
            "status".to_string(),
            json!(AppointmentStatus::Cancelled.to_string()),
        );
        if let Some(reason) = reason {
            update_data.insert("remarks".to_string(), json!(reason));
        }

        let updated = self.patch_appointment(current.id, update_data, auth_token).await?;
        info!("Appointment {} cancelled", updated.id);
        Ok(updated)
    }

    async fn complete(
        &self,
        current: Appointment,
        remarks: String,
        actor: Actor,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Completing appointment: {}", current.id);

        self.lifecycle_service.authorize_assigned_doctor(&actor, &current)?;
        self.lifecycle_service
            .validate_transition(&current.status, &AppointmentStatus::Completed)?;

        let remarks = remarks.trim();
        if remarks.is_empty() {
            return Err(AppointmentError::RemarksRequired);
        }

        let mut update_data = serde_json::Map::new();
        update_data.insert(
            "status".to_string(),
            json!(AppointmentStatus::Completed.to_string()),
        );
        update_data.insert("remarks".to_string(), json!(remarks));

        let updated = self.patch_appointment(current.id, update_data, auth_token).await?;
        info!("Appointment {} completed", updated.id);
        Ok(updated)
    }

    async fn mark_no_show(
        &self,
        current: Appointment,
        actor: Actor,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Marking appointment {} as no-show", current.id);

        self.lifecycle_service.authorize_assigned_doctor(&actor, &current)?;
        self.lifecycle_service
            .validate_transition(&current.status, &AppointmentStatus::NoShow)?;

        let mut update_data = serde_json::Map::new();
        update_data.insert(
            "status".to_string(),
            json!(AppointmentStatus::NoShow.to_string()),
        );

        let updated = self.patch_appointment(current.id, update_data, auth_token).await?;
        info!("Appointment {} marked as no-show", updated.id);
        Ok(updated)
    }

    async fn patch_appointment(
        &self,
        appointment_id: Uuid,
        mut update_data: serde_json::Map<String, Value>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(headers),
            )
            .await
            .map_err(|e| match e {
                SupabaseError::Conflict(_) => AppointmentError::SlotUnavailable,
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        let row = result.into_iter().next().ok_or_else(|| {
            AppointmentError::DatabaseError("Failed to update appointment".to_string())
        })?;
        serde_json::from_value(row).map_err(|e| {
            AppointmentError::DatabaseError(format!("Failed to parse updated appointment: {}", e))
        })
    }
}

fn schedule_error(e: ScheduleError) -> AppointmentError {
    match e {
        ScheduleError::DoctorNotFound => AppointmentError::DoctorNotFound,
        ScheduleError::InvalidTimeFormat(raw) => AppointmentError::InvalidTimeFormat(raw),
        other => AppointmentError::DatabaseError(other.to_string()),
    }
}
