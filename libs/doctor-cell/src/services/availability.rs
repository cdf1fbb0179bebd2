// libs/doctor-cell/src/services/availability.rs

use chrono::{Datelike, Duration, NaiveDate, Timelike, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{
    BookedInterval, DayOfWeek, Doctor, DoctorScheduleProfile, EffectiveAvailability, LocalNow,
    ScheduleError, ScheduleOverride, WeeklyAvailabilityRule,
};
use crate::services::timegrid::{self, ClockTime};

// ==============================================================================
// PURE SCHEDULING ENGINE
// ==============================================================================

/// Resolve the working window for one doctor on one date.
///
/// Strict two-tier precedence: a date override wins outright; otherwise
/// the first weekly rule matching the civil weekday applies; otherwise
/// the doctor is not working. Weekly and override hours are never merged.
pub fn resolve_effective_availability(
    profile: &DoctorScheduleProfile,
    date: NaiveDate,
) -> EffectiveAvailability {
    if let Some(entry) = profile.overrides.get(&date) {
        if !entry.is_working {
            return EffectiveAvailability::NotWorking;
        }
        return match (entry.start_time, entry.end_time) {
            (Some(start_time), Some(end_time)) => EffectiveAvailability::Working {
                start_time,
                end_time,
            },
            // Working overrides are validated to carry both times; a row
            // that lost them is treated as a day off rather than guessed.
            _ => EffectiveAvailability::NotWorking,
        };
    }

    let day_of_week = DayOfWeek::from(date.weekday());
    profile
        .weekly_rules
        .iter()
        .find(|rule| rule.day_of_week == day_of_week)
        .map(|rule| EffectiveAvailability::Working {
            start_time: rule.start_time,
            end_time: rule.end_time,
        })
        .unwrap_or(EffectiveAvailability::NotWorking)
}

/// Compute the bookable slot starts for a doctor on a date.
///
/// Candidates step through the effective window at the doctor's default
/// duration; a candidate survives only if its whole `[start, start+dur)`
/// interval fits the window, collides with no existing scheduled
/// interval, and (on the current day only) starts strictly after `now`.
/// Recomputed from scratch on every call; no slot state is held anywhere.
pub fn generate_available_slots(
    profile: &DoctorScheduleProfile,
    date: NaiveDate,
    existing: &[BookedInterval],
    now: LocalNow,
) -> Vec<ClockTime> {
    let (window_start, window_end) = match resolve_effective_availability(profile, date) {
        EffectiveAvailability::Working {
            start_time,
            end_time,
        } => (start_time, end_time),
        EffectiveAvailability::NotWorking => return Vec::new(),
    };

    let duration = profile.appointment_duration_minutes;
    let mut slots = Vec::new();

    for offset in timegrid::enumerate(window_start.minutes(), window_end.minutes(), duration) {
        let Some(slot_start) = ClockTime::from_minutes(offset) else {
            continue;
        };
        let Some(slot_end) = slot_start.checked_add_minutes(duration as u16) else {
            continue;
        };

        let blocked = existing
            .iter()
            .any(|booked| slot_start < booked.end_time && booked.start_time < slot_end);
        if blocked {
            continue;
        }

        if date == now.today && slot_start.minutes() <= now.minutes {
            continue;
        }

        slots.push(slot_start);
    }

    slots
}

/// Current date and minute-of-day in the clinic's fixed reference offset.
pub fn local_now(utc_offset_minutes: i32) -> LocalNow {
    let shifted = Utc::now() + Duration::minutes(utc_offset_minutes as i64);

    LocalNow {
        today: shifted.date_naive(),
        minutes: (shifted.hour() * 60 + shifted.minute()) as u16,
    }
}

// ==============================================================================
// SCHEDULE MANAGEMENT SERVICE
// ==============================================================================

pub struct AvailabilityService {
    supabase: SupabaseClient,
    utc_offset_minutes: i32,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            utc_offset_minutes: config.clinic_utc_offset_minutes,
        }
    }

    /// Fetch a doctor row; absence maps to `DoctorNotFound`.
    pub async fn get_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<Doctor, ScheduleError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(db_error)?;

        let row = result.into_iter().next().ok_or(ScheduleError::DoctorNotFound)?;
        serde_json::from_value(row)
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse doctor: {}", e)))
    }

    /// Get a doctor's weekly template, ordered by day then start time.
    pub async fn get_weekly_template(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<WeeklyAvailabilityRule>, ScheduleError> {
        debug!("Fetching weekly template for doctor: {}", doctor_id);

        let path = format!(
            "/rest/v1/doctor_weekly_availability?doctor_id=eq.{}&order=day_of_week.asc,start_time.asc",
            doctor_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(db_error)?;

        result
            .into_iter()
            .map(|row| serde_json::from_value(row))
            .collect::<Result<Vec<WeeklyAvailabilityRule>, _>>()
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse weekly rules: {}", e)))
    }

    /// Replace a doctor's whole weekly template.
    pub async fn set_weekly_template(
        &self,
        doctor_id: Uuid,
        rules: Vec<WeeklyAvailabilityRule>,
        auth_token: &str,
    ) -> Result<Vec<WeeklyAvailabilityRule>, ScheduleError> {
        debug!(
            "Replacing weekly template for doctor {} with {} rules",
            doctor_id,
            rules.len()
        );

        for rule in &rules {
            rule.validate()?;
        }

        // Make sure the doctor exists before wiping anything.
        self.get_doctor(doctor_id, auth_token).await?;

        let delete_path = format!("/rest/v1/doctor_weekly_availability?doctor_id=eq.{}", doctor_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &delete_path, Some(auth_token), None)
            .await
            .map_err(db_error)?;

        if rules.is_empty() {
            return Ok(rules);
        }

        let rows: Vec<Value> = rules
            .iter()
            .map(|rule| {
                json!({
                    "doctor_id": doctor_id,
                    "day_of_week": rule.day_of_week,
                    "start_time": rule.start_time,
                    "end_time": rule.end_time,
                })
            })
            .collect();

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctor_weekly_availability",
                Some(auth_token),
                Some(Value::Array(rows)),
                Some(headers),
            )
            .await
            .map_err(db_error)?;

        result
            .into_iter()
            .map(|row| serde_json::from_value(row))
            .collect::<Result<Vec<WeeklyAvailabilityRule>, _>>()
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse weekly rules: {}", e)))
    }

    /// Get all date overrides for a doctor, ascending by date.
    pub async fn get_overrides(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<ScheduleOverride>, ScheduleError> {
        debug!("Fetching schedule overrides for doctor: {}", doctor_id);

        let path = format!(
            "/rest/v1/doctor_schedule_overrides?doctor_id=eq.{}&order=date.asc",
            doctor_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(db_error)?;

        result
            .into_iter()
            .map(|row| serde_json::from_value(row))
            .collect::<Result<Vec<ScheduleOverride>, _>>()
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse overrides: {}", e)))
    }

    /// Create or update the override for one (doctor, date).
    pub async fn upsert_override(
        &self,
        doctor_id: Uuid,
        entry: ScheduleOverride,
        auth_token: &str,
    ) -> Result<ScheduleOverride, ScheduleError> {
        debug!(
            "Upserting schedule override for doctor {} on {}",
            doctor_id, entry.date
        );

        entry.validate()?;
        self.get_doctor(doctor_id, auth_token).await?;

        let key_path = format!(
            "/rest/v1/doctor_schedule_overrides?doctor_id=eq.{}&date=eq.{}",
            doctor_id, entry.date
        );
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &key_path, Some(auth_token), None)
            .await
            .map_err(db_error)?;

        let body = json!({
            "doctor_id": doctor_id,
            "date": entry.date,
            "is_working": entry.is_working,
            "start_time": entry.start_time,
            "end_time": entry.end_time,
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = if existing.is_empty() {
            self.supabase
                .request_with_headers(
                    Method::POST,
                    "/rest/v1/doctor_schedule_overrides",
                    Some(auth_token),
                    Some(body),
                    Some(headers),
                )
                .await
                .map_err(db_error)?
        } else {
            self.supabase
                .request_with_headers(
                    Method::PATCH,
                    &key_path,
                    Some(auth_token),
                    Some(body),
                    Some(headers),
                )
                .await
                .map_err(db_error)?
        };

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::DatabaseError("Failed to upsert override".to_string()))?;
        serde_json::from_value(row)
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse override: {}", e)))
    }

    /// Delete the override for one (doctor, date).
    pub async fn delete_override(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<(), ScheduleError> {
        debug!("Deleting schedule override for doctor {} on {}", doctor_id, date);

        let key_path = format!(
            "/rest/v1/doctor_schedule_overrides?doctor_id=eq.{}&date=eq.{}",
            doctor_id, date
        );
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &key_path, Some(auth_token), None)
            .await
            .map_err(db_error)?;

        if existing.is_empty() {
            return Err(ScheduleError::OverrideNotFound);
        }

        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &key_path, Some(auth_token), None)
            .await
            .map_err(db_error)?;

        Ok(())
    }

    /// Assemble the full schedule profile the slot engine consumes.
    pub async fn fetch_schedule_profile(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<DoctorScheduleProfile, ScheduleError> {
        let doctor = self.get_doctor(doctor_id, auth_token).await?;
        let weekly_rules = self.get_weekly_template(doctor_id, auth_token).await?;
        let overrides = self
            .get_overrides(doctor_id, auth_token)
            .await?
            .into_iter()
            .map(|entry| (entry.date, entry))
            .collect();

        Ok(DoctorScheduleProfile {
            doctor_id,
            weekly_rules,
            overrides,
            appointment_duration_minutes: doctor.appointment_duration_minutes,
        })
    }

    /// Scheduled `[start, end)` intervals blocking a doctor's date.
    /// Terminal appointments (completed, cancelled, noshow) never block.
    pub async fn scheduled_intervals(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<BookedInterval>, ScheduleError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&status=eq.scheduled&select=start_time,end_time&order=start_time.asc",
            doctor_id, date
        );

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(db_error)
    }

    /// Fresh slot list for one doctor and date.
    pub async fn get_available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<ClockTime>, ScheduleError> {
        debug!("Calculating available slots for doctor {} on {}", doctor_id, date);

        let profile = self.fetch_schedule_profile(doctor_id, auth_token).await?;
        let existing = self.scheduled_intervals(doctor_id, date, auth_token).await?;
        let now = local_now(self.utc_offset_minutes);

        let slots = generate_available_slots(&profile, date, &existing, now);
        debug!("Found {} available slots", slots.len());
        Ok(slots)
    }
}

fn db_error(e: SupabaseError) -> ScheduleError {
    ScheduleError::DatabaseError(e.to_string())
}
