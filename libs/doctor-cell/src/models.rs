// libs/doctor-cell/src/models.rs
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::timegrid::ClockTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialty: String,
    /// Default slot length for this doctor. Snapshotted onto each
    /// appointment at booking time; changing it never resizes existing
    /// appointments.
    pub appointment_duration_minutes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Sun => DayOfWeek::Sunday,
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
        }
    }
}

/// One recurring window in a doctor's weekly template. The model allows
/// several rules on the same day; the resolver takes the first match in
/// stored order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyAvailabilityRule {
    pub day_of_week: DayOfWeek,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
}

impl WeeklyAvailabilityRule {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.start_time >= self.end_time {
            return Err(ScheduleError::InvalidAvailabilityRange);
        }
        Ok(())
    }
}

/// Per-date exception to the weekly template. Working hours are present
/// iff `is_working`; an override always pre-empts the weekly rule for its
/// exact date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOverride {
    pub date: NaiveDate,
    pub is_working: bool,
    pub start_time: Option<ClockTime>,
    pub end_time: Option<ClockTime>,
}

impl ScheduleOverride {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.is_working {
            match (self.start_time, self.end_time) {
                (Some(start), Some(end)) if start < end => Ok(()),
                (Some(_), Some(_)) => Err(ScheduleError::InvalidAvailabilityRange),
                _ => Err(ScheduleError::ValidationError(
                    "Working override requires start_time and end_time".to_string(),
                )),
            }
        } else if self.start_time.is_some() || self.end_time.is_some() {
            Err(ScheduleError::ValidationError(
                "Non-working override must not carry working hours".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Everything the slot engine needs to know about one doctor's schedule.
#[derive(Debug, Clone)]
pub struct DoctorScheduleProfile {
    pub doctor_id: Uuid,
    pub weekly_rules: Vec<WeeklyAvailabilityRule>,
    pub overrides: HashMap<NaiveDate, ScheduleOverride>,
    pub appointment_duration_minutes: i32,
}

/// Resolved working window for one doctor on one calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EffectiveAvailability {
    NotWorking,
    Working {
        start_time: ClockTime,
        end_time: ClockTime,
    },
}

/// A booked `[start, end)` interval blocking slots on a doctor's day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedInterval {
    pub start_time: ClockTime,
    pub end_time: ClockTime,
}

/// "Today and the current wall-clock minute" in the clinic's fixed
/// reference offset; used for the no-booking-into-the-past cutoff.
#[derive(Debug, Clone, Copy)]
pub struct LocalNow {
    pub today: NaiveDate,
    pub minutes: u16,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetWeeklyTemplateRequest {
    pub rules: Vec<WeeklyAvailabilityRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertOverrideRequest {
    pub date: NaiveDate,
    pub is_working: bool,
    pub start_time: Option<ClockTime>,
    pub end_time: Option<ClockTime>,
}

impl UpsertOverrideRequest {
    pub fn into_override(self) -> ScheduleOverride {
        ScheduleOverride {
            date: self.date,
            is_working: self.is_working,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
}

// Error types specific to schedule operations
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),

    #[error("Availability start time must be before end time")]
    InvalidAvailabilityRange,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Schedule override not found")]
    OverrideNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
