// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use chrono::NaiveDate;
use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use doctor_cell::models::BookedInterval;
use doctor_cell::services::timegrid::ClockTime;

use crate::models::AppointmentError;

/// Half-open interval overlap: `[start, end)` against a booked interval.
pub fn intervals_overlap(booked: &BookedInterval, start: ClockTime, end: ClockTime) -> bool {
    start < booked.end_time && booked.start_time < end
}

pub struct ConflictDetectionService {
    supabase: Arc<SupabaseClient>,
}

impl ConflictDetectionService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// The `[start, end)` intervals of scheduled appointments for one
    /// doctor and date. Only `scheduled` rows block a slot; terminal
    /// appointments never conflict. `exclude_appointment_id` lets a
    /// reschedule leave its own current interval out of the picture.
    pub async fn scheduled_intervals_for_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<BookedInterval>, AppointmentError> {
        debug!(
            "Fetching scheduled intervals for doctor {} on {}",
            doctor_id, date
        );

        let mut query_parts = vec![
            format!("doctor_id=eq.{}", doctor_id),
            format!("appointment_date=eq.{}", date),
            "status=eq.scheduled".to_string(),
        ];

        if let Some(exclude_id) = exclude_appointment_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!(
            "/rest/v1/appointments?{}&select=start_time,end_time&order=start_time.asc",
            query_parts.join("&")
        );

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(s: &str) -> ClockTime {
        ClockTime::parse(s).unwrap()
    }

    fn booked(start: &str, end: &str) -> BookedInterval {
        BookedInterval {
            start_time: time(start),
            end_time: time(end),
        }
    }

    #[test]
    fn overlapping_intervals_collide() {
        let existing = booked("09:00", "09:30");
        assert!(intervals_overlap(&existing, time("09:00"), time("09:30")));
        assert!(intervals_overlap(&existing, time("09:15"), time("09:45")));
        assert!(intervals_overlap(&existing, time("08:45"), time("09:15")));
        assert!(intervals_overlap(&existing, time("08:00"), time("10:00")));
    }

    #[test]
    fn touching_endpoints_do_not_collide() {
        let existing = booked("09:00", "09:30");
        assert!(!intervals_overlap(&existing, time("08:30"), time("09:00")));
        assert!(!intervals_overlap(&existing, time("09:30"), time("10:00")));
    }

    #[test]
    fn disjoint_intervals_do_not_collide() {
        let existing = booked("09:00", "09:30");
        assert!(!intervals_overlap(&existing, time("11:00"), time("11:30")));
    }
}
