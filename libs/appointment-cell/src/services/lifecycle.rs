// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use shared_models::auth::{Actor, ActorRole};

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

/// State machine over appointment statuses plus the per-operation
/// actor checks. `scheduled` is the only live state; `completed`,
/// `cancelled` and `noshow` are terminal.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// All valid next statuses for a given current status.
    pub fn valid_transitions(&self, current: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed
            | AppointmentStatus::Cancelled
            | AppointmentStatus::NoShow => vec![],
        }
    }

    pub fn validate_transition(
        &self,
        current: &AppointmentStatus,
        next: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition {} -> {}", current, next);

        if !self.valid_transitions(current).contains(next) {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            return Err(AppointmentError::InvalidTransition(*current));
        }

        Ok(())
    }

    /// Cancel and reschedule are open to any participant: the owning
    /// patient, the assigned doctor, or an admin.
    pub fn authorize_participant(
        &self,
        actor: &Actor,
        appointment: &Appointment,
    ) -> Result<(), AppointmentError> {
        match actor.role {
            ActorRole::Admin => Ok(()),
            ActorRole::Patient if actor.id == appointment.patient_id => Ok(()),
            ActorRole::Doctor if actor.id == appointment.doctor_id => Ok(()),
            _ => Err(AppointmentError::Forbidden),
        }
    }

    /// Complete and mark-no-show belong to the assigned doctor alone.
    pub fn authorize_assigned_doctor(
        &self,
        actor: &Actor,
        appointment: &Appointment,
    ) -> Result<(), AppointmentError> {
        match actor.role {
            ActorRole::Doctor if actor.id == appointment.doctor_id => Ok(()),
            _ => Err(AppointmentError::Forbidden),
        }
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use doctor_cell::services::timegrid::ClockTime;
    use uuid::Uuid;

    fn appointment(status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            appointment_date: "2026-09-09".parse().unwrap(),
            start_time: ClockTime::parse("09:00").unwrap(),
            end_time: ClockTime::parse("09:30").unwrap(),
            duration_minutes: 30,
            status,
            reason: None,
            patient_phone: None,
            remarks: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn scheduled_can_reach_every_terminal_state() {
        let service = AppointmentLifecycleService::new();

        for next in [
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
        ] {
            assert!(service
                .validate_transition(&AppointmentStatus::Scheduled, &next)
                .is_ok());
        }
    }

    #[test]
    fn terminal_states_allow_no_transitions() {
        let service = AppointmentLifecycleService::new();

        for current in [
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
        ] {
            assert!(service.valid_transitions(&current).is_empty());

            for next in [
                AppointmentStatus::Scheduled,
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ] {
                assert_matches!(
                    service.validate_transition(&current, &next),
                    Err(AppointmentError::InvalidTransition(status)) if status == current
                );
            }
        }
    }

    #[test]
    fn participants_may_cancel_but_strangers_may_not() {
        let service = AppointmentLifecycleService::new();
        let appt = appointment(AppointmentStatus::Scheduled);

        let owning_patient = Actor {
            id: appt.patient_id,
            role: ActorRole::Patient,
        };
        let assigned_doctor = Actor {
            id: appt.doctor_id,
            role: ActorRole::Doctor,
        };
        let admin = Actor {
            id: Uuid::new_v4(),
            role: ActorRole::Admin,
        };
        let other_patient = Actor {
            id: Uuid::new_v4(),
            role: ActorRole::Patient,
        };
        let other_doctor = Actor {
            id: Uuid::new_v4(),
            role: ActorRole::Doctor,
        };

        assert!(service.authorize_participant(&owning_patient, &appt).is_ok());
        assert!(service.authorize_participant(&assigned_doctor, &appt).is_ok());
        assert!(service.authorize_participant(&admin, &appt).is_ok());
        assert_matches!(
            service.authorize_participant(&other_patient, &appt),
            Err(AppointmentError::Forbidden)
        );
        assert_matches!(
            service.authorize_participant(&other_doctor, &appt),
            Err(AppointmentError::Forbidden)
        );
    }

    #[test]
    fn only_the_assigned_doctor_may_complete() {
        let service = AppointmentLifecycleService::new();
        let appt = appointment(AppointmentStatus::Scheduled);

        let assigned_doctor = Actor {
            id: appt.doctor_id,
            role: ActorRole::Doctor,
        };
        let owning_patient = Actor {
            id: appt.patient_id,
            role: ActorRole::Patient,
        };
        let admin = Actor {
            id: Uuid::new_v4(),
            role: ActorRole::Admin,
        };

        assert!(service.authorize_assigned_doctor(&assigned_doctor, &appt).is_ok());
        assert_matches!(
            service.authorize_assigned_doctor(&owning_patient, &appt),
            Err(AppointmentError::Forbidden)
        );
        assert_matches!(
            service.authorize_assigned_doctor(&admin, &appt),
            Err(AppointmentError::Forbidden)
        );
    }

    #[test]
    fn terminal_flag_matches_transition_table() {
        assert!(!AppointmentStatus::Scheduled.is_terminal());
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(AppointmentStatus::Cancelled.is_terminal());
        assert!(AppointmentStatus::NoShow.is_terminal());
    }
}
