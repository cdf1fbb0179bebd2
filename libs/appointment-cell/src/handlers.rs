// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Actor, ActorRole, User};
use shared_models::error::AppError;

use crate::models::{
    AppointmentAction, AppointmentError, AppointmentSearchQuery, AppointmentStatus,
    BookAppointmentRequest,
};
use crate::services::booking::AppointmentBookingService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AppointmentQueryParams {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

fn to_app_error(error: AppointmentError) -> AppError {
    match error {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        AppointmentError::SlotUnavailable => {
            AppError::Conflict("Requested slot is no longer available".to_string())
        }
        AppointmentError::InvalidTransition(status) => AppError::BadRequest(format!(
            "Appointment cannot be modified in status {}",
            status
        )),
        AppointmentError::RemarksRequired => {
            AppError::BadRequest("Completion remarks are required".to_string())
        }
        AppointmentError::Forbidden => {
            AppError::Forbidden("Not authorized for this appointment".to_string())
        }
        AppointmentError::InvalidTimeFormat(raw) => {
            AppError::BadRequest(format!("Invalid time format: {}", raw))
        }
        AppointmentError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .book_appointment(request, actor, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(to_app_error)?;

    // Only a participant or an admin may view an appointment
    let is_participant =
        actor.id == appointment.patient_id || actor.id == appointment.doctor_id;
    if !is_participant && !actor.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(action): Json<AppointmentAction>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let booking_service = AppointmentBookingService::new(&state);

    let message = match &action {
        AppointmentAction::Reschedule { .. } => "Appointment rescheduled",
        AppointmentAction::Cancel { .. } => "Appointment cancelled",
        AppointmentAction::Complete { .. } => "Appointment completed",
        AppointmentAction::MarkNoShow => "Appointment marked as no-show",
    };

    let appointment = booking_service
        .update_appointment(appointment_id, action, actor, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": message
    })))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<AppointmentQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;

    let mut query = AppointmentSearchQuery {
        patient_id: params.patient_id,
        doctor_id: params.doctor_id,
        status: params.status,
        from_date: params.from_date,
        to_date: params.to_date,
        limit: params.limit,
        offset: params.offset,
    };

    // Non-admins are scoped to their own timeline regardless of filters.
    match actor.role {
        ActorRole::Patient => {
            if query.patient_id.is_some_and(|id| id != actor.id) {
                return Err(AppError::Forbidden(
                    "Patients may only list their own appointments".to_string(),
                ));
            }
            query.patient_id = Some(actor.id);
        }
        ActorRole::Doctor => {
            if query.doctor_id.is_some_and(|id| id != actor.id) {
                return Err(AppError::Forbidden(
                    "Doctors may only list their own appointments".to_string(),
                ));
            }
            query.doctor_id = Some(actor.id);
        }
        ActorRole::Admin => {}
    }

    let booking_service = AppointmentBookingService::new(&state);
    let appointments = booking_service
        .search_appointments(query, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({ "appointments": appointments })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;

    let is_own = actor.role == ActorRole::Patient && actor.id == patient_id;
    if !is_own && !actor.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to list this patient's appointments".to_string(),
        ));
    }

    let query = AppointmentSearchQuery {
        patient_id: Some(patient_id),
        ..Default::default()
    };

    let booking_service = AppointmentBookingService::new(&state);
    let appointments = booking_service
        .search_appointments(query, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({ "appointments": appointments })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;

    let is_own = actor.role == ActorRole::Doctor && actor.id == doctor_id;
    if !is_own && !actor.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to list this doctor's appointments".to_string(),
        ));
    }

    let query = AppointmentSearchQuery {
        doctor_id: Some(doctor_id),
        ..Default::default()
    };

    let booking_service = AppointmentBookingService::new(&state);
    let appointments = booking_service
        .search_appointments(query, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({ "appointments": appointments })))
}
