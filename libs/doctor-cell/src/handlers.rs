// libs/doctor-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{ScheduleError, SetWeeklyTemplateRequest, SlotQuery, UpsertOverrideRequest};
use crate::services::availability::AvailabilityService;

fn to_app_error(error: ScheduleError) -> AppError {
    match error {
        ScheduleError::InvalidTimeFormat(msg) => {
            AppError::BadRequest(format!("Invalid time format: {}", msg))
        }
        ScheduleError::InvalidAvailabilityRange => {
            AppError::BadRequest("Start time must be before end time".to_string())
        }
        ScheduleError::ValidationError(msg) => AppError::BadRequest(msg),
        ScheduleError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        ScheduleError::OverrideNotFound => {
            AppError::NotFound("Schedule override not found".to_string())
        }
        ScheduleError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

/// Only the doctor themself or an admin may edit a schedule.
fn authorize_schedule_edit(user: &User, doctor_id: Uuid) -> Result<(), AppError> {
    let is_owner =
        doctor_id.to_string() == user.id && user.role.as_deref() == Some("doctor");
    let is_admin = user.role.as_deref() == Some("admin");

    if !is_owner && !is_admin {
        return Err(AppError::Forbidden(
            "Not authorized to manage this doctor's schedule".to_string(),
        ));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn get_weekly_template(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);

    let rules = service
        .get_weekly_template(doctor_id, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({ "doctor_id": doctor_id, "rules": rules })))
}

#[axum::debug_handler]
pub async fn set_weekly_template(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SetWeeklyTemplateRequest>,
) -> Result<Json<Value>, AppError> {
    authorize_schedule_edit(&user, doctor_id)?;

    let service = AvailabilityService::new(&state);

    let rules = service
        .set_weekly_template(doctor_id, request.rules, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor_id": doctor_id,
        "rules": rules,
        "message": "Weekly template replaced"
    })))
}

#[axum::debug_handler]
pub async fn get_overrides(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);

    let overrides = service
        .get_overrides(doctor_id, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({ "doctor_id": doctor_id, "overrides": overrides })))
}

#[axum::debug_handler]
pub async fn upsert_override(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpsertOverrideRequest>,
) -> Result<Json<Value>, AppError> {
    authorize_schedule_edit(&user, doctor_id)?;

    let service = AvailabilityService::new(&state);

    let entry = service
        .upsert_override(doctor_id, request.into_override(), auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "override": entry,
        "message": "Schedule override saved"
    })))
}

#[axum::debug_handler]
pub async fn delete_override(
    State(state): State<Arc<AppConfig>>,
    Path((doctor_id, date)): Path<(Uuid, NaiveDate)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    authorize_schedule_edit(&user, doctor_id)?;

    let service = AvailabilityService::new(&state);

    service
        .delete_override(doctor_id, date, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Schedule override deleted"
    })))
}

/// Slot listing is open to any authenticated user; patients call this to
/// pick a bookable time.
#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);

    let slots = service
        .get_available_slots(doctor_id, query.date, auth.token())
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "slots": slots
    })))
}
