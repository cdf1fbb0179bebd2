// libs/doctor-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    // All schedule operations require authentication
    let protected_routes = Router::new()
        .route("/{doctor_id}/schedule/template", get(handlers::get_weekly_template))
        .route("/{doctor_id}/schedule/template", put(handlers::set_weekly_template))
        .route("/{doctor_id}/schedule/overrides", get(handlers::get_overrides))
        .route("/{doctor_id}/schedule/overrides", put(handlers::upsert_override))
        .route(
            "/{doctor_id}/schedule/overrides/{date}",
            delete(handlers::delete_override),
        )
        .route("/{doctor_id}/slots", get(handlers::get_available_slots))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
