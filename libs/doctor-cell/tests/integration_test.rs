use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::router::doctor_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

async fn create_test_app(config: AppConfig) -> Router {
    doctor_routes(Arc::new(config))
}

fn future_wednesday() -> NaiveDate {
    let mut date = Utc::now().date_naive() + Duration::days(7);
    while date.weekday() != Weekday::Wed {
        date += Duration::days(1);
    }
    date
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body is not valid JSON")
}

/// Mocks the full slot-generation read path: doctor row, weekly template,
/// overrides, and scheduled appointments.
async fn setup_schedule_mocks(
    mock_server: &MockServer,
    doctor_id: &str,
    overrides: Value,
    appointments: Value,
) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(doctor_id, 30)
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_weekly_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::weekly_rule_response(doctor_id, "wednesday", "09:00", "17:00")
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedule_overrides"))
        .respond_with(ResponseTemplate::new(200).set_body_json(overrides))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(appointments))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_get_available_slots_full_day() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor_id = Uuid::new_v4();

    setup_schedule_mocks(&mock_server, &doctor_id.to_string(), json!([]), json!([])).await;

    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);

    let app = create_test_app(config.to_app_config()).await;
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/{}/slots?date={}", doctor_id, future_wednesday()))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let slots = body["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 16);
    assert_eq!(slots[0], "09:00");
    assert_eq!(slots[15], "16:30");
}

#[tokio::test]
async fn test_get_available_slots_excludes_booked_interval() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor_id = Uuid::new_v4();

    setup_schedule_mocks(
        &mock_server,
        &doctor_id.to_string(),
        json!([]),
        json!([{ "start_time": "09:00", "end_time": "09:30" }]),
    )
    .await;

    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);

    let app = create_test_app(config.to_app_config()).await;
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/{}/slots?date={}", doctor_id, future_wednesday()))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let slots = body["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 15);
    assert!(!slots.iter().any(|slot| slot == "09:00"));
    assert_eq!(slots[0], "09:30");
}

#[tokio::test]
async fn test_get_available_slots_not_working_override() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor_id = Uuid::new_v4();
    let date = future_wednesday();

    setup_schedule_mocks(
        &mock_server,
        &doctor_id.to_string(),
        json!([MockSupabaseResponses::override_response(
            &doctor_id.to_string(),
            &date.to_string(),
            false,
            None,
            None
        )]),
        json!([]),
    )
    .await;

    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);

    let app = create_test_app(config.to_app_config()).await;
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/{}/slots?date={}", doctor_id, date))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["slots"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_set_weekly_template_rejects_inverted_range() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor_id = Uuid::new_v4();

    let doctor = TestUser {
        id: doctor_id.to_string(),
        email: "doctor@example.com".to_string(),
        role: "doctor".to_string(),
    };
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);

    let request_body = json!({
        "rules": [
            { "day_of_week": "monday", "start_time": "17:00", "end_time": "09:00" }
        ]
    });

    let app = create_test_app(config.to_app_config()).await;
    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/{}/schedule/template", doctor_id))
                .header("Authorization", format!("Bearer {}", token))
                .header("Content-Type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_set_weekly_template_forbidden_for_other_users() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor_id = Uuid::new_v4();

    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);

    let request_body = json!({
        "rules": [
            { "day_of_week": "monday", "start_time": "09:00", "end_time": "17:00" }
        ]
    });

    let app = create_test_app(config.to_app_config()).await;
    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/{}/schedule/template", doctor_id))
                .header("Authorization", format!("Bearer {}", token))
                .header("Content-Type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_upsert_override_creates_new_entry() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor_id = Uuid::new_v4();
    let date = future_wednesday();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor_id.to_string(), 30)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedule_overrides"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_schedule_overrides"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::override_response(
                &doctor_id.to_string(),
                &date.to_string(),
                false,
                None,
                None
            )
        ])))
        .mount(&mock_server)
        .await;

    let doctor = TestUser {
        id: doctor_id.to_string(),
        email: "doctor@example.com".to_string(),
        role: "doctor".to_string(),
    };
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);

    let request_body = json!({
        "date": date,
        "is_working": false,
        "start_time": null,
        "end_time": null
    });

    let app = create_test_app(config.to_app_config()).await;
    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/{}/schedule/overrides", doctor_id))
                .header("Authorization", format!("Bearer {}", token))
                .header("Content-Type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["override"]["is_working"], false);
}

#[tokio::test]
async fn test_missing_auth_header_is_unauthorized() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let doctor_id = Uuid::new_v4();

    let app = create_test_app(config.to_app_config()).await;
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/{}/slots?date={}", doctor_id, future_wednesday()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
