use std::sync::Arc;

use axum::extract::{Extension, Path, State};
use axum::Json;
use axum_extra::TypedHeader;
use chrono::{Duration, Utc};
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};
use tracking_cell::handlers;
use tracking_cell::models::{ReportPositionRequest, SetConsentRequest};

fn test_state(mock_server: &MockServer) -> Arc<AppConfig> {
    TestConfig::with_supabase_url(&mock_server.uri()).to_arc()
}

fn user_extension(role: &str, id: &str) -> Extension<User> {
    Extension(User {
        id: id.to_string(),
        email: Some(format!("{}@example.com", role)),
        role: Some(role.to_string()),
        metadata: None,
        created_at: Some(Utc::now()),
    })
}

fn auth_header() -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer("test-token").unwrap())
}

fn position_request(lat: f64, lon: f64) -> ReportPositionRequest {
    ReportPositionRequest {
        technician_id: None,
        latitude: lat,
        longitude: lon,
        accuracy: Some(5.0),
        heading: Some(180.0),
        speed: Some(13.4),
        address: Some("En route".to_string()),
        battery_level: Some(82),
        recorded_at: None,
    }
}

fn trackable_appointment(
    appointment_id: &Uuid,
    customer_id: &Uuid,
    technician_id: Option<&Uuid>,
    status: &str,
    can_track: bool,
) -> serde_json::Value {
    let tech = technician_id.map(Uuid::to_string);
    let mut appointment = MockSupabaseResponses::appointment_response(
        &appointment_id.to_string(),
        &customer_id.to_string(),
        tech.as_deref(),
        "2026-09-14",
        "10:00:00",
        status,
    );
    appointment["customer_can_track"] = json!(can_track);
    appointment
}

async fn mock_get_appointment(mock_server: &MockServer, id: &Uuid, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([body])))
        .mount(mock_server)
        .await;
}

async fn mock_current_location(
    mock_server: &MockServer,
    technician_id: &Uuid,
    rows: serde_json::Value,
) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/technician_current_locations"))
        .and(query_param("technician_id", format!("eq.{}", technician_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(mock_server)
        .await;
}

async fn mock_location_upsert(mock_server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/rest/v1/technician_current_locations"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{}])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn technician_position_report_is_accepted() {
    let mock_server = MockServer::start().await;
    let technician_id = Uuid::new_v4();

    mock_location_upsert(&mock_server).await;

    let result = handlers::report_position(
        State(test_state(&mock_server)),
        auth_header(),
        user_extension("technician", &technician_id.to_string()),
        Json(position_request(47.24, -122.44)),
    )
    .await
    .expect("report should succeed");

    let body = result.0;
    assert_eq!(body["accepted"], json!(true));
    assert_eq!(body["technician_id"], json!(technician_id.to_string()));
}

#[tokio::test]
async fn repeated_identical_report_is_still_accepted() {
    let mock_server = MockServer::start().await;
    let technician_id = Uuid::new_v4();

    mock_location_upsert(&mock_server).await;

    let state = test_state(&mock_server);
    for _ in 0..2 {
        let result = handlers::report_position(
            State(state.clone()),
            auth_header(),
            user_extension("technician", &technician_id.to_string()),
            Json(position_request(47.24, -122.44)),
        )
        .await
        .expect("re-report should succeed");
        assert_eq!(result.0["accepted"], json!(true));
    }
}

#[tokio::test]
async fn stale_report_is_discarded() {
    // The stored row is newer than the report's capture time.
    let mock_server = MockServer::start().await;
    let technician_id = Uuid::new_v4();
    let stored_at = Utc::now();
    let captured_at = stored_at - Duration::minutes(10);

    mock_current_location(
        &mock_server,
        &technician_id,
        json!([MockSupabaseResponses::technician_location_response(
            &technician_id.to_string(),
            47.24,
            -122.44,
            true,
            &stored_at.to_rfc3339(),
        )]),
    )
    .await;

    let mut request = position_request(47.20, -122.40);
    request.recorded_at = Some(captured_at);

    let result = handlers::report_position(
        State(test_state(&mock_server)),
        auth_header(),
        user_extension("technician", &technician_id.to_string()),
        Json(request),
    )
    .await
    .expect("discard is not an error");

    assert_eq!(result.0["accepted"], json!(false));
}

#[tokio::test]
async fn admin_reports_on_behalf_of_technician() {
    let mock_server = MockServer::start().await;
    let technician_id = Uuid::new_v4();

    mock_location_upsert(&mock_server).await;

    let mut request = position_request(47.24, -122.44);
    request.technician_id = Some(technician_id);

    let result = handlers::report_position(
        State(test_state(&mock_server)),
        auth_header(),
        user_extension("admin", &Uuid::new_v4().to_string()),
        Json(request),
    )
    .await
    .expect("admin report should succeed");

    assert_eq!(
        result.0["technician_id"],
        json!(technician_id.to_string())
    );
}

#[tokio::test]
async fn technician_cannot_report_for_someone_else() {
    let mock_server = MockServer::start().await;

    let mut request = position_request(47.24, -122.44);
    request.technician_id = Some(Uuid::new_v4());

    let result = handlers::report_position(
        State(test_state(&mock_server)),
        auth_header(),
        user_extension("technician", &Uuid::new_v4().to_string()),
        Json(request),
    )
    .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn customer_cannot_report_positions() {
    let mock_server = MockServer::start().await;

    let result = handlers::report_position(
        State(test_state(&mock_server)),
        auth_header(),
        user_extension("customer", &Uuid::new_v4().to_string()),
        Json(position_request(47.24, -122.44)),
    )
    .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn consenting_customer_gets_live_view_with_eta() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let customer_id = Uuid::new_v4();
    let technician_id = Uuid::new_v4();

    mock_get_appointment(
        &mock_server,
        &appointment_id,
        trackable_appointment(
            &appointment_id,
            &customer_id,
            Some(&technician_id),
            "traveling",
            true,
        ),
    )
    .await;
    mock_current_location(
        &mock_server,
        &technician_id,
        json!([MockSupabaseResponses::technician_location_response(
            &technician_id.to_string(),
            47.24,
            -122.44,
            true,
            &Utc::now().to_rfc3339(),
        )]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/team_members"))
        .and(query_param("id", format!("eq.{}", technician_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::team_member_response(
                &technician_id.to_string(),
                "technician",
                true
            )
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/customers"))
        .and(query_param("id", format!("eq.{}", customer_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::customer_response(
                &customer_id.to_string(),
                Some(47.25),
                Some(-122.45)
            )
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{}])))
        .mount(&mock_server)
        .await;

    let result = handlers::get_live_view(
        State(test_state(&mock_server)),
        Path(appointment_id),
        auth_header(),
        user_extension("customer", &customer_id.to_string()),
    )
    .await
    .expect("live view should be available");

    let body = result.0;
    assert_eq!(body["state"], json!("available"));

    let view = &body["view"];
    assert_eq!(view["latitude"], json!(47.24));
    assert_eq!(view["technician_name"], json!("Test Technician"));

    // (47.24, -122.44) to (47.25, -122.45) is roughly 1.35 km, which at
    // 50 km/h rounds to a 2 minute ETA.
    let meters = view["distance_meters"].as_f64().unwrap();
    assert!((1200.0..1500.0).contains(&meters), "got {} m", meters);
    assert_eq!(view["estimated_travel_minutes"], json!(2));
    assert_eq!(view["travel_distance_km"], json!(1.3));
    assert!(view["estimated_arrival_at"].is_string());
}

#[tokio::test]
async fn live_view_hidden_before_technician_departs() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let customer_id = Uuid::new_v4();
    let technician_id = Uuid::new_v4();

    mock_get_appointment(
        &mock_server,
        &appointment_id,
        trackable_appointment(
            &appointment_id,
            &customer_id,
            Some(&technician_id),
            "scheduled",
            true,
        ),
    )
    .await;

    let result = handlers::get_live_view(
        State(test_state(&mock_server)),
        Path(appointment_id),
        auth_header(),
        user_extension("customer", &customer_id.to_string()),
    )
    .await
    .expect("gated view is not an error");

    let body = result.0;
    assert_eq!(body["state"], json!("not_available_for_status"));
    assert_eq!(body["status"], json!("scheduled"));
}

#[tokio::test]
async fn consent_gate_beats_status_gate() {
    // Tracking disabled on the appointment: even an in-progress job is
    // invisible to the customer.
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let customer_id = Uuid::new_v4();
    let technician_id = Uuid::new_v4();

    mock_get_appointment(
        &mock_server,
        &appointment_id,
        trackable_appointment(
            &appointment_id,
            &customer_id,
            Some(&technician_id),
            "in_progress",
            false,
        ),
    )
    .await;

    let result = handlers::get_live_view(
        State(test_state(&mock_server)),
        Path(appointment_id),
        auth_header(),
        user_extension("customer", &customer_id.to_string()),
    )
    .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn stranger_cannot_see_live_view() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let customer_id = Uuid::new_v4();

    mock_get_appointment(
        &mock_server,
        &appointment_id,
        trackable_appointment(&appointment_id, &customer_id, None, "traveling", true),
    )
    .await;

    let result = handlers::get_live_view(
        State(test_state(&mock_server)),
        Path(appointment_id),
        auth_header(),
        user_extension("customer", &Uuid::new_v4().to_string()),
    )
    .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn unassigned_appointment_has_no_location() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let customer_id = Uuid::new_v4();

    mock_get_appointment(
        &mock_server,
        &appointment_id,
        trackable_appointment(&appointment_id, &customer_id, None, "traveling", true),
    )
    .await;

    let result = handlers::get_live_view(
        State(test_state(&mock_server)),
        Path(appointment_id),
        auth_header(),
        user_extension("customer", &customer_id.to_string()),
    )
    .await
    .expect("unassigned appointment is a defined empty result");

    assert_eq!(result.0["state"], json!("location_unavailable"));
}

#[tokio::test]
async fn off_shift_technician_has_no_location() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let customer_id = Uuid::new_v4();
    let technician_id = Uuid::new_v4();

    mock_get_appointment(
        &mock_server,
        &appointment_id,
        trackable_appointment(
            &appointment_id,
            &customer_id,
            Some(&technician_id),
            "traveling",
            true,
        ),
    )
    .await;
    mock_current_location(
        &mock_server,
        &technician_id,
        json!([MockSupabaseResponses::technician_location_response(
            &technician_id.to_string(),
            47.24,
            -122.44,
            false,
            &Utc::now().to_rfc3339(),
        )]),
    )
    .await;

    let result = handlers::get_live_view(
        State(test_state(&mock_server)),
        Path(appointment_id),
        auth_header(),
        user_extension("customer", &customer_id.to_string()),
    )
    .await
    .expect("inactive row is a defined empty result");

    assert_eq!(result.0["state"], json!("location_unavailable"));
}

#[tokio::test]
async fn dispatcher_enables_tracking_consent() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let customer_id = Uuid::new_v4();

    mock_get_appointment(
        &mock_server,
        &appointment_id,
        trackable_appointment(&appointment_id, &customer_id, None, "scheduled", false),
    )
    .await;
    let updated = trackable_appointment(&appointment_id, &customer_id, None, "scheduled", true);
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([updated])))
        .mount(&mock_server)
        .await;

    let result = handlers::set_tracking_consent(
        State(test_state(&mock_server)),
        Path(appointment_id),
        auth_header(),
        user_extension("dispatcher", &Uuid::new_v4().to_string()),
        Json(SetConsentRequest { enabled: true }),
    )
    .await
    .expect("consent update should succeed");

    let body = result.0;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["customer_can_track"], json!(true));
}

#[tokio::test]
async fn consent_is_locked_once_appointment_completes() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let customer_id = Uuid::new_v4();

    mock_get_appointment(
        &mock_server,
        &appointment_id,
        trackable_appointment(&appointment_id, &customer_id, None, "completed", false),
    )
    .await;

    let result = handlers::set_tracking_consent(
        State(test_state(&mock_server)),
        Path(appointment_id),
        auth_header(),
        user_extension("dispatcher", &Uuid::new_v4().to_string()),
        Json(SetConsentRequest { enabled: true }),
    )
    .await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn customer_cannot_toggle_consent() {
    let mock_server = MockServer::start().await;

    let result = handlers::set_tracking_consent(
        State(test_state(&mock_server)),
        Path(Uuid::new_v4()),
        auth_header(),
        user_extension("customer", &Uuid::new_v4().to_string()),
        Json(SetConsentRequest { enabled: true }),
    )
    .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}
