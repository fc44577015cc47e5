// libs/tracking-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{ReportPositionRequest, SetConsentRequest, TrackingError};
use crate::services::location::LiveLocationService;

fn map_tracking_error(err: TrackingError) -> AppError {
    match err {
        TrackingError::AppointmentNotFound => {
            AppError::NotFound("Appointment not found".to_string())
        }
        TrackingError::Forbidden => AppError::Forbidden(
            "Not authorized to view this appointment's tracking data".to_string(),
        ),
        TrackingError::ConsentLocked(status) => AppError::BadRequest(format!(
            "Appointment is {}; tracking consent can no longer change",
            status
        )),
        TrackingError::Database(msg) => AppError::Internal(msg),
    }
}

/// Position reports come from the technician's own device; admins may report
/// on behalf of a technician (e.g. a shared field tablet).
#[axum::debug_handler]
pub async fn report_position(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ReportPositionRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_technician() && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only technicians may report positions".to_string(),
        ));
    }

    let technician_id = match request.technician_id {
        Some(id) if user.is_admin() || id.to_string() == user.id => id,
        Some(_) => {
            return Err(AppError::Forbidden(
                "Only admins may report for another technician".to_string(),
            ));
        }
        None => Uuid::parse_str(&user.id)
            .map_err(|_| AppError::BadRequest("Invalid technician ID".to_string()))?,
    };

    let token = auth.token();
    let location_service = LiveLocationService::new(&state);

    let ack = location_service
        .report_position(technician_id, request, token)
        .await
        .map_err(map_tracking_error)?;

    Ok(Json(json!(ack)))
}

#[axum::debug_handler]
pub async fn get_live_view(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let location_service = LiveLocationService::new(&state);

    let response = location_service
        .get_live_view(appointment_id, &user, token)
        .await
        .map_err(map_tracking_error)?;

    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn set_tracking_consent(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SetConsentRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_team_member() {
        return Err(AppError::Forbidden(
            "Tracking consent is managed by team members".to_string(),
        ));
    }

    let token = auth.token();
    let location_service = LiveLocationService::new(&state);

    let appointment = location_service
        .set_tracking_consent(appointment_id, request.enabled, token)
        .await
        .map_err(map_tracking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment_id": appointment.id,
        "customer_can_track": appointment.customer_can_track
    })))
}
