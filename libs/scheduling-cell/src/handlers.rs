// libs/scheduling-cell/src/handlers.rs
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
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateBookingRequest, SchedulingError, DEFAULT_DURATION_MINUTES};
use crate::services::booking::BookingService;
use crate::services::timeslot::parse_time_label;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
    pub time_label: String,
    pub duration_minutes: Option<i32>,
}

fn map_scheduling_error(err: SchedulingError) -> AppError {
    match err {
        SchedulingError::Validation(msg) => AppError::BadRequest(msg),
        SchedulingError::SlotUnavailable => {
            AppError::Conflict("Requested slot is not available".to_string())
        }
        SchedulingError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        SchedulingError::CustomerNotFound => AppError::NotFound("Customer not found".to_string()),
        SchedulingError::Database(msg) => AppError::Internal(msg),
    }
}

#[axum::debug_handler]
pub async fn create_booking(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // Customers book for themselves; team members can book for anyone.
    let is_own_booking = request.customer_id.to_string() == user.id;
    if !is_own_booking && !user.is_team_member() {
        return Err(AppError::Forbidden(
            "Not authorized to book for this customer".to_string(),
        ));
    }

    let booking_service = BookingService::new(&state);

    let result = booking_service
        .create_booking(request, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": result.appointment,
        "assigned_technician": result.assigned_technician,
        "message": result.message
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = BookingService::new(&state);

    let appointment = booking_service
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_scheduling_error)?;

    let is_customer = appointment.customer_id.to_string() == user.id;
    let is_assigned_technician = appointment
        .technician_id
        .map(|id| id.to_string() == user.id)
        .unwrap_or(false);

    if !is_customer && !is_assigned_technician && !user.is_team_member() {
        return Err(AppError::Forbidden(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!(appointment)))
}

/// Dispatch view: the full non-cancelled schedule for one day.
#[axum::debug_handler]
pub async fn get_day_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(date): Path<NaiveDate>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_team_member() {
        return Err(AppError::Forbidden(
            "Day schedule is restricted to team members".to_string(),
        ));
    }

    let token = auth.token();
    let booking_service = BookingService::new(&state);

    let appointments = booking_service
        .get_day_schedule(date, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "date": date,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

/// Pre-booking probe used by the portal's booking form.
#[axum::debug_handler]
pub async fn check_availability(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<AvailabilityQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let start_minutes = parse_time_label(&params.time_label)
        .resolve()
        .filter(|m| (0..24 * 60).contains(m))
        .ok_or_else(|| {
            AppError::BadRequest(format!("Unrecognized time '{}'", params.time_label))
        })?;

    let duration = params.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
    if duration <= 0 {
        return Err(AppError::BadRequest("Duration must be positive".to_string()));
    }

    let booking_service = BookingService::new(&state);

    let availability = booking_service
        .check_slot(params.date, start_minutes, duration, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!(availability)))
}
