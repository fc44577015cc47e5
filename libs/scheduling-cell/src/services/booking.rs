// libs/scheduling-cell/src/services/booking.rs
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentStatus, BookingResult, CreateBookingRequest, SchedulingError,
    SlotAvailability, DEFAULT_DURATION_MINUTES,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::matching::TechnicianMatchingService;
use crate::services::notify::{NotificationService, TemplateKind};
use crate::services::timeslot::{minutes_to_time_string, parse_time_label};

pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    conflict_service: ConflictDetectionService,
    matching_service: TechnicianMatchingService,
    notification_service: NotificationService,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            conflict_service: ConflictDetectionService::new(Arc::clone(&supabase)),
            matching_service: TechnicianMatchingService::new(Arc::clone(&supabase)),
            notification_service: NotificationService::new(config),
            supabase,
        }
    }

    /// Create a booking: validate, normalize the requested time, check slot
    /// saturation, pick a technician, insert, then notify best-effort.
    ///
    /// The insert relies on the database's unique index over
    /// (technician_id, scheduled_date, scheduled_time_start): two requests
    /// racing for the last open slot both pass the read-side checks, but only
    /// one insert commits - the loser sees 409 and gets SlotUnavailable.
    pub async fn create_booking(
        &self,
        request: CreateBookingRequest,
        auth_token: &str,
    ) -> Result<BookingResult, SchedulingError> {
        info!(
            "Booking request for customer {} on {} at '{}'",
            request.customer_id, request.scheduled_date, request.time_label
        );

        // Step 1: validate required fields.
        self.validate_request(&request)?;

        // Step 2: normalize the display label to minutes since midnight.
        let start_minutes = parse_time_label(&request.time_label)
            .resolve()
            .filter(|m| (0..24 * 60).contains(m))
            .ok_or_else(|| {
                SchedulingError::Validation(format!(
                    "Unrecognized time '{}'",
                    request.time_label
                ))
            })?;

        let duration_minutes = request
            .duration_minutes
            .unwrap_or(DEFAULT_DURATION_MINUTES);

        self.verify_customer_exists(request.customer_id, auth_token)
            .await?;

        // Step 3: self-conflict check across the whole day, before any
        // technician filter. The slot is saturated when every eligible
        // technician's worth of capacity is already taken; a tenant with no
        // technicians still gets one unassigned booking per slot.
        let availability = self
            .check_slot(request.scheduled_date, start_minutes, duration_minutes, auth_token)
            .await?;

        if !availability.available {
            warn!(
                "Slot saturated on {} at {} minutes ({} overlapping, {} technicians)",
                request.scheduled_date,
                start_minutes,
                availability.overlapping_bookings,
                availability.eligible_technicians
            );
            return Err(SchedulingError::SlotUnavailable);
        }

        // Step 4: technician assignment, first-free-wins.
        let assigned = self
            .matching_service
            .assign_technician(
                request.scheduled_date,
                start_minutes,
                duration_minutes,
                auth_token,
            )
            .await?;

        // Step 5: persist. A 409 here is the race loser's path.
        let appointment = self
            .insert_appointment(
                &request,
                start_minutes,
                duration_minutes,
                assigned.as_ref().map(|t| t.id),
                auth_token,
            )
            .await?;

        // Step 6: best-effort confirmation; failures are logged inside.
        let template = if assigned.is_some() {
            TemplateKind::BookingConfirmed
        } else {
            TemplateKind::BookingUnassigned
        };
        self.notification_service
            .send_booking_notification(request.customer_id, template, &appointment)
            .await;

        let message = match &assigned {
            Some(technician) => format!(
                "Appointment booked with {} for {} at {}",
                technician.full_name(),
                appointment.scheduled_date,
                appointment.scheduled_time_start
            ),
            None => format!(
                "Appointment created for {} at {}; a technician will be assigned by dispatch",
                appointment.scheduled_date, appointment.scheduled_time_start
            ),
        };

        info!(
            "Appointment {} created ({})",
            appointment.id,
            if assigned.is_some() { "assigned" } else { "unassigned" }
        );

        Ok(BookingResult {
            appointment,
            assigned_technician: assigned,
            message,
        })
    }

    /// Availability probe used by the booking form and by the orchestrator's
    /// own self-conflict check.
    pub async fn check_slot(
        &self,
        date: chrono::NaiveDate,
        start_minutes: i32,
        duration_minutes: i32,
        auth_token: &str,
    ) -> Result<SlotAvailability, SchedulingError> {
        let overlapping = self
            .conflict_service
            .count_overlapping(date, start_minutes, duration_minutes, auth_token)
            .await?;

        let eligible = self
            .matching_service
            .eligible_candidates(auth_token)
            .await?
            .len();

        let capacity = eligible.max(1);

        Ok(SlotAvailability {
            scheduled_date: date,
            start_minutes,
            available: overlapping < capacity,
            eligible_technicians: eligible,
            overlapping_bookings: overlapping,
        })
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let value = result.into_iter().next().ok_or(SchedulingError::NotFound)?;

        serde_json::from_value(value)
            .map_err(|e| SchedulingError::Database(format!("Failed to parse appointment: {}", e)))
    }

    pub async fn get_day_schedule(
        &self,
        date: chrono::NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.conflict_service
            .get_day_bookings(date, None, auth_token)
            .await
    }

    fn validate_request(&self, request: &CreateBookingRequest) -> Result<(), SchedulingError> {
        if request.time_label.trim().is_empty() {
            return Err(SchedulingError::Validation(
                "Requested time is required".to_string(),
            ));
        }
        if request.service_type.trim().is_empty() {
            return Err(SchedulingError::Validation(
                "Service type is required".to_string(),
            ));
        }
        if let Some(duration) = request.duration_minutes {
            if duration <= 0 {
                return Err(SchedulingError::Validation(
                    "Duration must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    async fn verify_customer_exists(
        &self,
        customer_id: Uuid,
        auth_token: &str,
    ) -> Result<(), SchedulingError> {
        let path = format!("/rest/v1/customers?id=eq.{}&select=id", customer_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(SchedulingError::CustomerNotFound);
        }
        Ok(())
    }

    async fn insert_appointment(
        &self,
        request: &CreateBookingRequest,
        start_minutes: i32,
        duration_minutes: i32,
        technician_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Appointment, SchedulingError> {
        let now = chrono::Utc::now();

        let appointment_data = json!({
            "customer_id": request.customer_id,
            "technician_id": technician_id,
            "scheduled_date": request.scheduled_date,
            "scheduled_time_start": minutes_to_time_string(start_minutes),
            "estimated_duration_minutes": duration_minutes,
            "status": AppointmentStatus::Scheduled.to_string(),
            "service_type": request.service_type,
            "device_id": request.device_id,
            "notes": request.notes,
            "customer_can_track": false,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
                Some(headers),
            )
            .await?;

        let value = result.into_iter().next().ok_or_else(|| {
            SchedulingError::Database("Insert returned no representation".to_string())
        })?;

        serde_json::from_value(value).map_err(|e| {
            SchedulingError::Database(format!("Failed to parse created appointment: {}", e))
        })
    }
}
