// libs/tracking-cell/src/services/location.rs
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use chrono::{Duration, Utc};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use scheduling_cell::models::{Appointment, TeamMember};

use crate::models::{
    Customer, LiveView, LiveViewResponse, PositionAck, ReportPositionRequest,
    TechnicianCurrentLocation, TrackingError, AVERAGE_SPEED_KMH,
};
use crate::services::geo::distance_meters;

pub struct LiveLocationService {
    supabase: Arc<SupabaseClient>,
}

impl LiveLocationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    /// Upsert the technician's single live row. Reports carrying a
    /// `recorded_at` older than the stored row are discarded, so delayed
    /// delivery cannot drag a live position backwards.
    pub async fn report_position(
        &self,
        technician_id: Uuid,
        request: ReportPositionRequest,
        auth_token: &str,
    ) -> Result<PositionAck, TrackingError> {
        if let Some(recorded_at) = request.recorded_at {
            if let Some(existing) = self.get_current_location(technician_id, auth_token).await? {
                if existing.last_updated_at > recorded_at {
                    info!(
                        "Discarding stale position report for technician {} ({} < {})",
                        technician_id, recorded_at, existing.last_updated_at
                    );
                    return Ok(PositionAck {
                        technician_id,
                        accepted: false,
                        last_updated_at: existing.last_updated_at,
                    });
                }
            }
        }

        let now = Utc::now();
        let row = json!({
            "technician_id": technician_id,
            "latitude": request.latitude,
            "longitude": request.longitude,
            "accuracy": request.accuracy,
            "heading": request.heading,
            "speed": request.speed,
            "address": request.address,
            "battery_level": request.battery_level,
            "is_active": true,
            "last_updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static(
                "resolution=merge-duplicates,return=representation",
            ),
        );

        let _result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/technician_current_locations",
                Some(auth_token),
                Some(row),
                Some(headers),
            )
            .await?;

        debug!(
            "Position updated for technician {} at ({}, {})",
            technician_id, request.latitude, request.longitude
        );

        Ok(PositionAck {
            technician_id,
            accepted: true,
            last_updated_at: now,
        })
    }

    /// Compose the live view for an appointment, applying the consent and
    /// status gates, and refresh the appointment's denormalized tracking
    /// fields as a side effect of the read.
    pub async fn get_live_view(
        &self,
        appointment_id: Uuid,
        requester: &User,
        auth_token: &str,
    ) -> Result<LiveViewResponse, TrackingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        // Authorization: the customer needs per-appointment consent; team
        // members always pass; everyone else is rejected outright.
        let is_customer = appointment.customer_id.to_string() == requester.id;
        if is_customer {
            if !appointment.customer_can_track {
                return Err(TrackingError::Forbidden);
            }
        } else if !requester.is_team_member() {
            return Err(TrackingError::Forbidden);
        }

        if !appointment.status.exposes_location() {
            return Ok(LiveViewResponse::NotAvailableForStatus {
                status: appointment.status.to_string(),
            });
        }

        let Some(technician_id) = appointment.technician_id else {
            return Ok(LiveViewResponse::LocationUnavailable);
        };

        let location = match self.get_current_location(technician_id, auth_token).await? {
            Some(location) if location.is_active => location,
            _ => return Ok(LiveViewResponse::LocationUnavailable),
        };

        let technician = self.get_team_member(technician_id, auth_token).await?;
        let customer = self
            .get_customer(appointment.customer_id, auth_token)
            .await?;

        // ETA only when the customer's coordinates are on file.
        let (distance, eta_minutes) = match customer
            .as_ref()
            .and_then(|c| c.latitude.zip(c.longitude))
        {
            Some((customer_lat, customer_lon)) => {
                let meters = distance_meters(
                    location.latitude,
                    location.longitude,
                    customer_lat,
                    customer_lon,
                );
                let minutes = (meters / 1000.0 / AVERAGE_SPEED_KMH * 60.0).round() as i64;
                (Some(meters), Some(minutes))
            }
            None => (None, None),
        };

        let now = Utc::now();
        let travel_distance_km = distance.map(|m| (m / 1000.0 * 10.0).round() / 10.0);
        let estimated_arrival_at = eta_minutes.map(|minutes| now + Duration::minutes(minutes));

        self.write_back_tracking_fields(
            appointment_id,
            &location,
            travel_distance_km,
            estimated_arrival_at,
            auth_token,
        )
        .await;

        let view = LiveView {
            appointment_id,
            technician_name: technician
                .as_ref()
                .map(TeamMember::full_name)
                .unwrap_or_else(|| "Technician".to_string()),
            technician_phone: technician.and_then(|t| t.phone),
            latitude: location.latitude,
            longitude: location.longitude,
            address: location.address,
            heading: location.heading,
            speed: location.speed,
            battery_level: location.battery_level,
            last_updated_at: location.last_updated_at,
            distance_meters: distance,
            travel_distance_km,
            estimated_travel_minutes: eta_minutes,
            estimated_arrival_at,
        };

        Ok(LiveViewResponse::Available { view })
    }

    /// Flip the per-appointment tracking consent flag. Role enforcement is
    /// done by the handler; completed and cancelled appointments are locked.
    pub async fn set_tracking_consent(
        &self,
        appointment_id: Uuid,
        enabled: bool,
        auth_token: &str,
    ) -> Result<Appointment, TrackingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        if appointment.status.is_terminal() {
            return Err(TrackingError::ConsentLocked(appointment.status.to_string()));
        }

        let update = json!({
            "customer_can_track": enabled,
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(update), Some(headers))
            .await?;

        let value = result
            .into_iter()
            .next()
            .ok_or(TrackingError::AppointmentNotFound)?;

        serde_json::from_value(value)
            .map_err(|e| TrackingError::Database(format!("Failed to parse appointment: {}", e)))
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, TrackingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        let value = result
            .into_iter()
            .next()
            .ok_or(TrackingError::AppointmentNotFound)?;

        serde_json::from_value(value)
            .map_err(|e| TrackingError::Database(format!("Failed to parse appointment: {}", e)))
    }

    async fn get_current_location(
        &self,
        technician_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<TechnicianCurrentLocation>, TrackingError> {
        let path = format!(
            "/rest/v1/technician_current_locations?technician_id=eq.{}",
            technician_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        match result.into_iter().next() {
            Some(value) => {
                let location = serde_json::from_value(value).map_err(|e| {
                    TrackingError::Database(format!("Failed to parse location: {}", e))
                })?;
                Ok(Some(location))
            }
            None => Ok(None),
        }
    }

    async fn get_team_member(
        &self,
        technician_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<TeamMember>, TrackingError> {
        let path = format!("/rest/v1/team_members?id=eq.{}", technician_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        match result.into_iter().next() {
            Some(value) => {
                let member = serde_json::from_value(value).map_err(|e| {
                    TrackingError::Database(format!("Failed to parse team member: {}", e))
                })?;
                Ok(Some(member))
            }
            None => Ok(None),
        }
    }

    async fn get_customer(
        &self,
        customer_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Customer>, TrackingError> {
        let path = format!("/rest/v1/customers?id=eq.{}", customer_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        match result.into_iter().next() {
            Some(value) => {
                let customer = serde_json::from_value(value).map_err(|e| {
                    TrackingError::Database(format!("Failed to parse customer: {}", e))
                })?;
                Ok(Some(customer))
            }
            None => Ok(None),
        }
    }

    /// Cache-refresh side effect of the live-view read. Failures are logged
    /// and ignored - the view already holds the fresh values.
    async fn write_back_tracking_fields(
        &self,
        appointment_id: Uuid,
        location: &TechnicianCurrentLocation,
        travel_distance_km: Option<f64>,
        estimated_arrival_at: Option<chrono::DateTime<Utc>>,
        auth_token: &str,
    ) {
        let update = json!({
            "technician_latitude": location.latitude,
            "technician_longitude": location.longitude,
            "technician_last_location_at": location.last_updated_at.to_rfc3339(),
            "travel_distance_km": travel_distance_km,
            "estimated_arrival_at": estimated_arrival_at.map(|t| t.to_rfc3339()),
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );
        let result: Result<Vec<Value>, _> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(update), Some(headers))
            .await;

        if let Err(e) = result {
            warn!(
                "Failed to refresh tracking fields on appointment {}: {}",
                appointment_id, e
            );
        }
    }
}
