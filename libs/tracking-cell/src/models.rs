// libs/tracking-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Fixed average-speed policy used to derive ETAs from straight-line distance.
pub const AVERAGE_SPEED_KMH: f64 = 50.0;

// ==============================================================================
// LIVE LOCATION MODELS
// ==============================================================================

/// At most one live row per technician; every report upserts it.
/// A stale or absent row means "location unavailable", never "at origin".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicianCurrentLocation {
    pub technician_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub address: Option<String>,
    pub battery_level: Option<i32>,
    pub is_active: bool,
    pub last_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPositionRequest {
    /// Admin-only override for reporting on behalf of another technician
    /// (e.g. a shared field tablet). Technicians report as themselves.
    pub technician_id: Option<Uuid>,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub address: Option<String>,
    pub battery_level: Option<i32>,
    /// Device-side capture time; reports older than the stored row are
    /// discarded so delayed delivery cannot regress a live ETA.
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionAck {
    pub technician_id: Uuid,
    pub accepted: bool,
    pub last_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetConsentRequest {
    pub enabled: bool,
}

/// The composed live view returned to a consenting customer or a team member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveView {
    pub appointment_id: Uuid,
    pub technician_name: String,
    pub technician_phone: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub battery_level: Option<i32>,
    pub last_updated_at: DateTime<Utc>,
    // ETA block, present only when the customer has coordinates.
    pub distance_meters: Option<f64>,
    pub travel_distance_km: Option<f64>,
    pub estimated_travel_minutes: Option<i64>,
    pub estimated_arrival_at: Option<DateTime<Utc>>,
}

/// Defined empty results are not errors: a scheduled appointment or an
/// off-shift technician yields a reason, not a 4xx.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LiveViewResponse {
    Available { view: LiveView },
    NotAvailableForStatus { status: String },
    LocationUnavailable,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Not authorized to view this appointment's tracking data")]
    Forbidden,

    #[error("Appointment is {0}; tracking consent can no longer change")]
    ConsentLocked(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<shared_database::DatabaseError> for TrackingError {
    fn from(err: shared_database::DatabaseError) -> Self {
        match err {
            shared_database::DatabaseError::NotFound(_) => TrackingError::AppointmentNotFound,
            other => TrackingError::Database(other.to_string()),
        }
    }
}
