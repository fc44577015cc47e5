// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Policy default applied when a stored booking carries no explicit duration.
pub const DEFAULT_DURATION_MINUTES: i32 = 60;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub customer_id: Uuid,
    /// Unassigned is a valid terminal state when no technician was free.
    pub technician_id: Option<Uuid>,
    pub scheduled_date: NaiveDate,
    pub scheduled_time_start: NaiveTime,
    pub estimated_duration_minutes: Option<i32>,
    pub status: AppointmentStatus,
    pub service_type: String,
    pub device_id: Option<Uuid>,
    pub notes: Option<String>,
    /// Gates customer-side exposure of live technician location.
    pub customer_can_track: bool,
    // Denormalized tracking fields - written only by the tracking cell.
    pub technician_latitude: Option<f64>,
    pub technician_longitude: Option<f64>,
    pub technician_last_location_at: Option<DateTime<Utc>>,
    pub travel_distance_km: Option<f64>,
    pub estimated_arrival_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn duration_minutes(&self) -> i32 {
        self.estimated_duration_minutes
            .unwrap_or(DEFAULT_DURATION_MINUTES)
    }

    pub fn start_minutes(&self) -> i32 {
        (self.scheduled_time_start.hour() * 60 + self.scheduled_time_start.minute()) as i32
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Traveling,
    OnSite,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// Terminal states stop all further location updates.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// Only active field statuses expose live technician location.
    pub fn exposes_location(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Confirmed
                | AppointmentStatus::InProgress
                | AppointmentStatus::Traveling
                | AppointmentStatus::OnSite
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Traveling => write!(f, "traveling"),
            AppointmentStatus::OnSite => write!(f, "on_site"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ==============================================================================
// TEAM DIRECTORY MODELS (read-only, owned by the team-member directory)
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub is_active: bool,
}

impl TeamMember {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Technicians take jobs; admins are the fallback testers.
    pub fn can_be_assigned(&self) -> bool {
        self.is_active && matches!(self.role.as_str(), "technician" | "admin")
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub customer_id: Uuid,
    pub scheduled_date: NaiveDate,
    /// Display label ("2:00 PM") or raw 24h time ("14:00").
    pub time_label: String,
    pub service_type: String,
    pub duration_minutes: Option<i32>,
    pub device_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResult {
    pub appointment: Appointment,
    pub assigned_technician: Option<TeamMember>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotAvailability {
    pub scheduled_date: NaiveDate,
    pub start_minutes: i32,
    pub available: bool,
    pub eligible_technicians: usize,
    pub overlapping_bookings: usize,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Requested slot is not available")]
    SlotUnavailable,

    #[error("Appointment not found")]
    NotFound,

    #[error("Customer not found")]
    CustomerNotFound,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<shared_database::DatabaseError> for SchedulingError {
    fn from(err: shared_database::DatabaseError) -> Self {
        match err {
            // Unique index on (technician_id, scheduled_date, scheduled_time_start)
            // turns the check-then-act race into a 409 at insert time.
            shared_database::DatabaseError::Conflict(_) => SchedulingError::SlotUnavailable,
            shared_database::DatabaseError::NotFound(_) => SchedulingError::NotFound,
            other => SchedulingError::Database(other.to_string()),
        }
    }
}
