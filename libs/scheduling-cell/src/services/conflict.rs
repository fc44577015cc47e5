// libs/scheduling-cell/src/services/conflict.rs
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use chrono::NaiveDate;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, SchedulingError};

/// A booked interval on a single calendar day, in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingInterval {
    pub start_minutes: i32,
    pub duration_minutes: i32,
}

impl BookingInterval {
    pub fn new(start_minutes: i32, duration_minutes: i32) -> Self {
        Self {
            start_minutes,
            duration_minutes,
        }
    }
}

impl From<&Appointment> for BookingInterval {
    fn from(appointment: &Appointment) -> Self {
        Self {
            start_minutes: appointment.start_minutes(),
            duration_minutes: appointment.duration_minutes(),
        }
    }
}

/// Half-open interval overlap: `[s1, s1+d1)` and `[s2, s2+d2)` conflict iff
/// `s1 < s2+d2 && s2 < s1+d1`. Touching endpoints never conflict.
pub fn intervals_overlap(s1: i32, d1: i32, s2: i32, d2: i32) -> bool {
    s1 < s2 + d2 && s2 < s1 + d1
}

/// True when the candidate slot overlaps any existing booking. Callers must
/// pre-filter `existing` to the same date, same resource, and non-cancelled
/// status; a missing stored duration has already defaulted to 60 minutes.
pub fn has_conflict(
    existing: &[BookingInterval],
    candidate_start_minutes: i32,
    candidate_duration_minutes: i32,
) -> bool {
    existing.iter().any(|booked| {
        intervals_overlap(
            booked.start_minutes,
            booked.duration_minutes,
            candidate_start_minutes,
            candidate_duration_minutes,
        )
    })
}

pub struct ConflictDetectionService {
    supabase: Arc<SupabaseClient>,
}

impl ConflictDetectionService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Fetch the non-cancelled bookings for a date, optionally filtered to a
    /// single technician. Result ordering is stable (start time, then id) so
    /// downstream assignment decisions are reproducible.
    pub async fn get_day_bookings(
        &self,
        date: NaiveDate,
        technician_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut query_parts = vec![
            format!("scheduled_date=eq.{}", date),
            "status=neq.cancelled".to_string(),
        ];

        if let Some(technician) = technician_id {
            query_parts.push(format!("technician_id=eq.{}", technician));
        }

        let path = format!(
            "/rest/v1/appointments?{}&order=scheduled_time_start.asc,id.asc",
            query_parts.join("&")
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let appointments: Vec<Appointment> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| {
                SchedulingError::Database(format!("Failed to parse appointments: {}", e))
            })?;

        Ok(appointments)
    }

    /// Count how many of the day's bookings overlap the candidate slot,
    /// regardless of which technician holds them.
    pub async fn count_overlapping(
        &self,
        date: NaiveDate,
        candidate_start_minutes: i32,
        candidate_duration_minutes: i32,
        auth_token: &str,
    ) -> Result<usize, SchedulingError> {
        let bookings = self.get_day_bookings(date, None, auth_token).await?;

        let overlapping = bookings
            .iter()
            .filter(|apt| {
                intervals_overlap(
                    apt.start_minutes(),
                    apt.duration_minutes(),
                    candidate_start_minutes,
                    candidate_duration_minutes,
                )
            })
            .count();

        if overlapping > 0 {
            warn!(
                "{} existing bookings overlap {} min slot at {} minutes on {}",
                overlapping, candidate_duration_minutes, candidate_start_minutes, date
            );
        } else {
            debug!(
                "No overlap for {} min slot at {} minutes on {}",
                candidate_duration_minutes, candidate_start_minutes, date
            );
        }

        Ok(overlapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_DURATION_MINUTES;

    #[test]
    fn overlap_is_symmetric() {
        let cases = [
            (600, 60, 630, 60),
            (600, 60, 540, 90),
            (600, 120, 630, 30),
        ];
        for (s1, d1, s2, d2) in cases {
            assert_eq!(
                intervals_overlap(s1, d1, s2, d2),
                intervals_overlap(s2, d2, s1, d1),
                "asymmetric result for ({s1},{d1}) vs ({s2},{d2})"
            );
            assert!(intervals_overlap(s1, d1, s2, d2));
        }
    }

    #[test]
    fn touching_endpoints_do_not_conflict() {
        // 10:00-11:00 followed by 11:00-12:00
        assert!(!intervals_overlap(600, 60, 660, 60));
        assert!(!intervals_overlap(660, 60, 600, 60));
    }

    #[test]
    fn disjoint_intervals_do_not_conflict() {
        assert!(!intervals_overlap(480, 60, 600, 60));
    }

    #[test]
    fn contained_interval_conflicts() {
        assert!(intervals_overlap(600, 120, 630, 30));
    }

    #[test]
    fn has_conflict_over_empty_set_is_false() {
        assert!(!has_conflict(&[], 600, 60));
    }

    #[test]
    fn has_conflict_finds_any_overlap() {
        let existing = vec![
            BookingInterval::new(480, 60),
            BookingInterval::new(600, 60),
        ];
        assert!(has_conflict(&existing, 630, DEFAULT_DURATION_MINUTES));
        assert!(!has_conflict(&existing, 660, DEFAULT_DURATION_MINUTES));
    }
}
