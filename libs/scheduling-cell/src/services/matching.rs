// libs/scheduling-cell/src/services/matching.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{SchedulingError, TeamMember};
use crate::services::conflict::{has_conflict, BookingInterval, ConflictDetectionService};
use crate::services::directory::TeamDirectoryService;

/// First candidate with no conflicting booking wins. Candidates are walked in
/// the order supplied, so callers hand them over in a fixed ordering (by id)
/// to keep assignment reproducible. `None` means "book unassigned" - it is
/// not an error.
pub fn find_available_technician<'a>(
    candidates: &'a [TeamMember],
    bookings_by_technician: &HashMap<Uuid, Vec<BookingInterval>>,
    candidate_start_minutes: i32,
    candidate_duration_minutes: i32,
) -> Option<&'a TeamMember> {
    candidates.iter().find(|technician| {
        let existing = bookings_by_technician
            .get(&technician.id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        !has_conflict(existing, candidate_start_minutes, candidate_duration_minutes)
    })
}

pub struct TechnicianMatchingService {
    directory: TeamDirectoryService,
    conflict_service: ConflictDetectionService,
}

impl TechnicianMatchingService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            directory: TeamDirectoryService::new(Arc::clone(&supabase)),
            conflict_service: ConflictDetectionService::new(supabase),
        }
    }

    /// Load the eligible candidates and the day's per-technician booking sets,
    /// then run the pure matcher over them.
    pub async fn assign_technician(
        &self,
        date: NaiveDate,
        candidate_start_minutes: i32,
        candidate_duration_minutes: i32,
        auth_token: &str,
    ) -> Result<Option<TeamMember>, SchedulingError> {
        let candidates = self.eligible_candidates(auth_token).await?;
        if candidates.is_empty() {
            info!("No assignable technicians for {}", date);
            return Ok(None);
        }

        let bookings_by_technician = self.day_bookings_by_technician(date, auth_token).await?;

        let assigned = find_available_technician(
            &candidates,
            &bookings_by_technician,
            candidate_start_minutes,
            candidate_duration_minutes,
        )
        .cloned();

        match &assigned {
            Some(technician) => debug!(
                "Assigned technician {} for {} at {} minutes",
                technician.id, date, candidate_start_minutes
            ),
            None => info!(
                "All {} technicians busy for {} at {} minutes",
                candidates.len(),
                date,
                candidate_start_minutes
            ),
        }

        Ok(assigned)
    }

    pub async fn eligible_candidates(
        &self,
        auth_token: &str,
    ) -> Result<Vec<TeamMember>, SchedulingError> {
        let members = self.directory.get_assignable_technicians(auth_token).await?;
        // The directory query already filters; re-check locally so a
        // misconfigured view cannot hand us an ineligible candidate.
        Ok(members.into_iter().filter(TeamMember::can_be_assigned).collect())
    }

    async fn day_bookings_by_technician(
        &self,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<HashMap<Uuid, Vec<BookingInterval>>, SchedulingError> {
        let bookings = self
            .conflict_service
            .get_day_bookings(date, None, auth_token)
            .await?;

        let mut by_technician: HashMap<Uuid, Vec<BookingInterval>> = HashMap::new();
        for appointment in &bookings {
            if let Some(technician_id) = appointment.technician_id {
                by_technician
                    .entry(technician_id)
                    .or_default()
                    .push(BookingInterval::from(appointment));
            }
        }

        Ok(by_technician)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn technician(id: Uuid) -> TeamMember {
        TeamMember {
            id,
            first_name: "Tech".to_string(),
            last_name: id.to_string()[..8].to_string(),
            phone: None,
            role: "technician".to_string(),
            is_active: true,
        }
    }

    #[test]
    fn empty_candidate_list_returns_none() {
        let bookings = HashMap::new();
        assert!(find_available_technician(&[], &bookings, 600, 60).is_none());
    }

    #[test]
    fn only_free_candidate_is_chosen() {
        let busy = technician(Uuid::new_v4());
        let free = technician(Uuid::new_v4());
        let mut bookings = HashMap::new();
        bookings.insert(busy.id, vec![BookingInterval::new(600, 60)]);

        let candidates = vec![busy.clone(), free.clone()];
        let chosen = find_available_technician(&candidates, &bookings, 600, 60);
        assert_eq!(chosen.map(|t| t.id), Some(free.id));
    }

    #[test]
    fn first_free_wins_is_stable() {
        let a = technician(Uuid::new_v4());
        let b = technician(Uuid::new_v4());
        let bookings = HashMap::new();

        let forward = vec![a.clone(), b.clone()];
        let reverse = vec![b.clone(), a.clone()];

        assert_eq!(
            find_available_technician(&forward, &bookings, 600, 60).map(|t| t.id),
            Some(a.id)
        );
        assert_eq!(
            find_available_technician(&reverse, &bookings, 600, 60).map(|t| t.id),
            Some(b.id)
        );
    }

    #[test]
    fn all_busy_returns_none() {
        let a = technician(Uuid::new_v4());
        let b = technician(Uuid::new_v4());
        let mut bookings = HashMap::new();
        bookings.insert(a.id, vec![BookingInterval::new(600, 60)]);
        bookings.insert(b.id, vec![BookingInterval::new(630, 60)]);

        let candidates = vec![a, b];
        assert!(find_available_technician(&candidates, &bookings, 615, 60).is_none());
    }

    #[test]
    fn technician_free_after_touching_booking() {
        let a = technician(Uuid::new_v4());
        let mut bookings = HashMap::new();
        bookings.insert(a.id, vec![BookingInterval::new(600, 60)]);

        let candidates = vec![a.clone()];
        // 11:00 starts exactly where the 10:00-11:00 job ends.
        assert_eq!(
            find_available_technician(&candidates, &bookings, 660, 60).map(|t| t.id),
            Some(a.id)
        );
    }
}
