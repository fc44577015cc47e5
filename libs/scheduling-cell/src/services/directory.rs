// libs/scheduling-cell/src/services/directory.rs
//! Read-only client for the team-member directory. The directory itself is
//! owned elsewhere; this cell only needs the eligible-technician list.

use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use shared_database::supabase::SupabaseClient;

use crate::models::{SchedulingError, TeamMember};

pub struct TeamDirectoryService {
    supabase: Arc<SupabaseClient>,
}

impl TeamDirectoryService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Active members holding an assignable role, ordered by id so that
    /// first-free-wins assignment is reproducible across requests.
    pub async fn get_assignable_technicians(
        &self,
        auth_token: &str,
    ) -> Result<Vec<TeamMember>, SchedulingError> {
        let path = "/rest/v1/team_members?is_active=eq.true&role=in.(technician,admin)&order=id.asc";

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let members: Vec<TeamMember> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<TeamMember>, _>>()
            .map_err(|e| {
                SchedulingError::Database(format!("Failed to parse team members: {}", e))
            })?;

        debug!("Loaded {} assignable technicians", members.len());
        Ok(members)
    }
}
