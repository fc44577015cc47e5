// libs/scheduling-cell/src/services/notify.rs
//! Best-effort notification dispatch. Delivery is owned by an external
//! edge function; a failure here never fails the booking that triggered it.

use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::Appointment;

#[derive(Debug, Clone, Copy)]
pub enum TemplateKind {
    BookingConfirmed,
    BookingUnassigned,
}

impl TemplateKind {
    fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::BookingConfirmed => "booking_confirmed",
            TemplateKind::BookingUnassigned => "booking_unassigned",
        }
    }
}

pub struct NotificationService {
    client: Client,
    function_url: String,
    anon_key: String,
}

impl NotificationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            function_url: config.notification_function_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    /// Fire-and-forget send. Every failure path logs and returns normally.
    pub async fn send_booking_notification(
        &self,
        customer_id: Uuid,
        kind: TemplateKind,
        appointment: &Appointment,
    ) {
        if self.function_url.is_empty() {
            debug!("Notification function not configured, skipping {}", kind.as_str());
            return;
        }

        let payload = json!({
            "customer_id": customer_id,
            "template": kind.as_str(),
            "appointment_id": appointment.id,
            "scheduled_date": appointment.scheduled_date,
            "scheduled_time_start": appointment.scheduled_time_start,
            "service_type": appointment.service_type,
        });

        let result = self
            .client
            .post(&self.function_url)
            .bearer_auth(&self.anon_key)
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(
                    "Sent {} notification for appointment {}",
                    kind.as_str(),
                    appointment.id
                );
            }
            Ok(response) => {
                warn!(
                    "Notification sender returned {} for appointment {}",
                    response.status(),
                    appointment.id
                );
            }
            Err(e) => {
                warn!(
                    "Failed to send {} notification for appointment {}: {}",
                    kind.as_str(),
                    appointment.id,
                    e
                );
            }
        }
    }
}
