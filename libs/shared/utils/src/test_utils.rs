use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            notification_function_url: String::new(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "customer".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn customer(email: &str) -> Self {
        Self::new(email, "customer")
    }

    pub fn technician(email: &str) -> Self {
        Self::new(email, "technician")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn customer_response(customer_id: &str, lat: Option<f64>, lon: Option<f64>) -> serde_json::Value {
        json!({
            "id": customer_id,
            "email": "customer@example.com",
            "full_name": "Test Customer",
            "phone": "253-555-0101",
            "latitude": lat,
            "longitude": lon,
            "address": "123 Division Ave, Tacoma, WA",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn team_member_response(member_id: &str, role: &str, is_active: bool) -> serde_json::Value {
        json!({
            "id": member_id,
            "first_name": "Test",
            "last_name": "Technician",
            "phone": "253-555-0102",
            "role": role,
            "is_active": is_active,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(
        appointment_id: &str,
        customer_id: &str,
        technician_id: Option<&str>,
        date: &str,
        time_start: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "customer_id": customer_id,
            "technician_id": technician_id,
            "scheduled_date": date,
            "scheduled_time_start": time_start,
            "estimated_duration_minutes": 60,
            "status": status,
            "service_type": "annual_test",
            "device_id": null,
            "notes": null,
            "customer_can_track": false,
            "technician_latitude": null,
            "technician_longitude": null,
            "technician_last_location_at": null,
            "travel_distance_km": null,
            "estimated_arrival_at": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn technician_location_response(
        technician_id: &str,
        lat: f64,
        lon: f64,
        is_active: bool,
        last_updated_at: &str,
    ) -> serde_json::Value {
        json!({
            "technician_id": technician_id,
            "latitude": lat,
            "longitude": lon,
            "accuracy": 5.0,
            "heading": 180.0,
            "speed": 13.4,
            "address": "En route",
            "battery_level": 82,
            "is_active": is_active,
            "last_updated_at": last_updated_at
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "error": {
                "message": message,
                "code": code
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::technician("tech@example.com");
        assert_eq!(user.email, "tech@example.com");
        assert_eq!(user.role, "technician");

        let user_model = user.to_user();
        assert!(user_model.is_team_member());
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let secret = "test-secret";
        let token = JwtTestUtils::create_test_token(&user, secret, Some(1));

        assert_eq!(token.split('.').count(), 3);
    }
}
