use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::AppSettings;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSummary {
    pub enabled: bool,
    pub window_ms: u64,
    pub max_requests: u64,
    pub backend: String,
}

/// Security posture reported by `/health`. Never contains key material.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySummary {
    pub profile: String,
    pub api_key_auth: bool,
    pub configured_keys: usize,
    pub timestamp_validation: String,
    pub rate_limit: RateLimitSummary,
    pub cors_origins: Vec<String>,
}

impl SecuritySummary {
    pub fn from_settings(settings: &AppSettings, rate_limit_backend: &str) -> Self {
        let gate = settings.security.profile.gate_enabled();
        let timestamp_validation = match (gate, settings.security.require_timestamp) {
            (false, _) => "disabled",
            (true, true) => "required",
            (true, false) => "optional",
        };

        Self {
            profile: settings.security.profile.as_str().to_string(),
            api_key_auth: gate,
            configured_keys: settings.security.api_keys.len(),
            timestamp_validation: timestamp_validation.to_string(),
            rate_limit: RateLimitSummary {
                enabled: gate,
                window_ms: settings.rate_limit.window_ms,
                max_requests: settings.rate_limit.max_requests,
                backend: rate_limit_backend.to_string(),
            },
            cors_origins: settings.effective_cors_origins(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    security: SecuritySummary,
}

pub async fn health_check(summary: web::Data<SecuritySummary>) -> impl Responder {
    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        security: summary.get_ref().clone(),
    };

    HttpResponse::Ok().json(response)
}
