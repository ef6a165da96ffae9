use chrono::Utc;
use log::{debug, warn};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::settings::NotificationConfig;
use crate::error::AppError;

/// Best-effort forwarder of completed analyses to an external webhook.
///
/// Delivery is at-most-once: one POST, no retry, no queue. Failures are logged
/// and never reach the request that produced the result.
#[derive(Debug, Clone)]
pub struct NotificationService {
    webhook_url: Option<String>,
    http_client: Client,
}

impl NotificationService {
    pub fn new(config: &NotificationConfig) -> Result<Self, AppError> {
        let http_client = crate::clients::http_client::new_api_client(Duration::from_secs(config.timeout_secs))?;

        Ok(Self {
            webhook_url: config.webhook_url.clone().filter(|url| !url.trim().is_empty()),
            http_client,
        })
    }

    pub fn disabled() -> Self {
        Self {
            webhook_url: None,
            http_client: Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Spawns delivery of one analysis event. Returns `None` when no webhook is
    /// configured. The task is detached: dropping the handle does not cancel it.
    pub fn notify(&self, analysis_result: Value, original_request: Value) -> Option<JoinHandle<()>> {
        let url = self.webhook_url.clone()?;
        let client = self.http_client.clone();
        let event_id = Uuid::new_v4();

        let body = json!({
            "eventId": event_id,
            "analysisResult": analysis_result,
            "originalRequest": original_request,
            "timestamp": Utc::now().to_rfc3339(),
        });

        Some(tokio::spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Delivered analysis event {} to webhook", event_id);
                }
                Ok(response) => {
                    warn!(
                        "Webhook rejected analysis event {} with HTTP {}",
                        event_id,
                        response.status()
                    );
                }
                Err(e) => {
                    warn!("Failed to deliver analysis event {}: {}", event_id, e);
                }
            }
        }))
    }
}
