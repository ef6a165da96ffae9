use reqwest::Client;
use std::time::Duration;

use crate::error::AppError;

/// Builds an outbound client whose total request time is capped at `timeout`.
pub fn new_api_client(timeout: Duration) -> Result<Client, AppError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        // Below typical upstream keep-alive limits so stale connections are not reused
        .pool_idle_timeout(Some(Duration::from_secs(60)))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))
}
