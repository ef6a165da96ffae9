use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use crate::clients::VisionProvider;
use crate::config::settings::CloudinaryConfig;
use crate::error::AppError;
use crate::models::{AnalysisType, ProviderPayload};

#[derive(Debug, thiserror::Error)]
pub enum CloudinaryError {
    #[error("request to Cloudinary timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("Cloudinary returned HTTP {status}")]
    Provider { status: u16, body: Option<Value> },
    #[error("invalid response body: {0}")]
    InvalidResponse(String),
}

impl CloudinaryError {
    fn from_transport(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            CloudinaryError::Timeout
        } else {
            CloudinaryError::Transport(error.to_string())
        }
    }
}

impl From<CloudinaryError> for AppError {
    fn from(error: CloudinaryError) -> Self {
        match error {
            CloudinaryError::Timeout => AppError::UpstreamTimeout,
            CloudinaryError::Provider { status, body } => AppError::UpstreamFailure {
                message: format!("provider responded with HTTP {}", status),
                details: body,
            },
            other => AppError::UpstreamFailure {
                message: other.to_string(),
                details: None,
            },
        }
    }
}

/// Client for the Cloudinary AI Vision analyze endpoints.
///
/// One call per request: no retries, the caller owns retry policy.
pub struct CloudinaryClient {
    client: Client,
    base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryClient {
    pub fn new(config: &CloudinaryConfig) -> Result<Self, AppError> {
        let client = crate::clients::http_client::new_api_client(Duration::from_secs(config.timeout_secs))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, analysis_type: AnalysisType) -> String {
        format!(
            "{}/{}/analyze/{}",
            self.base_url,
            self.cloud_name,
            analysis_type.capability()
        )
    }

    async fn send(&self, analysis_type: AnalysisType, payload: &ProviderPayload) -> Result<Value, CloudinaryError> {
        let url = self.endpoint(analysis_type);
        debug!("Sending {} analysis to {}", analysis_type, url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(payload)
            .send()
            .await
            .map_err(CloudinaryError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok().map(|text| {
                serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text))
            });
            warn!("Cloudinary {} analysis failed with HTTP {}", analysis_type, status);
            return Err(CloudinaryError::Provider {
                status: status.as_u16(),
                body: body.filter(|b| !matches!(b, Value::String(s) if s.is_empty())),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                CloudinaryError::Timeout
            } else {
                CloudinaryError::InvalidResponse(e.to_string())
            }
        })
    }
}

#[async_trait]
impl VisionProvider for CloudinaryClient {
    #[instrument(skip(self, payload))]
    async fn analyze(&self, analysis_type: AnalysisType, payload: &ProviderPayload) -> Result<Value, AppError> {
        match self.send(analysis_type, payload).await {
            Ok(body) => Ok(body),
            Err(e) => {
                error!("Cloudinary analysis error: {}", e);
                Err(e.into())
            }
        }
    }
}
