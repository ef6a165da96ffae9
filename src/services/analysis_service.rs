use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::clients::VisionProvider;
use crate::error::AppError;
use crate::models::AnalysisRequest;
use crate::services::notification_service::NotificationService;
use crate::services::payload_mapper::build_provider_payload;

/// Runs one validated request through mapping, the provider call and the
/// notification sink.
#[derive(Clone)]
pub struct AnalysisService {
    provider: Arc<dyn VisionProvider>,
    notifier: NotificationService,
}

impl AnalysisService {
    pub fn new(provider: Arc<dyn VisionProvider>, notifier: NotificationService) -> Self {
        Self { provider, notifier }
    }

    /// Exactly one provider call per invocation. `original_request` is only
    /// forwarded to the notification sink.
    #[instrument(skip(self, request, original_request), fields(analysis_type = %request.analysis_type()))]
    pub async fn run(&self, request: &AnalysisRequest, original_request: Value) -> Result<Value, AppError> {
        let payload = build_provider_payload(request);
        let result = self.provider.analyze(request.analysis_type(), &payload).await?;

        if self.notifier.notify(result.clone(), original_request).is_some() {
            debug!("Analysis event handed to notification sink");
        }

        Ok(result)
    }
}
