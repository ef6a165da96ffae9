pub mod cloudinary_client;
pub mod http_client;

pub use cloudinary_client::*;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;
use crate::models::{AnalysisType, ProviderPayload};

/// Outbound seam to the hosted vision provider.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Issues exactly one provider call and returns its JSON body.
    async fn analyze(&self, analysis_type: AnalysisType, payload: &ProviderPayload) -> Result<Value, AppError>;
}
