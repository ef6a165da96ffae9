use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Validation(String),
    MissingApiKey,
    InvalidApiKeyFormat,
    InvalidApiKey,
    InvalidTimestamp(String),
    TooManyRequests { limit: u64, retry_after_secs: u64 },
    CorsRejected(String),
    InvalidAppKey,
    UpstreamTimeout,
    UpstreamFailure { message: String, details: Option<Value> },
    NotFound { path: String },
    Configuration(String),
    Internal(String),
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    message: String,
    code: String,
    details: Option<Value>,
    path: Option<String>,
}

impl AppError {
    /// Machine-readable code returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::MissingApiKey => "MISSING_API_KEY",
            AppError::InvalidApiKeyFormat => "INVALID_API_KEY_FORMAT",
            AppError::InvalidApiKey => "INVALID_API_KEY",
            AppError::InvalidTimestamp(_) => "INVALID_TIMESTAMP",
            AppError::TooManyRequests { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::CorsRejected(_) => "CORS_ORIGIN_NOT_ALLOWED",
            AppError::InvalidAppKey => "INVALID_APP_KEY",
            AppError::UpstreamTimeout => "ANALYSIS_TIMEOUT",
            AppError::UpstreamFailure { .. } => "ANALYSIS_FAILED",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::InvalidAppKey => "Bad Request",
            AppError::MissingApiKey | AppError::InvalidApiKeyFormat | AppError::InvalidApiKey => {
                "Unauthorized"
            }
            AppError::InvalidTimestamp(_) => "Invalid Timestamp",
            AppError::TooManyRequests { .. } => "Too Many Requests",
            AppError::CorsRejected(_) => "Forbidden",
            AppError::UpstreamTimeout => "Request Timeout",
            AppError::UpstreamFailure { .. } => "Analysis Failed",
            AppError::NotFound { .. } => "Not Found",
            AppError::Configuration(_) | AppError::Internal(_) => "Internal Server Error",
        }
    }

    /// Message safe to hand back to the caller.
    fn public_message(&self) -> String {
        match self {
            AppError::Configuration(_) | AppError::Internal(_) => {
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::MissingApiKey => write!(f, "API key is required. Provide it in the X-API-Key header"),
            AppError::InvalidApiKeyFormat => write!(f, "API key must be 64 hexadecimal characters"),
            AppError::InvalidApiKey => write!(f, "Invalid API key"),
            AppError::InvalidTimestamp(e) => write!(f, "Invalid request timestamp: {}", e),
            AppError::TooManyRequests { retry_after_secs, .. } => write!(
                f,
                "Rate limit exceeded. Please try again in {} seconds",
                retry_after_secs
            ),
            AppError::CorsRejected(origin) => write!(f, "Origin '{}' is not allowed by CORS policy", origin),
            AppError::InvalidAppKey => write!(f, "Invalid app key"),
            AppError::UpstreamTimeout => write!(f, "Image analysis timed out"),
            AppError::UpstreamFailure { message, .. } => write!(f, "Image analysis failed: {}", message),
            AppError::NotFound { path } => write!(f, "Route {} not found", path),
            AppError::Configuration(e) => write!(f, "Configuration error: {}", e),
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl StdError for AppError {}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        if status_code.is_server_error() {
            log::error!("{} ({}): {}", status_code, self.code(), self);
        }

        let (details, path) = match self {
            AppError::UpstreamFailure { details, .. } => (details.clone(), None),
            AppError::NotFound { path } => (None, Some(path.clone())),
            _ => (None, None),
        };

        let error_response = ErrorResponse {
            error: self.title().to_string(),
            message: self.public_message(),
            code: self.code().to_string(),
            details,
            path,
        };

        let mut builder = HttpResponse::build(status_code);
        if let AppError::TooManyRequests { limit, retry_after_secs } = self {
            builder
                .insert_header(("Retry-After", retry_after_secs.to_string()))
                .insert_header(("RateLimit-Limit", limit.to_string()))
                .insert_header(("RateLimit-Remaining", "0"))
                .insert_header(("RateLimit-Reset", retry_after_secs.to_string()));
        }

        builder.json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::MissingApiKey => StatusCode::UNAUTHORIZED,
            AppError::InvalidApiKeyFormat => StatusCode::UNAUTHORIZED,
            AppError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            AppError::InvalidTimestamp(_) => StatusCode::BAD_REQUEST,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::CorsRejected(_) => StatusCode::FORBIDDEN,
            AppError::InvalidAppKey => StatusCode::BAD_REQUEST,
            AppError::UpstreamTimeout => StatusCode::REQUEST_TIMEOUT,
            AppError::UpstreamFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON deserialization/serialization error: {}", error))
    }
}

impl From<actix_web::error::JsonPayloadError> for AppError {
    fn from(error: actix_web::error::JsonPayloadError) -> Self {
        AppError::Validation(format!("Invalid JSON body: {}", error))
    }
}

impl From<actix_web::error::QueryPayloadError> for AppError {
    fn from(error: actix_web::error::QueryPayloadError) -> Self {
        AppError::Validation(format!("Invalid query string: {}", error))
    }
}
