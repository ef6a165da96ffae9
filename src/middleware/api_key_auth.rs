use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
};
use chrono::Utc;
use futures_util::future::{Ready, ok};
use log::{debug, warn};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::error::AppError;
use crate::middleware::auth_types::ApiKeyIdentity;
use crate::middleware::bypasses_gate;
use crate::security::{
    ApiKeySet, TimestampPolicy, check_request_timestamp, is_valid_api_key_format, key_fingerprint,
};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

/// Runs the gate checks in order: key present, key format, key known,
/// timestamp fresh. The first failing step decides the error.
pub fn authenticate(
    api_key: Option<&str>,
    timestamp: Option<&str>,
    keys: &ApiKeySet,
    policy: TimestampPolicy,
    now_ms: i64,
) -> Result<ApiKeyIdentity, AppError> {
    let api_key = api_key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(AppError::MissingApiKey)?;

    if !is_valid_api_key_format(api_key) {
        return Err(AppError::InvalidApiKeyFormat);
    }

    // Empty allow-list: any well-formed key passes
    if !keys.is_empty() && !keys.contains(api_key) {
        return Err(AppError::InvalidApiKey);
    }

    check_request_timestamp(timestamp, now_ms, policy)?;

    Ok(ApiKeyIdentity {
        fingerprint: key_fingerprint(api_key),
    })
}

/// API-key and request-freshness gate.
#[derive(Clone)]
pub struct ApiKeyAuthentication {
    keys: Arc<ApiKeySet>,
    policy: TimestampPolicy,
}

impl ApiKeyAuthentication {
    pub fn new(keys: ApiKeySet, policy: TimestampPolicy) -> Self {
        if keys.is_empty() {
            warn!("API key allow-list is empty: any well-formed key will be accepted");
        } else {
            debug!("API key gate configured with {} keys", keys.len());
        }

        Self {
            keys: Arc::new(keys),
            policy,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyAuthentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = ApiKeyAuthenticationMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ApiKeyAuthenticationMiddleware {
            service: Arc::new(service),
            keys: self.keys.clone(),
            policy: self.policy,
        })
    }
}

pub struct ApiKeyAuthenticationMiddleware<S> {
    service: Arc<S>,
    keys: Arc<ApiKeySet>,
    policy: TimestampPolicy,
}

impl<S, B> Service<ServiceRequest> for ApiKeyAuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        if bypasses_gate(&req) {
            return Box::pin(async move { service.call(req).await });
        }

        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let api_key = header(API_KEY_HEADER);
        let timestamp = header(TIMESTAMP_HEADER);

        let outcome = authenticate(
            api_key.as_deref(),
            timestamp.as_deref(),
            &self.keys,
            self.policy,
            Utc::now().timestamp_millis(),
        );

        Box::pin(async move {
            match outcome {
                Ok(identity) => {
                    debug!("API key {} accepted for {}", identity.fingerprint, req.path());
                    req.extensions_mut().insert(identity);
                    service.call(req).await
                }
                Err(e) => {
                    warn!("Gate rejected {} {}: {}", req.method(), req.path(), e.code());
                    Err(e.into())
                }
            }
        })
    }
}
