pub mod api_key_auth;
pub mod auth_types;
pub mod cors;
pub mod rate_limiting;

use actix_web::{dev::ServiceRequest, http::Method};

pub use api_key_auth::ApiKeyAuthentication;
pub use auth_types::ApiKeyIdentity;
pub use cors::{OriginGuard, build_cors};
pub use rate_limiting::{
    RateLimitMiddleware, RateLimitStorage, create_rate_limit_storage, start_memory_store_cleanup_task,
};

/// Paths reachable without passing the gate.
pub const PUBLIC_PATHS: &[&str] = &["/", "/health"];

pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
}

/// CORS preflight and allow-listed paths skip the API-key and rate-limit stages.
pub(crate) fn bypasses_gate(req: &ServiceRequest) -> bool {
    req.method() == Method::OPTIONS || is_public_path(req.path())
}
