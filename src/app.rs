//! Assembly of the HTTP application: shared state, gate stages and routes.
//!
//! `main` builds one [`GatewayState`] and hands a clone to [`build_app`] per worker, so the
//! profile switch and stage order are the same in tests and in production.

use actix_web::{
    App, Error,
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    middleware::{Condition, Logger},
    web,
};

use crate::config::AppSettings;
use crate::handlers::health::SecuritySummary;
use crate::middleware::{
    ApiKeyAuthentication, OriginGuard, RateLimitMiddleware, RateLimitStorage, build_cors,
};
use crate::routes::configure_routes;
use crate::security::{ApiKeySet, TimestampPolicy};
use crate::services::AnalysisService;

/// Everything a worker needs, built once and cloned into each worker.
#[derive(Clone)]
pub struct GatewayState {
    settings: web::Data<AppSettings>,
    analysis: web::Data<AnalysisService>,
    security_summary: web::Data<SecuritySummary>,
    gate_enabled: bool,
    cors_origins: Vec<String>,
    origin_guard: OriginGuard,
    api_key_auth: ApiKeyAuthentication,
    rate_limiter: RateLimitMiddleware,
}

impl GatewayState {
    pub fn new(settings: AppSettings, analysis: AnalysisService, rate_limit_storage: RateLimitStorage) -> Self {
        let security_summary = SecuritySummary::from_settings(&settings, rate_limit_storage.backend_name());
        let cors_origins = settings.effective_cors_origins();
        let origin_guard = OriginGuard::new(&settings.server.cors_origins);
        let api_key_auth = ApiKeyAuthentication::new(
            ApiKeySet::new(settings.security.api_keys.clone()),
            TimestampPolicy {
                required: settings.security.require_timestamp,
                tolerance_ms: settings.security.timestamp_tolerance_ms,
            },
        );
        let rate_limiter = RateLimitMiddleware::with_shared_storage(settings.rate_limit.clone(), rate_limit_storage);

        Self {
            gate_enabled: settings.security.profile.gate_enabled(),
            settings: web::Data::new(settings),
            analysis: web::Data::new(analysis),
            security_summary: web::Data::new(security_summary),
            cors_origins,
            origin_guard,
            api_key_auth,
            rate_limiter,
        }
    }

    pub fn gate_enabled(&self) -> bool {
        self.gate_enabled
    }
}

/// Builds the application. The last wrap runs first, so a request passes the
/// logger, origin guard, CORS, API key and rate limiter in that order. The
/// open profile turns the three gate stages into pass-throughs.
pub fn build_app(
    state: GatewayState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(state.settings)
        .app_data(state.analysis)
        .app_data(state.security_summary)
        .configure(configure_routes)
        .wrap(Condition::new(state.gate_enabled, state.rate_limiter))
        .wrap(Condition::new(state.gate_enabled, state.api_key_auth))
        .wrap(build_cors(&state.cors_origins))
        .wrap(Condition::new(state.gate_enabled, state.origin_guard))
        .wrap(Logger::default())
}
