use actix_web::web;

use crate::error::AppError;
use crate::handlers;

/// Largest accepted JSON body.
pub const JSON_BODY_LIMIT: usize = 1024 * 1024;

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_BODY_LIMIT)
        .error_handler(|err, _req| AppError::from(err).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| AppError::from(err).into())
}

/// Registers every route plus the JSON 404 fallback. Gate stages are applied
/// by the caller around the whole app.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .route("/", web::get().to(handlers::fallback::root_redirect))
        .route("/health", web::get().to(handlers::health::health_check))
        .route("/analyze", web::post().to(handlers::analysis_handlers::analyze))
        .route("/batch-analyze", web::post().to(handlers::analysis_handlers::batch_analyze))
        .route("/analyze-image", web::get().to(handlers::analysis_handlers::analyze_image_legacy))
        .default_service(web::to(handlers::fallback::not_found));
}
