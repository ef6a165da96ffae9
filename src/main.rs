use actix_web::HttpServer;
use dotenv::dotenv;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use vision_gateway::clients::{CloudinaryClient, VisionProvider};
use vision_gateway::config;
use vision_gateway::app::{GatewayState, build_app};
use vision_gateway::middleware::{create_rate_limit_storage, start_memory_store_cleanup_task};
use vision_gateway::services::{AnalysisService, NotificationService};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Load application settings
    let app_settings = match config::init_config() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load application settings: {}", e);
            log::error!("Cannot start server without valid settings");
            std::process::exit(1);
        }
    };

    let gate_enabled = app_settings.security.profile.gate_enabled();
    log::info!(
        "Security profile: {} (gate {})",
        app_settings.security.profile.as_str(),
        if gate_enabled { "enabled" } else { "disabled" }
    );

    // Rate limit storage, shared by every worker
    let rate_limit_storage = match create_rate_limit_storage(&app_settings.rate_limit).await {
        Ok(storage) => storage,
        Err(e) => {
            log::error!("Failed to initialize rate limit storage: {}", e);
            std::process::exit(1);
        }
    };

    if gate_enabled {
        tokio::spawn(start_memory_store_cleanup_task(
            rate_limit_storage.clone(),
            Duration::from_millis(app_settings.rate_limit.window_ms),
            app_settings.rate_limit.cleanup_interval_secs,
        ));
    }

    // Upstream client and notification sink
    let provider: Arc<dyn VisionProvider> = match CloudinaryClient::new(&app_settings.cloudinary) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            log::error!("Failed to initialize Cloudinary client: {}", e);
            std::process::exit(1);
        }
    };
    let notifier = match NotificationService::new(&app_settings.notification) {
        Ok(service) => service,
        Err(e) => {
            log::error!("Failed to initialize notification service: {}", e);
            std::process::exit(1);
        }
    };
    if notifier.is_enabled() {
        log::info!("Analysis events will be forwarded to the configured webhook");
    }

    let state = GatewayState::new(
        app_settings.clone(),
        AnalysisService::new(provider, notifier),
        rate_limit_storage,
    );

    let host = &app_settings.server.host;
    let port = app_settings.server.port;
    log::info!("Starting server at http://{}:{}", host, port);

    let listener = TcpListener::bind(format!("{}:{}", host, port))?;

    HttpServer::new(move || build_app(state.clone()))
        .listen(listener)?
        .run()
        .await
}
