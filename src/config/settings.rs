use std::env;
use std::str::FromStr;
use crate::error::AppError;
use crate::security::api_keys::is_valid_api_key_format;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppSettings {
    pub app: AppConfig,
    pub server: ServerConfig,
    pub cloudinary: CloudinaryConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
    pub notification: NotificationConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub environment: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub landing_page_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    #[serde(skip_serializing)]
    pub api_secret: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Deployment posture of the gateway. `Open` drops the API-key gate and the
/// rate limiter, matching a serverless deployment fronted by its own edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityProfile {
    Secured,
    Open,
}

impl SecurityProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityProfile::Secured => "secured",
            SecurityProfile::Open => "open",
        }
    }

    pub fn gate_enabled(&self) -> bool {
        matches!(self, SecurityProfile::Secured)
    }
}

impl FromStr for SecurityProfile {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "secured" | "secure" => Ok(SecurityProfile::Secured),
            "open" | "serverless" => Ok(SecurityProfile::Open),
            other => Err(AppError::Configuration(format!(
                "SECURITY_PROFILE must be 'secured' or 'open', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub profile: SecurityProfile,
    #[serde(skip_serializing)]
    pub api_keys: Vec<String>,
    pub require_timestamp: bool,
    pub timestamp_tolerance_ms: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u64,
    pub cleanup_interval_secs: u64,
    pub redis_url: Option<String>,
    pub redis_key_prefix: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 15 * 60 * 1000,
            max_requests: 100,
            cleanup_interval_secs: 60,
            redis_url: None,
            redis_key_prefix: None,
        }
    }
}

impl AppSettings {
    pub fn from_env() -> Result<Self, AppError> {
        // App config
        let app_name = env::var("APP_NAME").unwrap_or_else(|_| "vision-gateway".to_string());
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        // Server config
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| AppError::Configuration("SERVER_PORT must be a valid port number".to_string()))?;

        // CORS origins
        let cors_origins = parse_csv(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()));

        let landing_page_url =
            env::var("LANDING_PAGE_URL").unwrap_or_else(|_| "/index.html".to_string());

        // Provider credentials
        let cloud_name = required_var("CLOUDINARY_CLOUD_NAME")?;
        let cloudinary_api_key = required_var("CLOUDINARY_API_KEY")?;
        let cloudinary_api_secret = required_var("CLOUDINARY_API_SECRET")?;
        let cloudinary_base_url = env::var("CLOUDINARY_BASE_URL")
            .unwrap_or_else(|_| "https://api.cloudinary.com/v2/analysis".to_string());
        let cloudinary_timeout_secs = parse_number("CLOUDINARY_TIMEOUT_SECS", "30")?;

        // Gate
        let profile = env::var("SECURITY_PROFILE")
            .unwrap_or_else(|_| "secured".to_string())
            .parse::<SecurityProfile>()?;
        let api_keys = parse_api_keys(&env::var("API_KEYS").unwrap_or_default())?;
        let require_timestamp = parse_bool("REQUIRE_TIMESTAMP", "false")?;
        let timestamp_tolerance_ms = parse_number::<i64>("TIMESTAMP_TOLERANCE_MS", "300000")?;

        // Rate limiting
        let rate_limit_window_ms = parse_number("RATE_LIMIT_WINDOW_MS", "900000")?;
        let rate_limit_max_requests = parse_number("RATE_LIMIT_MAX_REQUESTS", "100")?;
        let cleanup_interval_secs = parse_number("RATE_LIMIT_CLEANUP_INTERVAL_SECS", "60")?;
        let redis_url = env::var("REDIS_URL").ok().filter(|s| !s.trim().is_empty());

        // Notification sink
        let webhook_url = env::var("WEBHOOK_URL").ok().filter(|s| !s.trim().is_empty());
        let webhook_timeout_secs = parse_number("WEBHOOK_TIMEOUT_SECS", "10")?;

        Ok(Self {
            app: AppConfig {
                name: app_name.clone(),
                environment,
            },
            server: ServerConfig {
                host: server_host,
                port: server_port,
                cors_origins,
                landing_page_url,
            },
            cloudinary: CloudinaryConfig {
                cloud_name,
                api_key: cloudinary_api_key,
                api_secret: cloudinary_api_secret,
                base_url: cloudinary_base_url,
                timeout_secs: cloudinary_timeout_secs,
            },
            security: SecurityConfig {
                profile,
                api_keys,
                require_timestamp,
                timestamp_tolerance_ms,
            },
            rate_limit: RateLimitConfig {
                window_ms: rate_limit_window_ms,
                max_requests: rate_limit_max_requests,
                cleanup_interval_secs,
                redis_url,
                redis_key_prefix: Some(app_name),
            },
            notification: NotificationConfig {
                webhook_url,
                timeout_secs: webhook_timeout_secs,
            },
        })
    }

    /// Origins the CORS layer answers for. The open profile does not enforce
    /// the allow-list, so every origin gets CORS headers there.
    pub fn effective_cors_origins(&self) -> Vec<String> {
        if self.security.profile.gate_enabled() {
            self.server.cors_origins.clone()
        } else {
            vec!["*".to_string()]
        }
    }
}

fn required_var(name: &str) -> Result<String, AppError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Configuration(format!("{} must be set", name)))
}

fn parse_number<T: FromStr>(name: &str, default: &str) -> Result<T, AppError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse::<T>()
        .map_err(|_| AppError::Configuration(format!("{} must be a valid number", name)))
}

fn parse_bool(name: &str, default: &str) -> Result<bool, AppError> {
    match env::var(name).unwrap_or_else(|_| default.to_string()).trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(AppError::Configuration(format!("{} must be true or false", name))),
    }
}

/// Splits a comma-separated list, dropping blanks.
pub fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parses the API key allow-list. Every entry must be a 64-character hex key.
pub fn parse_api_keys(raw: &str) -> Result<Vec<String>, AppError> {
    let keys = parse_csv(raw);
    if let Some(position) = keys.iter().position(|key| !is_valid_api_key_format(key)) {
        return Err(AppError::Configuration(format!(
            "API_KEYS entry #{} is not a 64-character hex key",
            position + 1
        )));
    }
    Ok(keys)
}
