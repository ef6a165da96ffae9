use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
};
use dashmap::DashMap;
use futures_util::future::{Ready, ok};
use log::{debug, error, info, warn};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use crate::config::settings::RateLimitConfig;
use crate::error::AppError;
use crate::middleware::auth_types::ApiKeyIdentity;
use crate::middleware::bypasses_gate;

/// Fixed-window counter for one identity.
#[derive(Debug, Clone)]
pub struct RateLimitEntry {
    count: u64,
    window_start: Instant,
}

/// Outcome of counting one request against an identity's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_after: Duration,
}

impl RateLimitDecision {
    fn denied(limit: u64, reset_after: Duration) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_after,
        }
    }

    /// Whole seconds until the window resets, never zero.
    pub fn reset_after_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 { secs + 1 } else { secs.max(1) }
    }
}

impl RateLimitEntry {
    fn new() -> Self {
        Self {
            count: 0,
            window_start: Instant::now(),
        }
    }

    fn is_window_expired(&self, window_duration: Duration) -> bool {
        self.window_start.elapsed() >= window_duration
    }

    fn record(&mut self, max_requests: u64, window_duration: Duration) -> RateLimitDecision {
        if self.is_window_expired(window_duration) {
            self.count = 0;
            self.window_start = Instant::now();
        }

        let reset_after = window_duration.saturating_sub(self.window_start.elapsed());
        if self.count < max_requests {
            self.count += 1;
            RateLimitDecision {
                allowed: true,
                limit: max_requests,
                remaining: max_requests - self.count,
                reset_after,
            }
        } else {
            RateLimitDecision::denied(max_requests, reset_after)
        }
    }
}

/// Storage backend for rate-limit windows.
#[derive(Clone)]
pub enum RateLimitStorage {
    /// In-memory windows, single instance only
    Memory {
        windows: Arc<DashMap<String, RateLimitEntry>>,
    },
    /// Redis windows shared across instances
    Redis {
        connection_manager: Arc<redis::aio::ConnectionManager>,
    },
}

impl RateLimitStorage {
    pub fn new_memory() -> Self {
        Self::Memory {
            windows: Arc::new(DashMap::new()),
        }
    }

    pub async fn new_redis(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let connection_manager = redis::aio::ConnectionManager::new(client).await?;

        info!("Redis connection established for rate limiting");

        Ok(Self::Redis {
            connection_manager: Arc::new(connection_manager),
        })
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory { .. } => "memory",
            Self::Redis { .. } => "redis",
        }
    }

    fn check_memory(
        windows: &DashMap<String, RateLimitEntry>,
        identity: &str,
        max_requests: u64,
        window_duration: Duration,
    ) -> RateLimitDecision {
        let mut entry = windows
            .entry(identity.to_string())
            .or_insert_with(RateLimitEntry::new);
        entry.record(max_requests, window_duration)
    }

    async fn check_redis(
        connection_manager: &redis::aio::ConnectionManager,
        identity: &str,
        max_requests: u64,
        window_duration: Duration,
        redis_key_prefix: &Option<String>,
    ) -> Result<RateLimitDecision, redis::RedisError> {
        use redis::AsyncCommands;

        let prefix = redis_key_prefix.as_deref().unwrap_or("default");
        let key = format!("rate_limit:{}:{}", prefix, identity);
        let window_secs = window_duration.as_secs().max(1) as i64;
        let mut conn = connection_manager.clone();

        let count: u64 = conn.incr(&key, 1).await?;
        if count == 1 {
            // Set expiration only on first increment
            let _: () = conn.expire(&key, window_secs).await?;
        }

        let mut ttl: i64 = conn.ttl(&key).await?;
        if ttl < 0 {
            // Counter without expiry, e.g. a crash between INCR and EXPIRE
            let _: () = conn.expire(&key, window_secs).await?;
            ttl = window_secs;
        }
        let reset_after = Duration::from_secs(ttl as u64);

        if count <= max_requests {
            Ok(RateLimitDecision {
                allowed: true,
                limit: max_requests,
                remaining: max_requests - count,
                reset_after,
            })
        } else {
            Ok(RateLimitDecision::denied(max_requests, reset_after))
        }
    }

    /// Counts one request for `identity`. Redis failures deny the request.
    pub async fn check(
        &self,
        identity: &str,
        max_requests: u64,
        window_duration: Duration,
        redis_key_prefix: &Option<String>,
    ) -> RateLimitDecision {
        match self {
            Self::Memory { windows } => Self::check_memory(windows, identity, max_requests, window_duration),
            Self::Redis { connection_manager } => {
                match Self::check_redis(
                    connection_manager,
                    identity,
                    max_requests,
                    window_duration,
                    redis_key_prefix,
                )
                .await
                {
                    Ok(decision) => decision,
                    Err(e) => {
                        error!(
                            "Redis rate limit check failed for {}: {}. Denying request (fail closed).",
                            identity, e
                        );
                        RateLimitDecision::denied(max_requests, window_duration)
                    }
                }
            }
        }
    }

    fn cleanup_expired_entries_memory(windows: &DashMap<String, RateLimitEntry>, window_duration: Duration) {
        let before = windows.len();
        windows.retain(|_, entry| !entry.is_window_expired(window_duration));
        debug!(
            "Rate limit cleanup removed {} expired windows",
            before.saturating_sub(windows.len())
        );
    }
}

/// Rate limiting middleware keyed by API-key identity, else caller address.
#[derive(Clone)]
pub struct RateLimitMiddleware {
    config: RateLimitConfig,
    storage: RateLimitStorage,
}

impl RateLimitMiddleware {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            storage: RateLimitStorage::new_memory(),
        }
    }

    pub fn with_shared_storage(config: RateLimitConfig, storage: RateLimitStorage) -> Self {
        Self { config, storage }
    }

    // Extracts the client IP address. Relies on the immediate upstream proxy
    // correctly setting X-Forwarded-For or X-Real-IP; the first hop in
    // X-Forwarded-For is taken as the original client.
    fn extract_client_ip(req: &ServiceRequest) -> String {
        if let Some(first_ip) = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
        {
            return first_ip.to_string();
        }

        if let Some(real_ip) = req
            .headers()
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
        {
            return real_ip.to_string();
        }

        req.peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn identity_for(req: &ServiceRequest) -> String {
        match req.extensions().get::<ApiKeyIdentity>() {
            Some(identity) => identity.rate_limit_key(),
            None => format!("ip:{}", Self::extract_client_ip(req)),
        }
    }

    async fn check(&self, identity: &str) -> RateLimitDecision {
        self.storage
            .check(
                identity,
                self.config.max_requests,
                Duration::from_millis(self.config.window_ms),
                &self.config.redis_key_prefix,
            )
            .await
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RateLimitService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimitService {
            service: Arc::new(service),
            middleware: self.clone(),
        })
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    service: Arc<S>,
    middleware: RateLimitMiddleware,
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
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
        let middleware = self.middleware.clone();

        Box::pin(async move {
            // Preflight and health/root skip rate limiting
            if bypasses_gate(&req) {
                return service.call(req).await;
            }

            let identity = RateLimitMiddleware::identity_for(&req);
            let decision = middleware.check(&identity).await;

            if !decision.allowed {
                warn!("Rate limit exceeded for {} on {}", identity, req.path());
                return Err(AppError::TooManyRequests {
                    limit: decision.limit,
                    retry_after_secs: decision.reset_after_secs(),
                }
                .into());
            }

            debug!(
                "Rate limit passed for {} ({} remaining)",
                identity, decision.remaining
            );

            let mut res = service.call(req).await?;
            let headers = res.headers_mut();
            headers.insert(HeaderName::from_static("ratelimit-limit"), HeaderValue::from(decision.limit));
            headers.insert(
                HeaderName::from_static("ratelimit-remaining"),
                HeaderValue::from(decision.remaining),
            );
            headers.insert(
                HeaderName::from_static("ratelimit-reset"),
                HeaderValue::from(decision.reset_after_secs()),
            );
            Ok(res)
        })
    }
}

/// Builds the rate-limit store: Redis when a URL is configured, memory otherwise.
pub async fn create_rate_limit_storage(config: &RateLimitConfig) -> Result<RateLimitStorage, AppError> {
    match &config.redis_url {
        Some(url) => match RateLimitStorage::new_redis(url).await {
            Ok(storage) => Ok(storage),
            Err(e) => {
                error!("Failed to connect to Redis for rate limiting: {}", e);
                Err(AppError::Configuration(format!(
                    "Failed to connect to Redis: {}",
                    e
                )))
            }
        },
        None => {
            info!("REDIS_URL not set; using in-memory rate limit windows (single instance only)");
            Ok(RateLimitStorage::new_memory())
        }
    }
}

/// Periodically evicts expired in-memory windows. Returns immediately for Redis,
/// whose keys expire on their own.
pub async fn start_memory_store_cleanup_task(
    storage: RateLimitStorage,
    window_duration: Duration,
    cleanup_interval_secs: u64,
) {
    let RateLimitStorage::Memory { windows } = storage else {
        return;
    };

    let mut interval = tokio::time::interval(Duration::from_secs(cleanup_interval_secs.max(1)));
    info!(
        "Starting rate limit memory store cleanup task (interval: {}s)",
        cleanup_interval_secs
    );

    loop {
        interval.tick().await;
        RateLimitStorage::cleanup_expired_entries_memory(&windows, window_duration);
    }
}
