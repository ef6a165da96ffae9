use actix_cors::Cors;
use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::{Method, header::ORIGIN},
};
use futures_util::future::{Ready, ok};
use log::warn;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::error::AppError;
use crate::middleware::is_public_path;

fn allows_any(origins: &[String]) -> bool {
    origins.iter().any(|origin| origin == "*")
}

fn normalize(origin: &str) -> &str {
    origin.trim().trim_end_matches('/')
}

/// Header-emitting CORS layer. `*` in the list allows any origin.
///
/// Mismatched origins are never answered here; [`OriginGuard`] owns rejection
/// so every refusal carries the JSON error body.
pub fn build_cors(origins: &[String]) -> Cors {
    let mut cors = Cors::default().block_on_origin_mismatch(false);

    if allows_any(origins) {
        cors = cors.allow_any_origin();
    } else {
        for origin in origins {
            cors = cors.allowed_origin(normalize(origin));
        }
    }

    cors.allow_any_method()
        .allow_any_header()
        .expose_headers(vec!["RateLimit-Limit", "RateLimit-Remaining", "RateLimit-Reset", "Retry-After"])
        .max_age(3600)
}

/// Rejects requests whose `Origin` is not on the allow-list with a JSON 403.
///
/// Requests without an `Origin` header (non-browser callers) pass. Preflights
/// are checked too, on every path, so a disallowed origin never reaches the
/// CORS layer's own error.
#[derive(Clone)]
pub struct OriginGuard {
    origins: Arc<Vec<String>>,
    allow_any: bool,
}

impl OriginGuard {
    pub fn new(origins: &[String]) -> Self {
        Self {
            origins: Arc::new(origins.iter().map(|o| normalize(o).to_string()).collect()),
            allow_any: allows_any(origins),
        }
    }

    pub fn check(&self, origin: Option<&str>) -> Result<(), AppError> {
        match origin {
            None => Ok(()),
            Some(_) if self.allow_any => Ok(()),
            Some(origin) if self.origins.iter().any(|allowed| allowed == normalize(origin)) => Ok(()),
            Some(origin) => Err(AppError::CorsRejected(origin.to_string())),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for OriginGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = OriginGuardMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(OriginGuardMiddleware {
            service: Arc::new(service),
            guard: self.clone(),
        })
    }
}

pub struct OriginGuardMiddleware<S> {
    service: Arc<S>,
    guard: OriginGuard,
}

impl<S, B> Service<ServiceRequest> for OriginGuardMiddleware<S>
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

        let verdict = if req.method() != Method::OPTIONS && is_public_path(req.path()) {
            Ok(())
        } else {
            let origin = req.headers().get(ORIGIN).map(|value| value.to_str().unwrap_or_default());
            self.guard.check(origin)
        };

        Box::pin(async move {
            match verdict {
                Ok(()) => service.call(req).await,
                Err(e) => {
                    warn!("Blocked cross-origin request to {}: {}", req.path(), e);
                    Err(e.into())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::test_support::observe;
    use actix_web::{App, HttpResponse, http::StatusCode, test, web};

    fn origins(list: &[&str]) -> Vec<String> {
        list.iter().map(|o| o.to_string()).collect()
    }

    #[::core::prelude::v1::test]
    fn test_check_matches_normalized_origins() {
        let guard = OriginGuard::new(&origins(&["https://app.example.com/"]));

        assert!(guard.check(None).is_ok());
        assert!(guard.check(Some("https://app.example.com")).is_ok());
        assert!(guard.check(Some("https://evil.example.com")).is_err());
        assert!(guard.check(Some("http://app.example.com")).is_err());

        let open = OriginGuard::new(&origins(&["*"]));
        assert!(open.check(Some("https://anything.test")).is_ok());
    }

    #[actix_web::test]
    async fn test_disallowed_origin_gets_json_403() {
        let allowed = origins(&["https://app.example.com"]);
        let app = test::init_service(
            App::new()
                .wrap(build_cors(&allowed))
                .wrap(OriginGuard::new(&allowed))
                .route("/analyze", web::post().to(HttpResponse::Ok)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/analyze")
            .insert_header(("Origin", "https://evil.example.com"))
            .to_request();
        let (status, _, body) = observe(&app, req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "CORS_ORIGIN_NOT_ALLOWED");

        let req = test::TestRequest::post()
            .uri("/analyze")
            .insert_header(("Origin", "https://app.example.com"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("access-control-allow-origin").unwrap(),
            "https://app.example.com"
        );

        // Server-to-server callers send no Origin
        let resp = test::call_service(&app, test::TestRequest::post().uri("/analyze").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_disallowed_preflight_gets_json_403() {
        let allowed = origins(&["https://app.example.com"]);
        let app = test::init_service(
            App::new()
                .wrap(build_cors(&allowed))
                .wrap(OriginGuard::new(&allowed))
                .route("/analyze", web::post().to(HttpResponse::Ok))
                .route("/health", web::get().to(HttpResponse::Ok)),
        )
        .await;

        for uri in ["/analyze", "/health"] {
            let req = test::TestRequest::default()
                .method(Method::OPTIONS)
                .uri(uri)
                .insert_header(("Origin", "https://evil.example.com"))
                .insert_header(("Access-Control-Request-Method", "POST"))
                .to_request();
            let (status, _, body) = observe(&app, req).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "uri: {}", uri);
            assert_eq!(body["code"], "CORS_ORIGIN_NOT_ALLOWED");
        }

        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/analyze")
            .insert_header(("Origin", "https://app.example.com"))
            .insert_header(("Access-Control-Request-Method", "POST"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("access-control-allow-origin").unwrap(),
            "https://app.example.com"
        );
    }

    #[actix_web::test]
    async fn test_public_paths_skip_the_guard_without_cors_error() {
        let allowed = origins(&["https://app.example.com"]);
        let app = test::init_service(
            App::new()
                .wrap(build_cors(&allowed))
                .wrap(OriginGuard::new(&allowed))
                .route("/health", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/health")
            .insert_header(("Origin", "https://evil.example.com"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get("access-control-allow-origin").is_none());
    }
}
