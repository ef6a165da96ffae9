use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::AppError;
use crate::services::AnalysisService;
use crate::services::legacy_key_resolver::resolve_legacy_key;
use crate::utils::request_validation::{BodyDialect, validate_analysis_request};
use crate::utils::url_safety::validate_image_url;

/// `POST /analyze`: snake_case body, provider JSON relayed as-is.
#[instrument(skip(service, body))]
pub async fn analyze(
    service: web::Data<AnalysisService>,
    body: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    run_body(&service, body.into_inner(), BodyDialect::Analyze).await
}

/// `POST /batch-analyze`: camelCase sibling of `/analyze`.
#[instrument(skip(service, body))]
pub async fn batch_analyze(
    service: web::Data<AnalysisService>,
    body: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    run_body(&service, body.into_inner(), BodyDialect::Batch).await
}

async fn run_body(service: &AnalysisService, body: Value, dialect: BodyDialect) -> Result<HttpResponse, AppError> {
    let request = validate_analysis_request(&body, dialect)?;
    let result = service.run(&request, body).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyAnalyzeQuery {
    pub image_url: Option<String>,
    pub app_key: Option<String>,
}

/// `GET /analyze-image?imageUrl=&appKey=`: canned configuration per app key,
/// answered as `{prompts, answer}`.
#[instrument(skip(service, query))]
pub async fn analyze_image_legacy(
    service: web::Data<AnalysisService>,
    query: web::Query<LegacyAnalyzeQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();

    let config = resolve_legacy_key(query.app_key.as_deref().unwrap_or_default())?;

    let image_url = query
        .image_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| AppError::Validation("imageUrl is required".to_string()))?;
    validate_image_url(image_url, "imageUrl")?;

    let request = config.to_request(image_url);
    // The app key is a shared secret and is not forwarded
    let original = json!({
        "imageUrl": image_url,
        "analysisType": config.analysis_type(),
    });
    let answer = service.run(&request, original).await?;

    Ok(HttpResponse::Ok().json(json!({
        "prompts": config.echo(),
        "answer": answer,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::configure_routes;
    use crate::services::NotificationService;
    use crate::services::analysis_service::test_support::RecordingProvider;
    use crate::config::settings::NotificationConfig;
    use crate::handlers::test_support::settings;
    use crate::models::AnalysisType;
    use actix_web::{App, http::StatusCode, test};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    macro_rules! app_with {
        ($provider:expr, $notifier:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(settings()))
                    .app_data(web::Data::new(AnalysisService::new($provider, $notifier)))
                    .configure(configure_routes),
            )
            .await
        };
    }

    fn moderation_body() -> Value {
        json!({
            "imageUrl": "https://x/img.jpg",
            "analysis_type": "ai_vision_moderation",
            "prompts": ["is it safe?"]
        })
    }

    #[actix_web::test]
    async fn test_analyze_relays_provider_json() {
        let provider = Arc::new(RecordingProvider::default());
        let app = app_with!(provider.clone(), NotificationService::disabled());

        let req = test::TestRequest::post().uri("/analyze").set_json(moderation_body()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["capability"], "ai_vision_moderation");

        let calls = provider.calls.lock().unwrap();
        assert_eq!(
            serde_json::to_value(&calls[0].1).unwrap(),
            json!({"source": {"uri": "https://x/img.jpg"}, "rejection_questions": ["is it safe?"]})
        );
    }

    #[actix_web::test]
    async fn test_invalid_requests_never_reach_provider() {
        let provider = Arc::new(RecordingProvider::default());
        let app = app_with!(provider.clone(), NotificationService::disabled());

        let invalid = [
            json!({"analysis_type": "ai_vision_general", "prompts": ["a"]}),
            json!({"imageUrl": "http://127.0.0.1/admin", "analysis_type": "ai_vision_general", "prompts": ["a"]}),
            json!({"imageUrl": "https://x/img.jpg", "analysis_type": "ai_vision_faces", "prompts": ["a"]}),
            json!({"imageUrl": "https://x/img.jpg", "analysis_type": "ai_vision_general"}),
            json!({"imageUrl": "https://x/img.jpg", "analysis_type": "ai_vision_tagging", "tags": [{"name": "<b>x</b>", "description": "d"}]}),
        ];

        for body in invalid {
            let req = test::TestRequest::post().uri("/analyze").set_json(&body).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body: {}", body);
            let error: Value = test::read_body_json(resp).await;
            assert_eq!(error["code"], "VALIDATION_ERROR");
        }

        assert_eq!(provider.call_count(), 0);
    }

    #[actix_web::test]
    async fn test_identical_requests_make_independent_calls() {
        let provider = Arc::new(RecordingProvider::default());
        let app = app_with!(provider.clone(), NotificationService::disabled());

        for _ in 0..2 {
            let req = test::TestRequest::post().uri("/analyze").set_json(moderation_body()).to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
    }

    #[actix_web::test]
    async fn test_batch_analyze_uses_camel_case_fields() {
        let provider = Arc::new(RecordingProvider::default());
        let app = app_with!(provider.clone(), NotificationService::disabled());

        let req = test::TestRequest::post()
            .uri("/batch-analyze")
            .set_json(json!({
                "imageUrl": "https://x/img.jpg",
                "analysisType": "ai_vision_tagging",
                "analysisData": [{"name": "cat", "description": "a cat", "color": "grey"}],
                "multiLabel": true
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls[0].0, AnalysisType::Tagging);
        assert_eq!(
            serde_json::to_value(&calls[0].1).unwrap(),
            json!({
                "source": {"uri": "https://x/img.jpg"},
                "tag_definitions": [{"name": "cat", "description": "a cat"}],
                "multi_label": true
            })
        );
    }

    #[actix_web::test]
    async fn test_upstream_errors_map_to_status() {
        let timeout = Arc::new(RecordingProvider::failing(|| AppError::UpstreamTimeout));
        let app = app_with!(timeout, NotificationService::disabled());
        let req = test::TestRequest::post().uri("/analyze").set_json(moderation_body()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::REQUEST_TIMEOUT);

        let failure = Arc::new(RecordingProvider::failing(|| AppError::UpstreamFailure {
            message: "provider responded with HTTP 400".into(),
            details: Some(json!({"error": {"message": "bad uri"}})),
        }));
        let app = app_with!(failure, NotificationService::disabled());
        let req = test::TestRequest::post().uri("/analyze").set_json(moderation_body()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "ANALYSIS_FAILED");
        assert_eq!(body["details"]["error"]["message"], "bad uri");
    }

    #[actix_web::test]
    async fn test_legacy_route_echoes_configuration() {
        let provider = Arc::new(RecordingProvider::default());
        let app = app_with!(provider.clone(), NotificationService::disabled());

        let req = test::TestRequest::get()
            .uri("/analyze-image?imageUrl=https%3A%2F%2Fx%2Fimg.jpg&appKey=fGr3Ase")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["prompts"].as_array().unwrap().len(), 2);
        assert_eq!(body["prompts"][0]["name"], "person");
        assert_eq!(body["answer"]["capability"], "ai_vision_tagging");
        assert_eq!(provider.call_count(), 1);
    }

    #[actix_web::test]
    async fn test_unknown_app_key_is_rejected_without_call() {
        let provider = Arc::new(RecordingProvider::default());
        let app = app_with!(provider.clone(), NotificationService::disabled());

        for uri in [
            "/analyze-image?imageUrl=https%3A%2F%2Fx%2Fimg.jpg&appKey=nope",
            "/analyze-image?imageUrl=https%3A%2F%2Fx%2Fimg.jpg",
        ] {
            let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["code"], "INVALID_APP_KEY");
        }

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/analyze-image?appKey=fGr3Ase").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        assert_eq!(provider.call_count(), 0);
    }

    #[actix_web::test]
    async fn test_webhook_failure_does_not_change_response() {
        let mut server = mockito::Server::new_async().await;
        let hook = server.mock("POST", "/hook").with_status(503).expect(1).create_async().await;

        let notifier = NotificationService::new(&NotificationConfig {
            webhook_url: Some(format!("{}/hook", server.url())),
            timeout_secs: 2,
        })
        .unwrap();
        let provider = Arc::new(RecordingProvider::default());
        let app = app_with!(provider, notifier);

        let req = test::TestRequest::post().uri("/analyze").set_json(moderation_body()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        // Delivery is detached; give it a moment to land
        for _ in 0..50 {
            if hook.matched_async().await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        hook.assert_async().await;
    }
}
