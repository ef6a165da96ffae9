use actix_web::{HttpRequest, HttpResponse, http::header::LOCATION, web};

use crate::config::AppSettings;
use crate::error::AppError;

/// `GET /` sends browsers to the static landing page.
pub async fn root_redirect(settings: web::Data<AppSettings>) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((LOCATION, settings.server.landing_page_url.as_str()))
        .finish()
}

pub async fn not_found(req: HttpRequest) -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound {
        path: req.path().to_string(),
    })
}
