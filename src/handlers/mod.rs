//! # HTTP Handlers
//!
//! Route table and the handlers behind it.
//!
//! ## Available Endpoints:
//! - `GET  /` - liveness probe
//! - `GET  /health` - detailed health
//! - `GET  /api/v1/metrics` - request metrics
//! - `POST /api/translate` - translate text
//! - `POST /api/transcribe-and-translate` - transcribe audio, then translate it
//! - `GET  /api/languages` - accepted language names
//! - `GET  /api/v1/models/status` - model cache state
//! - `POST /api/v1/models/{kind}/load` - load a model ahead of the first request

pub mod languages;
pub mod models;
pub mod transcribe;
pub mod translate;

use crate::error::AppError;
use crate::health;
use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};

/// Register every route on `cfg`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(health::root))
        .route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/api")
                .route("/translate", web::post().to(translate::translate))
                .route(
                    "/transcribe-and-translate",
                    web::post().to(transcribe::transcribe_and_translate),
                )
                .route("/languages", web::get().to(languages::list_languages))
                .service(
                    web::scope("/v1")
                        .route("/metrics", web::get().to(health::detailed_metrics))
                        .route("/models/status", web::get().to(models::model_status))
                        .route("/models/{kind}/load", web::post().to(models::load_model)),
                ),
        );
}

/// JSON extractor settings: the body limit has to fit base64 audio (4 bytes per 3).
pub fn json_config(max_audio_bytes: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(max_audio_bytes / 3 * 4 + 64 * 1024)
        .error_handler(json_error_handler)
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::debug!("Rejected request body: {}", err);
    let message = match &err {
        JsonPayloadError::OverflowKnownLength { .. } | JsonPayloadError::Overflow { .. } => {
            "Request body is too large".to_string()
        }
        JsonPayloadError::ContentType => "Content type must be application/json".to_string(),
        other => format!("Invalid request body: {}", other),
    };
    AppError::BadRequest(message).into()
}

/// Fallback for unknown routes.
pub async fn not_found(req: HttpRequest) -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound(format!("No route for {} {}", req.method(), req.path())))
}
