//! # Model Management Handlers
//!
//! - `GET /api/v1/models/status` - state of every cache slot
//! - `POST /api/v1/models/{kind}/load` - load one model now (`punctuation`,
//!   `translation` or `transcription`)
//!
//! Loading goes through the same cache the pipeline uses, so a model loaded here is the
//! one later requests get, and a failed load stays failed.

use crate::error::{AppError, AppResult};
use crate::models::ModelKind;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::time::Instant;

pub async fn model_status(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "models": state.models.snapshot()
    }))
}

pub async fn load_model(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let kind: ModelKind = path
        .parse()
        .map_err(|e: anyhow::Error| AppError::BadRequest(e.to_string()))?;

    let start_time = Instant::now();
    state
        .models
        .ensure_loaded(kind)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "kind": kind,
        "elapsed_ms": start_time.elapsed().as_millis() as u64,
        "status": state.models.status(kind)
    })))
}

#[cfg(test)]
mod tests {
    use crate::handlers::configure_routes;
    use crate::handlers::test_support::state_with;
    use crate::models::{MockModelLoader, MockPunctuator, Punctuator};
    use actix_web::{test, App};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_load_then_status() {
        let punctuator: Arc<dyn Punctuator> = Arc::new(MockPunctuator::new());
        let mut loader = MockModelLoader::new();
        loader
            .expect_load_punctuator()
            .times(1)
            .return_once(move || Ok(punctuator));

        let app = test::init_service(
            App::new()
                .app_data(state_with(loader))
                .configure(configure_routes),
        )
        .await;

        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/api/v1/models/punctuation/load")
                .to_request();
            let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["kind"], "punctuation");
            assert_eq!(body["status"]["state"], "loaded");
        }

        let req = test::TestRequest::get().uri("/api/v1/models/status").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let models = body["models"].as_array().unwrap();
        let punctuation = models.iter().find(|m| m["kind"] == "punctuation").unwrap();
        assert_eq!(punctuation["state"], "loaded");
        assert_eq!(punctuation["load_attempts"], 1);
    }

    #[actix_web::test]
    async fn test_failed_and_unknown_loads() {
        let mut loader = MockModelLoader::new();
        loader
            .expect_load_transcriber()
            .times(1)
            .returning(|| Err(anyhow::anyhow!("weights not found")));

        let app = test::init_service(
            App::new()
                .app_data(state_with(loader))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/models/whisper/load")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 500);

        let req = test::TestRequest::post()
            .uri("/api/v1/models/tts/load")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }
}
