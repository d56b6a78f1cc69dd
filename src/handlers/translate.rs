//! `POST /api/translate`

use crate::error::{AppError, AppResult};
use crate::pipeline::TranslationRequest;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use tracing::{error, warn};

/// Translate `text` from one language name to another.
///
/// Unknown language names are the caller's fault (400). Every other failure is a 500
/// with a fixed message; the cause is only logged.
pub async fn translate(
    state: web::Data<AppState>,
    request: web::Json<TranslationRequest>,
) -> AppResult<HttpResponse> {
    match state.pipeline.translate_text(&request).await {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e) if e.is_client_error() => {
            warn!("Rejected translation request: {}", e);
            Err(AppError::BadRequest("Unsupported language specified.".to_string()))
        }
        Err(e) => {
            error!("Translation error: {}", e);
            Err(AppError::Internal("Failed to translate text.".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::handlers::configure_routes;
    use crate::handlers::test_support::state_with;
    use crate::models::{MockModelLoader, MockTranslator, Translator};
    use actix_web::{test, App};
    use serde_json::json;
    use std::sync::Arc;

    fn uppercase_loader() -> MockModelLoader {
        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .returning(|text, _, _| Ok(text.to_uppercase()));
        let translator: Arc<dyn Translator> = Arc::new(translator);

        let mut loader = MockModelLoader::new();
        loader
            .expect_load_punctuator()
            .returning(|| Err(anyhow::anyhow!("punctuation disabled")));
        loader
            .expect_load_translator()
            .return_once(move || Ok(translator));
        loader
    }

    #[actix_web::test]
    async fn test_translate_ok() {
        let app = test::init_service(
            App::new()
                .app_data(state_with(uppercase_loader()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/translate")
            .set_json(json!({
                "text": "Hello world",
                "source_language": "English",
                "target_language": "Spanish"
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "translated_text": "HELLO WORLD" }));
    }

    #[actix_web::test]
    async fn test_unsupported_language_is_400() {
        let app = test::init_service(
            App::new()
                .app_data(state_with(uppercase_loader()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/translate")
            .set_json(json!({
                "text": "hi",
                "source_language": "Klingon",
                "target_language": "English"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], "Unsupported language specified.");
    }

    #[actix_web::test]
    async fn test_model_failure_is_generic_500() {
        let mut loader = MockModelLoader::new();
        loader
            .expect_load_punctuator()
            .returning(|| Err(anyhow::anyhow!("offline")));
        loader
            .expect_load_translator()
            .returning(|| Err(anyhow::anyhow!("CUDA out of memory at 0x7f3a")));

        let app = test::init_service(
            App::new()
                .app_data(state_with(loader))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/translate")
            .set_json(json!({
                "text": "Good morning",
                "source_language": "English",
                "target_language": "French"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 500);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], "Failed to translate text.");
    }
}
