//! `POST /api/transcribe-and-translate`

use crate::error::{AppError, AppResult};
use crate::pipeline::TranscriptionRequest;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use tracing::error;

/// Transcribe base64 audio and translate the transcript.
///
/// Every failure, including an unknown language name, is a 500 whose message names
/// the cause.
pub async fn transcribe_and_translate(
    state: web::Data<AppState>,
    request: web::Json<TranscriptionRequest>,
) -> AppResult<HttpResponse> {
    match state.pipeline.transcribe_and_translate(&request).await {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e) => {
            error!("Audio processing error: {}", e);
            Err(AppError::Internal(format!("Failed to process audio: {}", e)))
        }
    }
}
