//! # Error Handling
//!
//! HTTP-facing error type and how it is turned into a response.
//!
//! Pipeline code reports typed failures (`PipelineError`); each handler decides what
//! the client gets to see and wraps it in an [`AppError`]. Model backends use `anyhow`
//! internally and are never shown to clients verbatim unless a handler chooses to.
//!
//! ## JSON Response Format:
//! ```json
//! {
//!   "detail": "Unsupported language specified.",
//!   "error": {
//!     "type": "bad_request",
//!     "message": "Unsupported language specified.",
//!     "timestamp": "2025-01-01T12:00:00Z"
//!   }
//! }
//! ```
//! `detail` is the field browser clients read; `error` carries the machine-readable type.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Errors a handler can return.
///
/// ## Error Categories:
/// - **Internal**: server-side failures (500)
/// - **BadRequest**: the client sent something unusable (400)
/// - **NotFound**: unknown route or resource (404)
#[derive(Debug)]
pub enum AppError {
    Internal(String),
    BadRequest(String),
    NotFound(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.parts().0
    }

    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = self.parts();

        HttpResponse::build(status).json(json!({
            "detail": message,
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

/// Shorthand for handler results.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn test_error_response_body() {
        let err = AppError::BadRequest("Unsupported language specified.".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let response = err.error_response();
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["detail"], "Unsupported language specified.");
        assert_eq!(json["error"]["type"], "bad_request");
        assert_eq!(json["error"]["message"], "Unsupported language specified.");
        assert!(json["error"]["timestamp"].is_string());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
    }
}
