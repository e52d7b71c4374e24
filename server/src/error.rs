use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use vision_core::DetectionError;

use crate::wire::{ErrorBody, ErrorResponse};

/// Wraps [`DetectionError`] so the HTTP layer owns the status-code
/// mapping (§6 "Errors"); the core crate stays transport-agnostic.
pub struct ApiError(pub DetectionError);

impl From<DetectionError> for ApiError {
    fn from(e: DetectionError) -> Self {
        ApiError(e)
    }
}

impl From<image::ImageError> for ApiError {
    fn from(e: image::ImageError) -> Self {
        ApiError(DetectionError::from(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DetectionError::Validation(_) => StatusCode::BAD_REQUEST,
            DetectionError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            DetectionError::Detection(_) | DetectionError::Conversion(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DetectionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if matches!(self.0, DetectionError::Internal(_)) {
            tracing::error!(error = %self.0, "internal error");
            "internal error".to_string()
        } else {
            self.0.to_string()
        };

        let body = ErrorResponse {
            success: false,
            error: ErrorBody { code: self.0.code(), message },
            model_version: None,
        };

        (status, Json(body)).into_response()
    }
}
