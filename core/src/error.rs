use thiserror::Error;

/// The four error kinds of the detection contract, plus an opaque catch-all.
///
/// Each variant carries the stable string code used on the wire
/// (`ValidationError`, `ModelUnavailable`, `DetectionError`,
/// `ConversionError`, `InternalError`) via [`DetectionError::code`].
#[derive(Error, Debug)]
pub enum DetectionError {
    /// Malformed input: bad base64, unsupported format, out-of-range
    /// dimensions, contradictory options. Never retried.
    #[error("{0}")]
    Validation(String),

    /// The requested model version has no loaded model.
    #[error("{0}")]
    ModelUnavailable(String),

    /// Inference failed, or a pipeline stage hit an unexpected state
    /// while producing rooms from an image.
    #[error("{0}")]
    Detection(String),

    /// The wall-boxes-to-rooms conversion (component B) failed.
    #[error("{0}")]
    Conversion(String),

    /// Anything else. Logged with full context by the caller; the
    /// message surfaced to clients stays generic.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DetectionError {
    pub fn code(&self) -> &'static str {
        match self {
            DetectionError::Validation(_) => "ValidationError",
            DetectionError::ModelUnavailable(_) => "ModelUnavailable",
            DetectionError::Detection(_) => "DetectionError",
            DetectionError::Conversion(_) => "ConversionError",
            DetectionError::Internal(_) => "InternalError",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        DetectionError::Validation(msg.into())
    }

    pub fn model_unavailable(msg: impl Into<String>) -> Self {
        DetectionError::ModelUnavailable(msg.into())
    }

    pub fn detection(msg: impl Into<String>) -> Self {
        DetectionError::Detection(msg.into())
    }

    pub fn conversion(msg: impl Into<String>) -> Self {
        DetectionError::Conversion(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        DetectionError::Internal(msg.into())
    }
}

impl From<image::ImageError> for DetectionError {
    fn from(e: image::ImageError) -> Self {
        DetectionError::Validation(format!("failed to decode image: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, DetectionError>;
