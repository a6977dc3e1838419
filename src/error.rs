use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::path::PathBuf;
use thiserror::Error;

use crate::models::ErrorResponse;

/// Raised when the model artifact cannot be turned into a runnable plan.
/// Fatal at startup: the server never binds without a model.
#[derive(Debug, Error)]
#[error("failed to load model from {}: {message}", .path.display())]
pub struct ModelLoadError {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InferenceError {
    #[error("features must be an array of numbers")]
    FeaturesNotArray,
    #[error("feature {index} is not a number: {value}")]
    InvalidFeature { index: usize, value: String },
    #[error("batch is empty")]
    EmptyBatch,
    #[error("row {row} has {found} features, expected {expected}")]
    RaggedBatch {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("model produced no output")]
    NoOutput,
    #[error("model produced no label for the input")]
    NoLabel,
    #[error("unsupported model output type {0}")]
    UnsupportedOutput(String),
    #[error("{0}")]
    Engine(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("unknown variant {0:?}, expected \"web\" or \"function\"")]
    UnknownVariant(String),
}

/// Request-level failures, each mapped to one status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing features")]
    MissingFeatures,
    #[error("Payload too large")]
    PayloadTooLarge,
    #[error("could not read request body: {0}")]
    Payload(String),
    // Engine text reaches the caller as-is.
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingFeatures | ApiError::Payload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse::new(self.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(
            ApiError::MissingFeatures.status_code(),
            StatusCode::BAD_REQUEST
        );
        let err = ApiError::from(InferenceError::Engine("shape mismatch".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "shape mismatch");
        assert_eq!(
            ApiError::PayloadTooLarge.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn load_error_names_the_path() {
        let err = ModelLoadError {
            path: PathBuf::from("model.onnx"),
            message: "No such file or directory".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to load model from model.onnx: No such file or directory"
        );
    }
}
