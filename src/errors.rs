use axum::{http::StatusCode, Json};
use serde_json::json;
use thiserror::Error;

/// Failures raised by the forecasting engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    #[error("insufficient data: need at least {required}, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("model fit failed: {0}")]
    ModelFitFailure(String),

    #[error("unknown site: {0}")]
    KeyNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, ForecastError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl From<ForecastError> for AppError {
    fn from(err: ForecastError) -> Self {
        let status = match err {
            ForecastError::KeyNotFound(_) | ForecastError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            ForecastError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ForecastError::ModelFitFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal(err)
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
