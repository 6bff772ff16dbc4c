use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::Error as CoreError;

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(err) => match err {
                CoreError::NodeNotFound(_) | CoreError::EdgeNotFound(_) => StatusCode::NOT_FOUND,
                CoreError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
                CoreError::DimensionMismatch { .. } | CoreError::DanglingReference(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                CoreError::DuplicateNode(_) => StatusCode::CONFLICT,
                CoreError::Embedding(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "code": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;
