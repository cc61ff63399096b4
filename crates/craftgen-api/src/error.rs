//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, warn};

/// Error returned by every handler, rendered as `{"error": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// A pipeline stage was called without usable inputs.
    #[error("{0}")]
    Unprocessable(String),
    /// A collaborator (model, retrieval, storage) failed.
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<craftgen_core::Error> for ApiError {
    fn from(err: craftgen_core::Error) -> Self {
        use craftgen_core::Error;

        let message = err.to_string();
        match err {
            Error::InvalidInput(_) => ApiError::BadRequest(message),
            Error::Unauthorized(_) => ApiError::Unauthorized(message),
            Error::Forbidden(_) => ApiError::Forbidden(message),
            Error::NotFound(_) | Error::SessionNotFound(_) => ApiError::NotFound(message),
            Error::Conflict(_) => ApiError::Conflict(message),
            Error::Precondition(_) => ApiError::Unprocessable(message),
            Error::Retrieval(_)
            | Error::StructuredGeneration(_)
            | Error::AssetTranscode(_)
            | Error::Inference(_)
            | Error::Embedding(_)
            | Error::Storage(_)
            | Error::Request(_) => ApiError::Upstream(message),
            _ => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = Json(serde_json::json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
