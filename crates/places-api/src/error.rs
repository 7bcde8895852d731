//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use places_db::{Error, ValidationError};

/// Errors returned by handlers and middleware.
///
/// Rendered as `{"error": <code>, "message": <text>}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("missing API key; send it in the X-API-Key header")]
    MissingApiKey,
    #[error("invalid API key")]
    InvalidApiKey,
    #[error(transparent)]
    Store(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(v) => ApiError::Validation(v),
            other => ApiError::Store(other),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingApiKey | ApiError::InvalidApiKey => StatusCode::FORBIDDEN,
            ApiError::Store(Error::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(err) => err.code(),
            ApiError::MissingApiKey => "missing_api_key",
            ApiError::InvalidApiKey => "invalid_api_key",
            ApiError::Store(err) => err.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Store(err) => {
                error!(
                    subsystem = "api",
                    error_code = err.code(),
                    error = %err,
                    "Store request failed"
                );
                // Driver messages can carry connection details.
                "the place store could not complete the request".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(serde_json::json!({
            "error": self.code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}
