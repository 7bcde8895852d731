//! Optional shared-key check on `/api/*` routes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

/// Request header carrying the key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests without the configured `X-API-Key`. Passes everything
/// through when no key is configured.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    match request.headers().get(API_KEY_HEADER) {
        None => {
            warn!(subsystem = "api", component = "auth", path = %request.uri().path(), "Missing API key");
            Err(ApiError::MissingApiKey)
        }
        Some(given) if given.as_bytes() == expected.as_bytes() => Ok(next.run(request).await),
        Some(_) => {
            warn!(subsystem = "api", component = "auth", path = %request.uri().path(), "Invalid API key");
            Err(ApiError::InvalidApiKey)
        }
    }
}
