//! # places-api
//!
//! HTTP surface of the places service: place search, city and district
//! counts, and a health probe. All store access goes through a
//! [`PlaceReader`], so the router runs unchanged against a fake in tests.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use places_db::PlaceReader;

pub use config::{AllowedOrigins, ApiConfig};
pub use error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub reader: Arc<dyn PlaceReader>,
    /// Required `X-API-Key` value, if any.
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(reader: Arc<dyn PlaceReader>) -> Self {
        Self {
            reader,
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(auth::API_KEY_HEADER),
        ])
        .max_age(Duration::from_secs(3600));

    match origins {
        AllowedOrigins::Any => layer.allow_origin(Any),
        AllowedOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(v) => Some(v),
                    Err(e) => {
                        tracing::warn!("Invalid CORS origin '{}': {}", origin, e);
                        None
                    }
                })
                .collect();
            layer
                .allow_origin(AllowOrigin::list(values))
                .allow_credentials(true)
        }
    }
}

/// Build the application router.
///
/// `/health` is always open; `/api/*` requires the API key when one is set.
pub fn router(state: AppState, origins: &AllowedOrigins) -> Router {
    let api = Router::new()
        .route("/api/places", get(handlers::search_places))
        .route("/api/cities", get(handlers::list_cities))
        .route("/api/districts", get(handlers::list_districts))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(origins))
        .with_state(state)
}
