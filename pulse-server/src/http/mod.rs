//! HTTP server module

mod api;

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::{Router, routing::get};
use tower_http::cors::{AllowHeaders, CorsLayer};

use crate::{FeedState, ServerError};

pub use api::HealthResponse;

/// Create the router with all routes configured
pub fn create_router(state: Arc<FeedState>) -> Router {
    Router::new()
        .route("/ws", get(crate::ws::ws_handler))
        .route("/api/health", get(api::health))
        .with_state(state)
}

/// CORS layer admitting a single browser origin, credentials included
pub fn cors_layer(allowed_origin: &str) -> Result<CorsLayer, ServerError> {
    let origin = HeaderValue::from_str(allowed_origin)
        .map_err(|_| ServerError::InvalidOrigin(allowed_origin.to_string()))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}
