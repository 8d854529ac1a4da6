//! Browser-facing gateway.
//!
//! Holds no session state of its own: the encrypted `token` cookie is
//! decrypted per request and sent to the backend as a bearer token.

mod handlers;
mod proxy;

pub use handlers::{LogoutResponse, MANIFEST_CACHE_CONTROL, MANIFEST_CONTENT_TYPE};
pub use proxy::BackendClient;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue},
    middleware,
    routing::{delete, get, get_service, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeFile;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::api::error;
use crate::config::Config;
use crate::crypto::TokenCodec;

pub struct GatewayState {
    pub config: Config,
    pub codec: TokenCodec,
    pub backend: BackendClient,
}

impl GatewayState {
    /// Fails when no session secret is configured.
    pub fn new(config: Config) -> Result<Self> {
        let codec = TokenCodec::from_secret(Some(config.require_secret()?))?;
        let backend = BackendClient::new(&config.gateway.backend_url)
            .context("Failed to build backend HTTP client")?;

        Ok(Self {
            config,
            codec,
            backend,
        })
    }
}

/// Static manifest with a long-lived cache header.
fn manifest_routes(path: &Path) -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/manifest", get_service(ServeFile::new(path)))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_TYPE,
            HeaderValue::from_static(MANIFEST_CONTENT_TYPE),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(MANIFEST_CACHE_CONTROL),
        ))
        .layer(middleware::map_response(handlers::manifest_errors))
}

pub fn create_router(state: Arc<GatewayState>) -> Router {
    let manifest = manifest_routes(&state.config.gateway.manifest_path);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/login", post(handlers::login))
        .route("/api/logout", post(handlers::logout))
        .route("/api/refresh-token", post(handlers::refresh_token))
        .route(
            "/api/appointments/delete-all-no-show",
            delete(handlers::delete_all_no_show),
        )
        .route("/api/job-orders/end-of-day", post(handlers::end_of_day))
        .merge(manifest)
        // Every other /api/* call is proxied as-is
        .fallback(handlers::forward_api)
        .method_not_allowed_fallback(error::method_not_allowed)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
