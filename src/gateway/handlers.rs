//! Browser-facing route handlers.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

use crate::api::error::NOT_FOUND;
use crate::api::ApiError;
use crate::auth::cookie::{cleared_session_cookie, is_https, SESSION_COOKIE};

use super::GatewayState;

pub const MANIFEST_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";
pub const MANIFEST_CONTENT_TYPE: &str = "application/manifest+json";

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub ok: bool,
}

fn transport_error(err: reqwest::Error) -> ApiError {
    error!("Backend call failed: {}", err);
    ApiError::server_error()
}

/// Forward a call on behalf of the session in the `token` cookie.
///
/// No cookie means 401 without contacting the backend. A cookie that does not
/// decrypt is a 500.
async fn forward_with_session(
    state: &GatewayState,
    jar: &CookieJar,
    method: Method,
    path_and_query: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let sealed = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value())
        .filter(|v| !v.is_empty())
        .ok_or_else(ApiError::unauthorized)?;
    let token = state.codec.decrypt(sealed)?;

    state
        .backend
        .forward(method, path_and_query, headers, Some(&token), body)
        .await
        .map_err(transport_error)
}

/// `POST /api/login`
pub async fn login(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    state
        .backend
        .forward(Method::POST, "/login", &headers, None, body)
        .await
        .map_err(transport_error)
}

/// `POST /api/logout`
pub async fn logout(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    let secure = state.config.auth.secure_cookies || is_https(&headers);
    (
        jar.add(cleared_session_cookie(secure)),
        Json(LogoutResponse { ok: true }),
    )
}

/// `POST /api/refresh-token`
pub async fn refresh_token(
    State(state): State<Arc<GatewayState>>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    forward_with_session(&state, &jar, Method::POST, "/refresh", &headers, body).await
}

/// `DELETE /api/appointments/delete-all-no-show`
pub async fn delete_all_no_show(
    State(state): State<Arc<GatewayState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    forward_with_session(
        &state,
        &jar,
        Method::DELETE,
        "/appointments/delete-all-no-show",
        &headers,
        Bytes::new(),
    )
    .await
}

/// `POST /api/job-orders/end-of-day`
pub async fn end_of_day(
    State(state): State<Arc<GatewayState>>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    forward_with_session(
        &state,
        &jar,
        Method::POST,
        "/job-orders/end-of-day",
        &headers,
        body,
    )
    .await
}

/// Turns the empty error replies of the manifest file service into the
/// usual `{error}` bodies.
pub async fn manifest_errors(response: Response) -> Response {
    match response.status() {
        StatusCode::NOT_FOUND => {
            warn!("Manifest file not found");
            ApiError::not_found("Manifest not found").into_response()
        }
        status if status.is_server_error() => {
            error!(status = %status, "Failed to serve manifest");
            ApiError::server_error().into_response()
        }
        _ => response,
    }
}

/// Any other `/api/*path`: forwarded to the backend's `/{path}`, query included.
pub async fn forward_api(
    State(state): State<Arc<GatewayState>>,
    jar: CookieJar,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Some(path) = uri.path().strip_prefix("/api/").filter(|p| !p.is_empty()) else {
        return Err(ApiError::not_found(NOT_FOUND));
    };

    let target = match uri.query() {
        Some(query) => format!("/{}?{}", path, query),
        None => format!("/{}", path),
    };

    forward_with_session(&state, &jar, method, &target, &headers, body).await
}
