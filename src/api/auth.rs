//! Login, session middleware and token refresh.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    Json,
};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{self, cookie, AuthError, SessionClaims};
use crate::db::{LoginRequest, LoginResponse, Role};
use crate::AppState;

use super::error::ApiError;
use super::extract::ApiJson;
use super::validation::parse_login;

/// Identity resolved by [`session_middleware`], available to every protected
/// handler as an extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CurrentUser {
    fn from_claims(claims: SessionClaims) -> Self {
        let expires_at = Some(claims.expires_at());
        Self {
            id: claims.sub,
            name: claims.name,
            email: claims.email,
            role: claims.role,
            expires_at,
        }
    }

    /// Fail with 403 unless the user's role passes `allowed`.
    pub fn require(&self, allowed: fn(&Role) -> bool) -> Result<(), ApiError> {
        if allowed(&self.role) {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.id, role = %self.role, "Forbidden");
            Err(ApiError::forbidden())
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(ApiError::unauthorized)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: CurrentUser,
    pub expires_at: Option<String>,
}

/// Sign a token for `user`, encrypt it and put it in the session cookie.
fn start_session(
    state: &AppState,
    headers: &HeaderMap,
    jar: CookieJar,
    user: &CurrentUser,
) -> Result<(CookieJar, DateTime<Utc>), ApiError> {
    let issued = state
        .keys
        .issue(&user.id, &user.name, &user.email, user.role)?;
    let sealed = state.codec.encrypt(&issued.token)?;

    let secure = state.config.auth.secure_cookies || cookie::is_https(headers);
    let jar = jar.add(cookie::session_cookie(sealed, secure, state.keys.ttl()));

    Ok((jar, issued.expires_at))
}

/// `POST /login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let payload = parse_login(request)?;

    let authenticated = auth::authenticate(&state.db, &payload.email, &payload.password)
        .await
        .map_err(|e| match e {
            AuthError::InvalidCredentials => {
                tracing::info!("Failed login attempt");
                ApiError::invalid_credentials()
            }
            AuthError::Database(e) => ApiError::from(e),
        })?;

    let profile = authenticated.profile;
    let current = CurrentUser {
        id: authenticated.user_id,
        name: profile.name.clone(),
        email: profile.email.clone(),
        role: profile.role,
        expires_at: None,
    };
    let (jar, _) = start_session(&state, &headers, jar, &current)?;

    tracing::info!(user_id = %current.id, role = %current.role, "User logged in");

    Ok((jar, Json(LoginResponse { user: profile })))
}

/// `GET /session`: the current identity and when its token expires.
pub async fn session(user: CurrentUser) -> Json<SessionResponse> {
    let expires_at = user.expires_at.map(|t| t.to_rfc3339());
    Json(SessionResponse { user, expires_at })
}

/// `POST /refresh`: re-issue the token and cookie for the current identity.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    user: CurrentUser,
) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    let (jar, expires_at) = start_session(&state, &headers, jar, &user)?;

    tracing::debug!(user_id = %user.id, "Session refreshed");

    Ok((
        jar,
        Json(SessionResponse {
            user: CurrentUser {
                expires_at: Some(expires_at),
                ..user
            },
            expires_at: Some(expires_at.to_rfc3339()),
        }),
    ))
}

/// Bearer token from the `Authorization` header, if any.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verify the session token and attach the [`CurrentUser`].
///
/// The token comes from `Authorization: Bearer` (gateway calls) or from the
/// encrypted `token` cookie (direct browser calls). Any failure is a 401 and
/// the store is never consulted.
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = match bearer_token(request.headers()) {
        Some(token) => token.to_string(),
        None => {
            let sealed = jar
                .get(cookie::SESSION_COOKIE)
                .map(|c| c.value())
                .filter(|v| !v.is_empty())
                .ok_or_else(ApiError::unauthorized)?;
            state.codec.decrypt(sealed).map_err(|e| {
                tracing::debug!("Rejected session cookie: {}", e);
                ApiError::unauthorized()
            })?
        }
    };

    let claims = state.keys.verify(&token)?;
    request
        .extensions_mut()
        .insert(CurrentUser::from_claims(claims));

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_require_role() {
        let user = CurrentUser {
            id: "u1".into(),
            name: "Tess".into(),
            email: "tess@example.com".into(),
            role: Role::Technician,
            expires_at: None,
        };
        assert!(user.require(Role::can_run_end_of_day).is_err());

        let controller = CurrentUser {
            role: Role::JobController,
            ..user
        };
        assert!(controller.require(Role::can_run_end_of_day).is_ok());
    }
}
