//! Shared helpers for the HTTP-level tests.
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request},
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;

use shopfloor::auth::hash_password;
use shopfloor::config::Config;
use shopfloor::db::{self, NewUser, Role, User};
use shopfloor::AppState;

pub const SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "secret1";

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.secret = Some(SECRET.to_string());
    config
}

/// Backend state over a fresh in-memory database.
pub async fn backend_state() -> Arc<AppState> {
    let pool = db::init_in_memory().await.unwrap();
    Arc::new(AppState::new(test_config(), pool).unwrap())
}

pub async fn seed_user(state: &AppState, name: &str, email: &str, role: Role) -> User {
    User::create(
        &state.db,
        &NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: hash_password(PASSWORD).unwrap(),
            role,
            level: None,
            picture_url: Some(format!("/img/{}.png", name.to_lowercase())),
            break_times: vec![],
        },
    )
    .await
    .unwrap()
}

/// Signed (unencrypted) session token, as the gateway sends it.
pub fn bearer_for(state: &AppState, user: &User) -> String {
    state
        .keys
        .issue(&user.id, &user.name, &user.email, user.role())
        .unwrap()
        .token
}

/// Encrypted cookie value, as a browser holds it.
pub fn cookie_for(state: &AppState, user: &User) -> String {
    state.codec.encrypt(&bearer_for(state, user)).unwrap()
}

pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed(method: Method, uri: &str, token: &str, body: Option<&Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn with_cookie(method: Method, uri: &str, cookie: &str, body: Option<&Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, format!("token={}", cookie));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn read_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

/// Value of the `token` cookie set by a response, if any.
pub fn session_cookie_value(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.split(';').next()?.trim().strip_prefix("token=").map(str::to_string))
}
