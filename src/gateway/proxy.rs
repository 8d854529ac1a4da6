// Backend client for the gateway
//
// Forwards browser calls to the backend API and turns the backend's reply
// back into an axum response, keeping status, body, content type and
// Set-Cookie as they were.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method},
    response::Response,
};
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

/// Request headers copied from the browser call to the backend call.
const FORWARDED_REQUEST_HEADERS: &[&str] = &["content-type", "accept", "x-forwarded-proto"];

/// HTTP client bound to the backend base URL.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("shopfloor-gateway/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Full backend URL for a path (with optional query string).
    pub fn url(&self, path_and_query: &str) -> String {
        if path_and_query.starts_with('/') {
            format!("{}{}", self.base_url, path_and_query)
        } else {
            format!("{}/{}", self.base_url, path_and_query)
        }
    }

    /// Send one call to the backend, optionally authenticated with a bearer
    /// token, and relay the reply.
    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        headers: &HeaderMap,
        bearer: Option<&str>,
        body: Bytes,
    ) -> Result<Response, reqwest::Error> {
        let url = self.url(path_and_query);
        debug!(method = %method, url = %url, "Forwarding to backend");

        let mut request = self.client.request(method, &url);
        for name in FORWARDED_REQUEST_HEADERS {
            if let Some(value) = headers.get(*name) {
                request = request.header(*name, value.clone());
            }
        }
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;
        relay(response).await
    }
}

/// Copy status, content type, Set-Cookie and body of a backend reply.
async fn relay(response: reqwest::Response) -> Result<Response, reqwest::Error> {
    let status = response.status();
    let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
    let cookies: Vec<HeaderValue> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .cloned()
        .collect();
    let body = response.bytes().await?;

    let mut relayed = Response::new(Body::from(body));
    *relayed.status_mut() = status;

    let headers = relayed.headers_mut();
    if let Some(content_type) = content_type {
        headers.insert(header::CONTENT_TYPE, content_type);
    }
    for cookie in cookies {
        headers.append(header::SET_COOKIE, cookie);
    }

    Ok(relayed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = BackendClient::new("http://127.0.0.1:8080/").unwrap();
        assert_eq!(
            client.url("/appointments?date=2024-05-06"),
            "http://127.0.0.1:8080/appointments?date=2024-05-06"
        );
        assert_eq!(client.url("login"), "http://127.0.0.1:8080/login");
    }
}
