//! The `token` session cookie.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::OffsetDateTime;

pub const SESSION_COOKIE: &str = "token";

/// True when the request reached us over HTTPS through a terminating proxy.
pub fn is_https(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(|proto| proto.eq_ignore_ascii_case("https"))
        .unwrap_or(false)
}

/// Session cookie carrying the encrypted token.
pub fn session_cookie(value: String, secure: bool, max_age: chrono::Duration) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(max_age.num_seconds()))
        .build()
}

/// Cookie that clears the session: empty value, `Max-Age=0`, epoch expiry.
pub fn cleared_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc".into(), false, chrono::Duration::hours(1));
        let header = cookie.to_string();
        assert!(header.starts_with("token=abc"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("SameSite=Lax"));
        assert!(header.contains("Path=/"));
        assert!(header.contains("Max-Age=3600"));
        assert!(!header.contains("Secure"));
    }

    #[test]
    fn test_cleared_cookie() {
        let header = cleared_session_cookie(true).to_string();
        assert!(header.starts_with("token=;"));
        assert!(header.contains("Max-Age=0"));
        assert!(header.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
        assert!(header.contains("Secure"));
    }

    #[test]
    fn test_is_https() {
        let mut headers = HeaderMap::new();
        assert!(!is_https(&headers));
        headers.insert("x-forwarded-proto", "HTTPS".parse().unwrap());
        assert!(is_https(&headers));
        headers.insert("x-forwarded-proto", "http".parse().unwrap());
        assert!(!is_https(&headers));
    }
}
