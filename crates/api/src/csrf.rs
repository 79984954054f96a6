//! Double-submit cookie CSRF protection for the dashboard forms.
//!
//! `GET /` issues a random token in the `jobrunner_csrf` cookie and embeds the
//! same token in every form as `_token`. A POST is accepted only when both are
//! present and equal.

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use uuid::Uuid;

pub const CSRF_COOKIE: &str = "jobrunner_csrf";
pub const CSRF_FIELD: &str = "_token";

/// Token carried by the request's `Cookie` header, if any.
pub fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == CSRF_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Token for the page being rendered: the existing cookie's, or a fresh one
/// together with the `Set-Cookie` value that issues it.
pub fn issue(headers: &HeaderMap) -> (String, Option<HeaderValue>) {
    if let Some(token) = cookie_token(headers) {
        return (token, None);
    }

    let token = Uuid::new_v4().simple().to_string();
    let cookie = format!("{CSRF_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict");
    // The token is hex only, so the header value is always valid.
    let value = HeaderValue::from_str(&cookie).ok();
    (token, value)
}

/// Check a submitted form token against the cookie.
pub fn verify(headers: &HeaderMap, submitted: Option<&str>) -> Result<(), StatusCode> {
    let expected = cookie_token(headers).ok_or(StatusCode::FORBIDDEN)?;
    let submitted = submitted.map(str::trim).unwrap_or_default();

    if submitted.is_empty() || !constant_time_eq(expected.as_bytes(), submitted.as_bytes()) {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn reads_token_among_other_cookies() {
        let headers = with_cookie("theme=dark; jobrunner_csrf=abc123; other=1");
        assert_eq!(cookie_token(&headers).as_deref(), Some("abc123"));
        assert_eq!(cookie_token(&HeaderMap::new()), None);
    }

    #[test]
    fn issue_reuses_existing_cookie() {
        let (token, set_cookie) = issue(&with_cookie("jobrunner_csrf=abc123"));
        assert_eq!(token, "abc123");
        assert!(set_cookie.is_none());
    }

    #[test]
    fn issue_mints_cookie_when_missing() {
        let (token, set_cookie) = issue(&HeaderMap::new());
        assert_eq!(token.len(), 32);
        let set_cookie = set_cookie.unwrap();
        let set_cookie = set_cookie.to_str().unwrap();
        assert!(set_cookie.starts_with(&format!("jobrunner_csrf={token};")));
        assert!(set_cookie.contains("SameSite=Strict"));
        assert!(set_cookie.contains("HttpOnly"));
    }

    #[test]
    fn verify_requires_matching_token() {
        let headers = with_cookie("jobrunner_csrf=abc123");
        assert!(verify(&headers, Some("abc123")).is_ok());
        assert_eq!(verify(&headers, Some("abc124")), Err(StatusCode::FORBIDDEN));
        assert_eq!(verify(&headers, None), Err(StatusCode::FORBIDDEN));
        assert_eq!(
            verify(&HeaderMap::new(), Some("abc123")),
            Err(StatusCode::FORBIDDEN)
        );
    }
}
