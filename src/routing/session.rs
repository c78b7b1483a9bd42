//! Session key extraction.

use std::fmt;

use axum::http::{header::COOKIE, HeaderMap};

/// Identifier of a client session, taken from a cookie.
///
/// Signed cookie values (`<id>.<signature>`) are cut at the first `.` so
/// only the identifier takes part in routing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    /// Extract the session key from every `cookie` header on a request.
    pub fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<Self> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|cookie| Self::from_cookie(cookie, cookie_name))
    }

    /// Extract the session key from a single `cookie` header value.
    pub fn from_cookie(cookie: &str, cookie_name: &str) -> Option<Self> {
        cookie.split(';').find_map(|entry| {
            let (name, value) = entry.trim().split_once('=')?;
            if name != cookie_name {
                return None;
            }
            let id = value.split('.').next().unwrap_or_default().trim();
            (!id.is_empty()).then(|| Self(id.to_string()))
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
