//! Request handling and transformation.
//!
//! # Responsibilities
//! - Read the request ID assigned at the edge
//! - Buffer the inbound request so it can be replayed on another backend
//! - Build the upstream request for one backend attempt
//!
//! # Design Decisions
//! - Headers are forwarded verbatim except `accept-encoding`: response
//!   `content-encoding` is stripped before relaying, so backends must reply
//!   with identity-encoded bodies
//! - Large bodies are rejected before any backend is contacted

use axum::body::{Body, Bytes};
use axum::http::{header::ACCEPT_ENCODING, HeaderMap, Method, Request};

use crate::load_balancer::Backend;

pub const X_REQUEST_ID: &str = "x-request-id";

/// The request ID set by the request-ID layer, or `unknown`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// An inbound request held in memory for replay across attempts.
#[derive(Debug, Clone)]
pub struct BufferedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BufferedRequest {
    /// Read the whole inbound body, up to `limit` bytes.
    pub async fn from_request(request: Request<Body>, limit: usize) -> Result<Self, axum::Error> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, limit).await?;
        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            body,
        })
    }

    /// Build the request sent to `backend` for one attempt.
    pub fn to_upstream(&self, backend: &Backend) -> Result<Request<Body>, axum::http::Error> {
        let uri = backend.http_url(&self.path, self.query.as_deref());
        let mut builder = Request::builder().method(self.method.clone()).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in self.headers.iter() {
                if *name != ACCEPT_ENCODING {
                    headers.append(name.clone(), value.clone());
                }
            }
        }
        builder.body(Body::from(self.body.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{CONTENT_TYPE, COOKIE};

    fn inbound() -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/submit/form?draft=1&x=%20y")
            .header(COOKIE, "session=abc.def")
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT_ENCODING, "gzip, br")
            .header("x-custom", "a")
            .header("x-custom", "b")
            .body(Body::from(r#"{"k":1}"#))
            .unwrap()
    }

    #[tokio::test]
    async fn replays_request_against_backend() {
        let buffered = BufferedRequest::from_request(inbound(), 1024).await.unwrap();
        let backend = Backend::new(0, "localhost:8081").unwrap();

        for _ in 0..2 {
            let upstream = buffered.to_upstream(&backend).unwrap();
            assert_eq!(upstream.method(), Method::POST);
            assert_eq!(upstream.uri().to_string(), "http://localhost:8081/submit/form?draft=1&x=%20y");
            assert_eq!(upstream.headers()[COOKIE], "session=abc.def");
            assert_eq!(upstream.headers()[CONTENT_TYPE], "application/json");
            assert_eq!(upstream.headers().get_all("x-custom").iter().count(), 2);
            assert!(upstream.headers().get(ACCEPT_ENCODING).is_none());

            let body = axum::body::to_bytes(upstream.into_body(), 1024).await.unwrap();
            assert_eq!(&body[..], br#"{"k":1}"#);
        }
    }

    #[tokio::test]
    async fn rejects_oversized_body() {
        assert!(BufferedRequest::from_request(inbound(), 3).await.is_err());
    }

    #[test]
    fn request_id_fallback() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id(&headers), "unknown");
        headers.insert(X_REQUEST_ID, "4f1c".parse().unwrap());
        assert_eq!(request_id(&headers), "4f1c");
    }
}
