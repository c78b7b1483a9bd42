//! Response handling and transformation.
//!
//! # Responsibilities
//! - Strip body framing and hop-by-hop headers the proxy may invalidate
//! - Produce the proxy's own error responses
//!
//! # Design Decisions
//! - Backend bodies are buffered, so `content-length` is recomputed and a
//!   backend's `transfer-encoding` never reaches the client
//! - Every other backend header (including `X-PORT`) passes through

use axum::{
    http::{
        header::{
            HeaderName, CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH, TE, TRAILER,
            TRANSFER_ENCODING, UPGRADE,
        },
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
};

pub const ALL_BACKENDS_UNAVAILABLE: &str = "All backends are unavailable.";

/// Headers that describe one connection hop and never outlive it.
const HOP_BY_HOP: [HeaderName; 5] = [CONNECTION, TE, TRAILER, TRANSFER_ENCODING, UPGRADE];

/// Remove `content-length`, `content-encoding` and hop-by-hop headers.
pub fn strip_framing_headers(headers: &mut HeaderMap) {
    headers.remove(CONTENT_LENGTH);
    headers.remove(CONTENT_ENCODING);
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
}

/// 502 returned once every candidate backend has failed.
pub fn all_backends_unavailable() -> Response {
    (StatusCode::BAD_GATEWAY, ALL_BACKENDS_UNAVAILABLE).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;

    #[test]
    fn strips_only_framing_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, "12".parse().unwrap());
        headers.insert(CONTENT_ENCODING, "gzip".parse().unwrap());
        headers.insert(CONTENT_TYPE, "text/html".parse().unwrap());
        headers.insert("x-port", "8082".parse().unwrap());
        headers.insert(TRANSFER_ENCODING, "chunked".parse().unwrap());
        headers.insert(CONNECTION, "keep-alive".parse().unwrap());
        headers.insert("keep-alive", "timeout=5".parse().unwrap());
        headers.insert(TRAILER, "x-checksum".parse().unwrap());

        strip_framing_headers(&mut headers);

        assert!(headers.get(CONTENT_LENGTH).is_none());
        assert!(headers.get(CONTENT_ENCODING).is_none());
        assert!(headers.get(TRANSFER_ENCODING).is_none());
        assert!(headers.get(CONNECTION).is_none());
        assert!(headers.get("keep-alive").is_none());
        assert!(headers.get(TRAILER).is_none());
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["x-port"], "8082");
        assert_eq!(headers[CONTENT_TYPE], "text/html");
    }

    #[tokio::test]
    async fn unavailable_is_plain_text_502() {
        let response = all_backends_unavailable();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.headers()[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], ALL_BACKENDS_UNAVAILABLE.as_bytes());
    }
}
