//! HTTP forwarding with failover.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → buffer body (replayable)
//!     → registry.rank() (best candidate first)
//!     → for each candidate: AttemptGuard → forward → classify
//!         failure: penalize, next candidate
//!         success: strip framing headers, bind session, return
//!     → every candidate failed, or the request deadline passed: 502
//! ```
//!
//! `timeouts.request_secs` is one deadline for the whole request. Each
//! attempt gets `timeouts.upstream_secs` or whatever remains of it, so an
//! attempt cut short by the deadline is still scored as a failure.

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};

use crate::http::request::{request_id, BufferedRequest};
use crate::http::response::{all_backends_unavailable, strip_framing_headers};
use crate::http::server::AppState;
use crate::load_balancer::Backend;
use crate::observability::metrics;
use crate::routing::SessionKey;

/// Why a single backend attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("failed to build upstream request: {0}")]
    Request(#[from] axum::http::Error),
    #[error("transport error: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),
    #[error("backend responded {0}")]
    Status(StatusCode),
    #[error("failed to read response body: {0}")]
    Body(axum::Error),
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
}

/// Whether a backend status counts as a failed attempt.
///
/// 2xx and 3xx always succeed. With `client_errors_are_failures` off, 4xx
/// responses are passed to the caller as well.
pub fn is_backend_failure(status: StatusCode, client_errors_are_failures: bool) -> bool {
    if status.is_success() || status.is_redirection() {
        return false;
    }
    client_errors_are_failures || !status.is_client_error()
}

/// Fallback handler: forward any request to the pool.
pub async fn http_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    forward_http(&state, request).await
}

/// Forward one request, trying candidates in ranked order until one succeeds.
pub async fn forward_http(state: &AppState, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request_id(request.headers()).to_string();
    let method = request.method().to_string();
    let session = SessionKey::from_headers(request.headers(), &state.config.affinity.cookie_name);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(state.config.timeouts.request_secs);

    let limit = state.config.limits.max_request_body_bytes;
    let inbound = match tokio::time::timeout_at(deadline, BufferedRequest::from_request(request, limit)).await {
        Ok(Ok(inbound)) => inbound,
        Ok(Err(e)) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            metrics::record_request(&method, 413, "none", start);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large or unreadable.")
                .into_response();
        }
        Err(_) => {
            tracing::warn!(request_id = %request_id, "Timed out reading request body");
            metrics::record_request(&method, 408, "none", start);
            return (StatusCode::REQUEST_TIMEOUT, "Request body not received in time.").into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %inbound.method,
        path = %inbound.path,
        session = ?session.as_ref().map(SessionKey::as_str),
        "Proxying request"
    );

    let upstream_timeout = Duration::from_secs(state.config.timeouts.upstream_secs);
    for (attempt, backend) in state.registry.rank().into_iter().enumerate() {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            tracing::warn!(
                request_id = %request_id,
                attempts = attempt,
                "Request deadline reached before every backend was tried"
            );
            break;
        }
        let guard = state.registry.begin_attempt(backend);

        match attempt_once(state, &inbound, &guard, upstream_timeout.min(remaining)).await {
            Ok(response) => {
                if let Some(key) = &session {
                    state.affinity.bind(key.clone(), guard.backend().clone());
                }
                tracing::debug!(
                    request_id = %request_id,
                    backend = %guard.address,
                    attempt = attempt + 1,
                    status = %response.status(),
                    "Request served"
                );
                metrics::record_request(&method, response.status().as_u16(), &guard.address, start);
                return response;
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    backend = %guard.address,
                    attempt = attempt + 1,
                    error = %e,
                    "Backend attempt failed"
                );
                guard.fail();
            }
        }
    }

    tracing::error!(request_id = %request_id, path = %inbound.path, "All backends failed");
    metrics::record_request(&method, 502, "none", start);
    all_backends_unavailable()
}

async fn attempt_once(
    state: &AppState,
    inbound: &BufferedRequest,
    backend: &Backend,
    timeout: Duration,
) -> Result<Response, AttemptError> {
    let upstream = inbound.to_upstream(backend)?;
    let limit = state.config.limits.max_response_body_bytes;
    let client_errors_are_failures = state.registry.scoring().client_errors_are_failures;

    let exchange = async {
        let response = state.client.request(upstream).await?;
        let status = response.status();
        if is_backend_failure(status, client_errors_are_failures) {
            return Err(AttemptError::Status(status));
        }

        let (mut parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), limit)
            .await
            .map_err(AttemptError::Body)?;
        strip_framing_headers(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::from(body)))
    };

    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| AttemptError::Timeout(timeout))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_redirects_are_not_failures() {
        for code in [200, 201, 204, 301, 302, 304] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(!is_backend_failure(status, true), "{}", code);
        }
    }

    #[test]
    fn errors_are_failures_by_default() {
        for code in [400, 404, 429, 500, 502, 503] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(is_backend_failure(status, true), "{}", code);
        }
    }

    #[test]
    fn client_errors_can_pass_through() {
        assert!(!is_backend_failure(StatusCode::NOT_FOUND, false));
        assert!(!is_backend_failure(StatusCode::UNAUTHORIZED, false));
        assert!(is_backend_failure(StatusCode::INTERNAL_SERVER_ERROR, false));
        assert!(is_backend_failure(StatusCode::SERVICE_UNAVAILABLE, false));
    }
}
