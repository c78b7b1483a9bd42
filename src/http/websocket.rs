//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Detect WebSocket upgrade requests under the mount prefix
//! - Pick the session's backend (affinity first) and connect upstream
//! - Complete the upgrade handshake with the client
//! - Bidirectional frame forwarding until either side closes
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Proxy ←──── WebSocket frames ────→ Backend
//! ```
//!
//! # Design Decisions
//! - Upstream is connected before the client upgrade; a failed or timed-out
//!   connect penalizes the backend and answers 502
//! - Only the `cookie` header is forwarded upstream
//! - One backend per connection, no failover mid-session
//! - Text and binary frames are relayed; ping/pong are answered per hop
//! - A close or error on either side ends the relay and closes both

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket},
        FromRequestParts, State, WebSocketUpgrade,
    },
    http::{
        header::{COOKIE, UPGRADE},
        HeaderMap, Request, StatusCode,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    tungstenite::{self, client::IntoClientRequest},
    MaybeTlsStream, WebSocketStream,
};
use uuid::Uuid;

use crate::http::proxy::forward_http;
use crate::http::server::AppState;
use crate::load_balancer::Backend;
use crate::observability::metrics;
use crate::routing::SessionKey;

type Upstream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Error establishing the upstream side of a relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("upstream websocket failed: {0}")]
    Upstream(#[from] tungstenite::Error),
    #[error("upstream websocket handshake timed out after {0:?}")]
    Timeout(Duration),
}

/// True when the request asks for a WebSocket upgrade.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    headers
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Handler for paths under the WebSocket mount prefix.
///
/// Plain HTTP requests on these paths are forwarded like any other request.
pub async fn websocket_entry(State(state): State<AppState>, request: Request<Body>) -> Response {
    if !is_upgrade_request(request.headers()) {
        return forward_http(&state, request).await;
    }

    let (mut parts, _body) = request.into_parts();
    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let relay_id = Uuid::new_v4();
    let session = SessionKey::from_headers(&parts.headers, &state.config.affinity.cookie_name);
    let Some(backend) = choose_backend(&state, session.clone()) else {
        return (StatusCode::BAD_GATEWAY, "No backend available.").into_response();
    };

    let url = backend.ws_url(parts.uri.path(), parts.uri.query());
    tracing::info!(
        relay_id = %relay_id,
        backend = %backend,
        session = ?session.as_ref().map(SessionKey::as_str),
        url = %url,
        "Forwarding websocket connection"
    );

    let connect_timeout = Duration::from_secs(state.config.timeouts.connect_secs);
    let upstream = match connect_upstream(&url, &parts.headers, connect_timeout).await {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::warn!(relay_id = %relay_id, backend = %backend, error = %e, "Upstream websocket connect failed");
            state.registry.record_failure(&backend);
            return (StatusCode::BAD_GATEWAY, "Backend WebSocket unavailable.").into_response();
        }
    };

    let idle_timeout = state.config.websocket.idle_timeout_secs.map(Duration::from_secs);
    upgrade.on_upgrade(move |socket| async move {
        relay(socket, upstream, idle_timeout, relay_id).await;
    })
}

/// Affinity hit, or the registry's deterministic top candidate.
///
/// A session without an entry is bound to the chosen backend; requests
/// without a session are routed but never recorded.
fn choose_backend(state: &AppState, session: Option<SessionKey>) -> Option<Arc<Backend>> {
    match session {
        Some(key) => state
            .affinity
            .lookup_or_bind(key, || state.registry.preferred()),
        None => state.registry.preferred(),
    }
}

async fn connect_upstream(
    url: &str,
    headers: &HeaderMap,
    timeout: Duration,
) -> Result<Upstream, RelayError> {
    let mut request = url.into_client_request()?;
    for cookie in headers.get_all(COOKIE) {
        request.headers_mut().append(COOKIE, cookie.clone());
    }
    let (stream, _response) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request))
        .await
        .map_err(|_| RelayError::Timeout(timeout))??;
    Ok(stream)
}

/// What to do with one received frame.
#[derive(Debug, PartialEq)]
enum Relayed<M> {
    Forward(M),
    Skip,
    Close,
}

fn client_to_backend(message: Message) -> Relayed<tungstenite::Message> {
    match message {
        Message::Text(text) => Relayed::Forward(tungstenite::Message::Text(text.as_str().to_owned().into())),
        Message::Binary(data) => Relayed::Forward(tungstenite::Message::Binary(data)),
        Message::Ping(_) | Message::Pong(_) => Relayed::Skip,
        Message::Close(_) => Relayed::Close,
    }
}

fn backend_to_client(message: tungstenite::Message) -> Relayed<Message> {
    match message {
        tungstenite::Message::Text(text) => Relayed::Forward(Message::Text(text.as_str().to_owned().into())),
        tungstenite::Message::Binary(data) => Relayed::Forward(Message::Binary(data)),
        tungstenite::Message::Ping(_)
        | tungstenite::Message::Pong(_)
        | tungstenite::Message::Frame(_) => Relayed::Skip,
        tungstenite::Message::Close(_) => Relayed::Close,
    }
}

/// Why a relay stopped.
#[derive(Debug)]
enum Halt {
    ClientClosed,
    BackendClosed,
    ClientError(axum::Error),
    BackendError(tungstenite::Error),
    Idle(Duration),
}

async fn idle(timeout: Option<Duration>) {
    match timeout {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

/// Relay frames both ways until either side closes.
///
/// Each iteration races the next client frame against the next backend
/// frame. `StreamExt::next` is cancel-safe, so the losing read is dropped
/// without consuming a partial frame and is re-issued on the next pass.
async fn relay(client: WebSocket, upstream: Upstream, idle_timeout: Option<Duration>, relay_id: Uuid) {
    metrics::websocket_opened();
    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let halt = loop {
        tokio::select! {
            frame = client_rx.next() => {
                let message = match frame {
                    None => break Halt::ClientClosed,
                    Some(Err(e)) => break Halt::ClientError(e),
                    Some(Ok(message)) => message,
                };
                match client_to_backend(message) {
                    Relayed::Forward(message) => {
                        tracing::trace!(relay_id = %relay_id, "Srv <-- Cli");
                        if let Err(e) = upstream_tx.send(message).await {
                            break Halt::BackendError(e);
                        }
                        metrics::record_frame("upstream");
                    }
                    Relayed::Skip => {}
                    Relayed::Close => break Halt::ClientClosed,
                }
            }
            frame = upstream_rx.next() => {
                let message = match frame {
                    None => break Halt::BackendClosed,
                    Some(Err(e)) => break Halt::BackendError(e),
                    Some(Ok(message)) => message,
                };
                match backend_to_client(message) {
                    Relayed::Forward(message) => {
                        tracing::trace!(relay_id = %relay_id, "Srv --> Cli");
                        if let Err(e) = client_tx.send(message).await {
                            break Halt::ClientError(e);
                        }
                        metrics::record_frame("downstream");
                    }
                    Relayed::Skip => {}
                    Relayed::Close => break Halt::BackendClosed,
                }
            }
            _ = idle(idle_timeout) => break Halt::Idle(idle_timeout.unwrap_or_default()),
        }
    };

    match &halt {
        Halt::ClientError(e) => tracing::warn!(relay_id = %relay_id, error = %e, "Client websocket error"),
        Halt::BackendError(e) => tracing::warn!(relay_id = %relay_id, error = %e, "Backend websocket error"),
        Halt::Idle(d) => tracing::info!(relay_id = %relay_id, idle = ?d, "Websocket relay idle, closing"),
        Halt::ClientClosed | Halt::BackendClosed => {
            tracing::debug!(relay_id = %relay_id, reason = ?halt, "Websocket relay finished")
        }
    }

    // Both halves are closed on every exit path; errors here only mean the
    // peer is already gone.
    let _ = client_tx.close().await;
    let _ = upstream_tx.close().await;
    metrics::websocket_closed();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::HeaderValue;

    #[test]
    fn detects_upgrade_header() {
        let mut headers = HeaderMap::new();
        assert!(!is_upgrade_request(&headers));
        headers.insert(UPGRADE, HeaderValue::from_static("h2c"));
        assert!(!is_upgrade_request(&headers));
        headers.insert(UPGRADE, HeaderValue::from_static("WebSocket"));
        assert!(is_upgrade_request(&headers));
    }

    #[test]
    fn data_frames_cross_over() {
        assert_eq!(
            client_to_backend(Message::Text("ping".into())),
            Relayed::Forward(tungstenite::Message::Text("ping".into()))
        );
        assert_eq!(
            backend_to_client(tungstenite::Message::Binary(Bytes::from_static(b"\x01\x02"))),
            Relayed::Forward(Message::Binary(Bytes::from_static(b"\x01\x02")))
        );
    }

    #[test]
    fn control_frames_stay_per_hop() {
        assert_eq!(client_to_backend(Message::Ping(Bytes::new())), Relayed::Skip);
        assert_eq!(backend_to_client(tungstenite::Message::Pong(Bytes::new())), Relayed::Skip);
        assert_eq!(client_to_backend(Message::Close(None)), Relayed::Close);
        assert_eq!(backend_to_client(tungstenite::Message::Close(None)), Relayed::Close);
    }
}
