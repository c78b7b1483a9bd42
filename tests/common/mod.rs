//! Shared utilities for integration tests.
//!
//! Backends bind ephemeral ports and tag every HTTP response with an
//! `X-PORT` header naming the instance that served it.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use affinity_proxy::config::ProxyConfig;
use affinity_proxy::load_balancer::BackendRegistry;
use affinity_proxy::routing::AffinityTable;
use affinity_proxy::{HttpServer, Shutdown};
use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::{
    self,
    handshake::server::{ErrorResponse, Request as WsRequest, Response as WsResponse},
};

/// Start a backend whose responses are produced by `f`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let port = addr.port().to_string();

    let app = Router::new().fallback(move || {
        let f = f.clone();
        let port = port.clone();
        async move {
            let (status, body) = f().await;
            (StatusCode::from_u16(status).unwrap(), [("x-port", port)], body)
        }
    });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a backend that always answers 200 with `body`.
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move { (200, body.to_string()) }).await
}

/// Start a backend that describes the request it received.
///
/// The body is `METHOD URI`, then `cookie`, `x-custom` and `accept-encoding`
/// header values (or `-`), then the request body, one per line. The response
/// carries `content-encoding: identity`.
pub async fn start_inspecting_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let port = addr.port().to_string();

    let app = Router::new().fallback(move |request: Request<Body>| {
        let port = port.clone();
        async move {
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, 1024 * 1024).await.unwrap();
            let header = |name: &str| {
                parts
                    .headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-")
                    .to_string()
            };
            let description = format!(
                "{} {}\n{}\n{}\n{}\n{}",
                parts.method,
                parts.uri,
                header("cookie"),
                header("x-custom"),
                header("accept-encoding"),
                String::from_utf8_lossy(&body)
            );
            (
                StatusCode::OK,
                [("x-port", port), ("content-encoding", "identity".to_string())],
                description,
            )
        }
    });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a backend that streams `chunks` without a `content-length`, so the
/// response goes out with `transfer-encoding: chunked`.
pub async fn start_streaming_backend(chunks: &'static [&'static str]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let port = addr.port().to_string();

    let app = Router::new().fallback(move || {
        let port = port.clone();
        async move {
            let stream = futures_util::stream::iter(
                chunks.iter().map(|chunk| Ok::<_, std::io::Error>(*chunk)),
            );
            (StatusCode::OK, [("x-port", port)], Body::from_stream(stream))
        }
    });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a backend that accepts TCP connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A WebSocket backend.
///
/// Replies `pong` to `ping`, its port to `port`, closes on `bye` and
/// answers any other text with `echo:<text>`. Binary frames come back
/// reversed. Handshake headers are recorded and `closed` counts
/// connections that have ended.
pub struct WsBackend {
    pub addr: SocketAddr,
    pub handshakes: Arc<Mutex<Vec<HeaderMap>>>,
    pub closed: Arc<AtomicUsize>,
}

impl WsBackend {
    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

pub async fn start_ws_backend() -> WsBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handshakes = Arc::new(Mutex::new(Vec::new()));
    let closed = Arc::new(AtomicUsize::new(0));

    let seen = handshakes.clone();
    let ended = closed.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let seen = seen.clone();
            let ended = ended.clone();
            tokio::spawn(async move {
                let record = move |req: &WsRequest, resp: WsResponse| -> Result<WsResponse, ErrorResponse> {
                    seen.lock().unwrap().push(req.headers().clone());
                    Ok(resp)
                };
                let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, record).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    let reply = match message {
                        tungstenite::Message::Text(text) => match text.as_str() {
                            "ping" => "pong".to_string(),
                            "port" => addr.port().to_string(),
                            "bye" => {
                                let _ = ws.close(None).await;
                                break;
                            }
                            other => format!("echo:{}", other),
                        }
                        .into(),
                        tungstenite::Message::Binary(data) => {
                            let mut reversed = data.to_vec();
                            reversed.reverse();
                            tungstenite::Message::Binary(reversed.into())
                        }
                        tungstenite::Message::Close(_) => break,
                        _ => continue,
                    };
                    if ws.send(reply).await.is_err() {
                        break;
                    }
                }
                ended.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    WsBackend {
        addr,
        handshakes,
        closed,
    }
}

/// Default configuration pointed at `backends`.
pub fn config_for(backends: &[SocketAddr]) -> ProxyConfig {
    ProxyConfig::default().with_backends(backends.iter().map(ToString::to_string))
}

/// A proxy running in-process on an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub registry: Arc<BackendRegistry>,
    pub affinity: Arc<AffinityTable>,
    shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub fn in_flight(&self) -> Vec<u32> {
        self.registry.scores().iter().map(|s| s.in_flight).collect()
    }

    pub fn failure_scores(&self) -> Vec<u32> {
        self.registry.scores().iter().map(|s| s.failure_score).collect()
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    let registry = server.registry();
    let affinity = server.affinity();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestProxy {
        addr,
        registry,
        affinity,
        shutdown,
    }
}

/// HTTP client without connection reuse or system proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn port_of(response: &reqwest::Response) -> u16 {
    response.headers()["x-port"].to_str().unwrap().parse().unwrap()
}
