//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: WebSocket mount prefix plus an HTTP fallback
//! - Wire up middleware (request ID, tracing)
//! - Own the shared registry, affinity table and upstream client
//! - Serve until the shutdown broadcast fires

use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::HeaderName, routing::any, Router};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin;
use crate::config::ProxyConfig;
use crate::http::proxy::http_handler;
use crate::http::request::X_REQUEST_ID;
use crate::http::websocket::websocket_entry;
use crate::lifecycle::shutdown::triggered;
use crate::load_balancer::{BackendRegistry, RegistryError};
use crate::routing::AffinityTable;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<BackendRegistry>,
    pub affinity: Arc<AffinityTable>,
    pub client: Client<HttpConnector, Body>,
    pub config: Arc<ProxyConfig>,
}

impl AppState {
    pub fn new(config: ProxyConfig) -> Result<Self, RegistryError> {
        let registry = Arc::new(BackendRegistry::new(&config.backends, config.scoring.clone())?);

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            registry,
            affinity: Arc::new(AffinityTable::new()),
            client,
            config: Arc::new(config),
        })
    }
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given (validated) configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, RegistryError> {
        let state = AppState::new(config)?;
        let router = Self::build_router(state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// There is no router-wide timeout: the HTTP deadline is enforced by the
    /// failover loop so cut-off attempts are scored, and the WebSocket
    /// handshake has its own connect timeout.
    fn build_router(state: AppState) -> Router {
        let prefix = state.config.websocket.mount_prefix.clone();
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        Router::new()
            .route(&prefix, any(websocket_entry))
            .route(&format!("{}/{{*path}}", prefix), any(websocket_entry))
            .fallback(http_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(request_id)),
            )
    }

    pub fn registry(&self) -> Arc<BackendRegistry> {
        Arc::clone(&self.state.registry)
    }

    pub fn affinity(&self) -> Arc<AffinityTable> {
        Arc::clone(&self.state.affinity)
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.state.config
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.state.registry.backends().len(),
            websocket_prefix = %self.state.config.websocket.mount_prefix,
            "HTTP server starting"
        );

        if self.state.config.admin.enabled {
            let admin_listener = TcpListener::bind(&self.state.config.admin.bind_address).await?;
            let admin_state = admin::AdminState::from(&self.state);
            let admin_shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                if let Err(e) = admin::serve(admin_listener, admin_state, admin_shutdown).await {
                    tracing::error!(error = %e, "Admin server failed");
                }
            });
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(triggered(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
