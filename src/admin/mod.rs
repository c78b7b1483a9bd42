//! Read-only status listener.
//!
//! Serves counter snapshots on a separate bind address. Disabled by default.
//!
//! - `GET /status`: version, pool size, affinity entries
//! - `GET /backends`: failure score and in-flight count per backend

pub mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::http::AppState;
use crate::lifecycle::shutdown::triggered;
use crate::load_balancer::BackendRegistry;
use crate::routing::AffinityTable;

/// State shared with admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<BackendRegistry>,
    pub affinity: Arc<AffinityTable>,
}

impl From<&AppState> for AdminState {
    fn from(state: &AppState) -> Self {
        Self {
            registry: Arc::clone(&state.registry),
            affinity: Arc::clone(&state.affinity),
        }
    }
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/status", get(handlers::get_status))
        .route("/backends", get(handlers::get_backends))
        .with_state(state)
}

pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin server starting");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(triggered(shutdown))
        .await
}
