//! Session-affine reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌───────────────────────────────────────────────┐
//!                     │                 AFFINITY PROXY                 │
//!   Client request    │  ┌────────┐   ┌──────────┐   ┌─────────────┐  │
//!   ──────────────────┼─▶│  http  │──▶│ routing  │──▶│load_balancer│  │
//!                     │  │ server │   │ session/ │   │ registry +  │  │
//!                     │  └───┬────┘   │ affinity │   │  scoring    │  │
//!                     │      │        └──────────┘   └──────┬──────┘  │
//!                     │      ▼                              ▼         │
//!   Client response   │  ┌────────────────────┐   ┌─────────────────┐ │
//!   ◀─────────────────┼──│ proxy (failover) / │◀──│ backend attempt │◀┼── Backend pool
//!                     │  │ websocket (relay)  │   │  (AttemptGuard) │ │
//!                     │  └────────────────────┘   └─────────────────┘ │
//!                     │   config · observability · lifecycle · admin  │
//!                     └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use affinity_proxy::config::{read_config, validate_config, ConfigError, ProxyConfig};
use affinity_proxy::lifecycle::{shutdown_signal, Shutdown};
use affinity_proxy::observability::{logging, metrics};
use affinity_proxy::HttpServer;
use clap::Parser;
use tokio::net::TcpListener;

#[derive(Debug, Parser)]
#[command(name = "affinity-proxy")]
#[command(about = "HTTP/WebSocket reverse proxy with failure-scored routing and session affinity", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listener bind address, overrides the config file.
    #[arg(short, long)]
    bind: Option<String>,

    /// Backend `host:port`; repeat for each backend. Replaces the configured pool.
    #[arg(long = "backend")]
    backends: Vec<String>,

    /// Log level when RUST_LOG is unset.
    #[arg(long)]
    log_level: Option<String>,

    /// Runtime worker threads (1 = single-threaded).
    #[arg(long)]
    worker_threads: Option<usize>,
}

impl Cli {
    fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if !self.backends.is_empty() {
            config = config.with_backends(self.backends);
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if let Some(threads) = self.worker_threads {
            config.listener.worker_threads = threads;
        }
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;
    logging::init_logging(&config.observability);

    let runtime = if config.listener.worker_threads <= 1 {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
    } else {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.listener.worker_threads)
            .enable_all()
            .build()?
    };

    runtime.block_on(run(config))
}

async fn run(config: ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("affinity-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = ?config.backends.iter().map(|b| b.address.as_str()).collect::<Vec<_>>(),
        worker_threads = config.listener.worker_threads,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    let server_shutdown = shutdown.subscribe();

    let signals = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signals.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
