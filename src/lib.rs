//! Session-affine HTTP/WebSocket reverse proxy library.
//!
//! Routes each request to the backend with the lowest failure score and
//! load, fails over across the pool for HTTP, and pins WebSocket sessions to
//! one backend by session cookie.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
