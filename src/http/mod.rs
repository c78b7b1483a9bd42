//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, route split)
//!     → websocket.rs, for upgrades under the mount prefix
//!         → affinity table → one backend → bidirectional relay
//!     → proxy.rs, for everything else
//!         → request.rs (buffer, build upstream request)
//!         → ranked attempts with failover
//!         → response.rs (strip framing headers, 502 on exhaustion)
//! ```

pub mod proxy;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use proxy::{forward_http, AttemptError};
pub use request::X_REQUEST_ID;
pub use response::ALL_BACKENDS_UNAVAILABLE;
pub use server::{AppState, HttpServer};
