//! Session routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → session.rs (extract session key from the cookie header)
//!     → affinity.rs (session key → backend, WebSocket stickiness)
//! ```
//!
//! # Design Decisions
//! - Session keys are routing hints only; never validated or authenticated
//! - Affinity entries live for the process lifetime (no eviction)
//! - Only the WebSocket path treats an affinity hit as binding

pub mod affinity;
pub mod session;

pub use affinity::AffinityTable;
pub use session::SessionKey;
