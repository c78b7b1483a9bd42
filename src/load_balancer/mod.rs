//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → pool.rs (snapshot counters under the registry lock)
//!     → scoring.rs (order backends by failure score, then load)
//!     → pool.rs (AttemptGuard: +1 load, on drop -1 load and decay all)
//!     → backend.rs (forwarding URL for the chosen backend)
//! ```
//!
//! # Design Decisions
//! - The pool is static: built once from configuration
//! - All counters live behind one lock; it is never held across I/O
//! - Policies are pure functions of a counter snapshot

pub mod backend;
pub mod pool;
pub mod scoring;

pub use backend::Backend;
pub use pool::{AttemptGuard, BackendRegistry, BackendSnapshot};
pub use scoring::FailureThenLoad;

/// Counter values for one backend at the moment of a routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendScore {
    pub id: usize,
    pub failure_score: u32,
    pub in_flight: u32,
}

/// Orders backends for one routing decision.
pub trait SelectionPolicy: Send + Sync + std::fmt::Debug {
    /// Return backend ids, most preferred first. Every id appears once.
    fn order(&self, scores: &[BackendScore]) -> Vec<usize>;
}

/// Error building the backend registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("backend pool is empty")]
    Empty,
    #[error("invalid backend address `{address}`: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: url::ParseError,
    },
}
