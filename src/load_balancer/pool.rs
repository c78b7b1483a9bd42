//! Backend registry.
//!
//! # Responsibilities
//! - Own the static backend pool and its live counters
//! - Rank backends for routing decisions
//! - Provide attempt guards that keep load counters balanced

use std::ops::Deref;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::config::{BackendConfig, ScoringConfig};
use crate::load_balancer::{
    backend::Backend, scoring::FailureThenLoad, BackendScore, RegistryError, SelectionPolicy,
};
use crate::observability::metrics;

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    in_flight: u32,
    failure_score: u32,
}

/// Point-in-time view of one backend's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendSnapshot {
    pub address: String,
    pub failure_score: u32,
    pub in_flight: u32,
}

/// The static backend pool and its shared counters.
///
/// Every counter mutation is one short critical section on a single
/// process-wide mutex. The lock is never held across an await point.
#[derive(Debug)]
pub struct BackendRegistry {
    backends: Vec<Arc<Backend>>,
    counters: Mutex<Vec<Counters>>,
    policy: Box<dyn SelectionPolicy>,
    scoring: ScoringConfig,
}

impl BackendRegistry {
    /// Build the registry from configuration.
    pub fn new(configs: &[BackendConfig], scoring: ScoringConfig) -> Result<Self, RegistryError> {
        Self::from_addresses(configs.iter().map(|c| c.address.as_str()), scoring)
    }

    /// Build the registry from `host:port` authorities.
    pub fn from_addresses<I, S>(addresses: I, scoring: ScoringConfig) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backends = addresses
            .into_iter()
            .enumerate()
            .map(|(id, address)| Backend::new(id, address).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        if backends.is_empty() {
            return Err(RegistryError::Empty);
        }
        let counters = Mutex::new(vec![Counters::default(); backends.len()]);
        Ok(Self {
            backends,
            counters,
            policy: Box::new(FailureThenLoad::randomized()),
            scoring,
        })
    }

    /// Replace the policy used by [`rank`](Self::rank).
    pub fn with_policy(mut self, policy: impl SelectionPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    /// Current counters for every backend.
    pub fn scores(&self) -> Vec<BackendScore> {
        let counters = self.counters.lock().expect("registry mutex poisoned");
        counters
            .iter()
            .enumerate()
            .map(|(id, c)| BackendScore {
                id,
                failure_score: c.failure_score,
                in_flight: c.in_flight,
            })
            .collect()
    }

    /// Candidate order for one HTTP routing decision, best first.
    pub fn rank(&self) -> Vec<Arc<Backend>> {
        self.rank_with(self.policy.as_ref())
    }

    /// Candidate order under an explicit policy.
    pub fn rank_with(&self, policy: &dyn SelectionPolicy) -> Vec<Arc<Backend>> {
        let scores = self.scores();
        policy
            .order(&scores)
            .into_iter()
            .filter_map(|id| self.backends.get(id).cloned())
            .collect()
    }

    /// Deterministic top candidate (lowest score, lowest load, pool order).
    pub fn preferred(&self) -> Option<Arc<Backend>> {
        self.rank_with(&FailureThenLoad::stable()).into_iter().next()
    }

    pub fn increment_load(&self, backend: &Backend) {
        self.update(|counters| {
            if let Some(c) = counters.get_mut(backend.id) {
                c.in_flight += 1;
            }
        });
    }

    pub fn decrement_load(&self, backend: &Backend) {
        self.update(|counters| decrement(counters, backend));
    }

    /// Add `amount` to a backend's failure score.
    pub fn penalize(&self, backend: &Backend, amount: u32) {
        self.update(|counters| {
            if let Some(c) = counters.get_mut(backend.id) {
                c.failure_score = c.failure_score.saturating_add(amount);
            }
        });
    }

    /// Apply the configured failure penalty.
    pub fn record_failure(&self, backend: &Backend) {
        metrics::record_attempt_failure(&backend.address);
        self.penalize(backend, self.scoring.failure_penalty);
    }

    /// Subtract `amount` from every failure score, floored at zero.
    pub fn decay_all(&self, amount: u32) {
        self.update(|counters| decay(counters, amount));
    }

    /// Count an attempt against `backend` until the returned guard drops.
    pub fn begin_attempt(self: &Arc<Self>, backend: Arc<Backend>) -> AttemptGuard {
        self.increment_load(&backend);
        AttemptGuard {
            registry: Arc::clone(self),
            backend,
        }
    }

    fn finish_attempt(&self, backend: &Backend) {
        let amount = self.scoring.decay_per_attempt;
        self.update(|counters| {
            decrement(counters, backend);
            decay(counters, amount);
        });
    }

    /// Point-in-time view of every backend's counters.
    pub fn snapshot(&self) -> Vec<BackendSnapshot> {
        let counters = self.counters.lock().expect("registry mutex poisoned");
        self.snapshot_of(&counters)
    }

    fn snapshot_of(&self, counters: &[Counters]) -> Vec<BackendSnapshot> {
        self.backends
            .iter()
            .zip(counters)
            .map(|(b, c)| BackendSnapshot {
                address: b.address.clone(),
                failure_score: c.failure_score,
                in_flight: c.in_flight,
            })
            .collect()
    }

    fn update(&self, f: impl FnOnce(&mut [Counters])) {
        let snapshot = {
            let mut counters = self.counters.lock().expect("registry mutex poisoned");
            f(&mut counters);
            self.snapshot_of(&counters)
        };
        metrics::record_backend_counters(&snapshot);
    }
}

fn decrement(counters: &mut [Counters], backend: &Backend) {
    if let Some(c) = counters.get_mut(backend.id) {
        if c.in_flight == 0 {
            tracing::error!(backend = %backend, "In-flight counter would go negative");
        } else {
            c.in_flight -= 1;
        }
    }
}

fn decay(counters: &mut [Counters], amount: u32) {
    for c in counters.iter_mut() {
        c.failure_score = c.failure_score.saturating_sub(amount);
    }
}

/// A RAII guard that counts one in-flight attempt against a backend.
///
/// Dropping the guard decrements the backend's load and decays every
/// backend's failure score, on success, failure and cancellation alike.
#[derive(Debug)]
pub struct AttemptGuard {
    registry: Arc<BackendRegistry>,
    backend: Arc<Backend>,
}

impl AttemptGuard {
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    /// Penalize this attempt's backend.
    pub fn fail(&self) {
        self.registry.record_failure(&self.backend);
    }
}

impl Deref for AttemptGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        self.registry.finish_attempt(&self.backend);
    }
}
