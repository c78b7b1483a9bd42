//! Failure-score ordering.
//!
//! Backends are ranked ascending by `(failure_score, in_flight, tiebreak)`.
//! The randomized variant draws a fresh tiebreak per ranking call so equally
//! scored backends share traffic; the stable variant breaks ties by pool
//! position.

use rand::Rng;

use crate::load_balancer::{BackendScore, SelectionPolicy};

/// How ties between identically scored backends are broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tiebreak {
    /// Fresh random value per backend per call.
    Random,
    /// Lower pool position first.
    PoolOrder,
}

/// Orders backends by failure score, then in-flight requests.
#[derive(Debug, Clone, Copy)]
pub struct FailureThenLoad {
    tiebreak: Tiebreak,
}

impl FailureThenLoad {
    pub fn randomized() -> Self {
        Self {
            tiebreak: Tiebreak::Random,
        }
    }

    pub fn stable() -> Self {
        Self {
            tiebreak: Tiebreak::PoolOrder,
        }
    }
}

impl Default for FailureThenLoad {
    fn default() -> Self {
        Self::randomized()
    }
}

impl SelectionPolicy for FailureThenLoad {
    fn order(&self, scores: &[BackendScore]) -> Vec<usize> {
        let mut keyed: Vec<(u32, u32, u64, usize)> = match self.tiebreak {
            Tiebreak::Random => {
                let mut rng = rand::thread_rng();
                scores
                    .iter()
                    .map(|s| (s.failure_score, s.in_flight, rng.gen::<u64>(), s.id))
                    .collect()
            }
            Tiebreak::PoolOrder => scores
                .iter()
                .map(|s| (s.failure_score, s.in_flight, s.id as u64, s.id))
                .collect(),
        };
        keyed.sort_unstable();
        keyed.into_iter().map(|(_, _, _, id)| id).collect()
    }
}
