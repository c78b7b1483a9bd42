//! Session affinity table.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::load_balancer::Backend;
use crate::routing::SessionKey;

/// Maps session keys to the backend that first served them.
///
/// Reads take a shared shard lock; writes take that shard exclusively.
/// Entries are never evicted.
#[derive(Debug, Default)]
pub struct AffinityTable {
    entries: DashMap<SessionKey, Arc<Backend>>,
}

impl AffinityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &SessionKey) -> Option<Arc<Backend>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Associate `key` with `backend`, replacing any previous binding.
    pub fn bind(&self, key: SessionKey, backend: Arc<Backend>) {
        self.entries.insert(key, backend);
    }

    /// Return the bound backend, or bind the one produced by `choose`.
    ///
    /// The shard stays locked between the miss and the bind, so concurrent
    /// first connections of one session agree on a backend.
    pub fn lookup_or_bind(
        &self,
        key: SessionKey,
        choose: impl FnOnce() -> Option<Arc<Backend>>,
    ) -> Option<Arc<Backend>> {
        match self.entries.entry(key) {
            Entry::Occupied(entry) => Some(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let backend = choose()?;
                entry.insert(Arc::clone(&backend));
                Some(backend)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
