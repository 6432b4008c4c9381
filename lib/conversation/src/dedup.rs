//! Bounded set of recently processed inbound message ids.
//!
//! Process-local and best-effort: a restart forgets every id. Eviction is
//! FIFO by insertion order.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default number of ids tracked.
pub const DEFAULT_DEDUP_CAPACITY: usize = 1000;

#[derive(Debug, Default)]
struct Tracked {
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl Tracked {
    fn insert(&mut self, id: &str, capacity: usize) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        self.ids.insert(id.to_string());
        self.order.push_back(id.to_string());
        while self.order.len() > capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        true
    }
}

/// Tracks recently seen external message ids.
///
/// Safe to share across tasks; lookups and insertions are serialized by a
/// single mutex.
#[derive(Debug)]
pub struct Deduplicator {
    capacity: usize,
    tracked: Mutex<Tracked>,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}

impl Deduplicator {
    /// Creates a deduplicator tracking at most `capacity` ids.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tracked: Mutex::new(Tracked::default()),
        }
    }

    /// Returns the configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // A panic while holding the lock cannot leave `Tracked` half-updated in
    // a way that matters here, so a poisoned lock is still used.
    fn tracked(&self) -> MutexGuard<'_, Tracked> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true if `id` is currently tracked.
    #[must_use]
    pub fn seen(&self, id: &str) -> bool {
        self.tracked().ids.contains(id)
    }

    /// Inserts `id`, evicting the oldest entries beyond capacity.
    ///
    /// Recording an id that is already tracked does not refresh its recency.
    pub fn record(&self, id: &str) {
        self.try_record(id);
    }

    /// Records `id` and returns true if it was not tracked before.
    ///
    /// Check and insert happen under one lock, so two concurrent deliveries
    /// of the same id cannot both pass.
    pub fn try_record(&self, id: &str) -> bool {
        self.tracked().insert(id, self.capacity)
    }

    /// Returns the number of tracked ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracked().order.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
