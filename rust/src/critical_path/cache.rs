//! Critical path cache for one scope.
//!
//! The cache lives next to the graph inside the scope state. Writers hold the
//! scope's write lock and clear it with [`CriticalPathCache::invalidate`];
//! readers hold the read lock and refill it on a miss. Entries also carry the
//! graph revision they were computed from and are never served for another.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::log_debug;

use super::calculation::calculate_critical_path;
use super::types::CriticalPath;

/// Hit/miss counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
pub struct CriticalPathCache {
    slot: Mutex<Option<Arc<CriticalPath>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CriticalPathCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached result for the graph's current revision, computing it on a miss.
    ///
    /// Concurrent readers that miss at the same time wait on the slot rather
    /// than computing twice.
    pub fn get_or_compute(
        &self,
        graph: &DependencyGraph,
        verbosity: u8,
    ) -> Result<Arc<CriticalPath>> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = slot.as_ref() {
            if cached.revision == graph.revision() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                log_debug!(verbosity, "Critical path cache hit for scope {}", graph.scope_id());
                return Ok(Arc::clone(cached));
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        log_debug!(
            verbosity,
            "Critical path cache miss for scope {} (revision {})",
            graph.scope_id(),
            graph.revision()
        );
        let computed = Arc::new(calculate_critical_path(graph, verbosity)?);
        *slot = Some(Arc::clone(&computed));
        Ok(computed)
    }

    /// Drop the cached result. Takes `&mut self` so it can only run under the
    /// same exclusive access as the graph mutation that caused it.
    pub fn invalidate(&mut self) {
        *self.slot.get_mut().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
