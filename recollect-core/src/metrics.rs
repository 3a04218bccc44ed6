//! Lightweight runtime counters for the memory engine.
//!
//! Incremented on the hot path with relaxed atomics; read on export.
//! Counters are process-lifetime only and are never persisted.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for high-frequency events.
#[derive(Debug)]
pub struct MemoryCounters {
    /// Episodes recorded since startup.
    pub episodes_added: AtomicU64,
    /// Episodes removed by eviction since startup.
    pub episodes_evicted: AtomicU64,
    /// Eviction passes run.
    pub eviction_passes: AtomicU64,
    /// Successful saves.
    pub saves_completed: AtomicU64,
    /// Saves that failed and were skipped.
    pub save_failures: AtomicU64,
    /// Loads that fell back to an empty store.
    pub load_failures: AtomicU64,
}

impl MemoryCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            episodes_added: AtomicU64::new(0),
            episodes_evicted: AtomicU64::new(0),
            eviction_passes: AtomicU64::new(0),
            saves_completed: AtomicU64::new(0),
            save_failures: AtomicU64::new(0),
            load_failures: AtomicU64::new(0),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            episodes_added: self.episodes_added.load(Ordering::Relaxed),
            episodes_evicted: self.episodes_evicted.load(Ordering::Relaxed),
            eviction_passes: self.eviction_passes.load(Ordering::Relaxed),
            saves_completed: self.saves_completed.load(Ordering::Relaxed),
            save_failures: self.save_failures.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for MemoryCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of counter values at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Episodes recorded.
    pub episodes_added: u64,
    /// Episodes evicted.
    pub episodes_evicted: u64,
    /// Eviction passes.
    pub eviction_passes: u64,
    /// Completed saves.
    pub saves_completed: u64,
    /// Failed saves.
    pub save_failures: u64,
    /// Failed loads.
    pub load_failures: u64,
}

impl CounterSnapshot {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let rows = [
            ("recollect_episodes_added_total", "Episodes recorded", self.episodes_added),
            ("recollect_episodes_evicted_total", "Episodes evicted", self.episodes_evicted),
            ("recollect_eviction_passes_total", "Eviction passes run", self.eviction_passes),
            ("recollect_saves_completed_total", "Saves completed", self.saves_completed),
            ("recollect_save_failures_total", "Saves skipped after an error", self.save_failures),
            ("recollect_load_failures_total", "Loads that fell back to empty", self.load_failures),
        ];

        let mut out = String::new();
        for (name, help, value) in rows {
            out.push_str(&format!("# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n"));
        }
        out
    }
}
