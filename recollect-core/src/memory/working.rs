//! Working Memory: the bounded recency buffer of raw turns.
//!
//! Strict FIFO: pushing past capacity drops the oldest entries. Nothing here
//! is persisted; the buffer starts empty on every run.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::types::WorkingEntry;

/// Upper bound on the slots reserved up front; larger buffers grow on demand.
const PREALLOC_LIMIT: usize = 64;

/// Thread-safe FIFO of the most recent dialogue entries.
#[derive(Debug)]
pub struct WorkingMemory {
    capacity: usize,
    entries: Mutex<VecDeque<WorkingEntry>>,
}

impl WorkingMemory {
    /// Create an empty buffer holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(PREALLOC_LIMIT))),
        }
    }

    /// Append `entry`, then drop from the front until within capacity.
    pub fn push(&self, entry: WorkingEntry) {
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Entries ordered oldest to newest.
    #[must_use]
    pub fn snapshot(&self) -> Vec<WorkingEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Current number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn contents(wm: &WorkingMemory) -> Vec<String> {
        wm.snapshot().into_iter().map(|e| e.content).collect()
    }

    #[test]
    fn oldest_entry_is_dropped_first() {
        let wm = WorkingMemory::new(3);
        for c in ["A", "B", "C", "D"] {
            wm.push(WorkingEntry::now(Role::User, c));
        }
        assert_eq!(contents(&wm), vec!["B", "C", "D"]);
    }

    #[test]
    fn clear_empties_the_buffer() {
        let wm = WorkingMemory::new(2);
        wm.push(WorkingEntry::now(Role::User, "hi"));
        wm.push(WorkingEntry::now(Role::Assistant, "hello"));
        assert_eq!(wm.len(), 2);
        wm.clear();
        assert!(wm.is_empty());
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let wm = WorkingMemory::new(0);
        wm.push(WorkingEntry::now(Role::User, "lost"));
        assert!(wm.is_empty());
    }

    #[test]
    fn unbounded_capacity_allocates_lazily() {
        let wm = WorkingMemory::new(usize::MAX);
        for i in 0..100 {
            wm.push(WorkingEntry::now(Role::User, &format!("turn {i}")));
        }
        assert_eq!(wm.len(), 100);
        assert_eq!(wm.snapshot()[0].content, "turn 0");
    }

    #[test]
    fn roles_are_preserved_in_order() {
        let wm = WorkingMemory::new(10);
        wm.push(WorkingEntry::now(Role::User, "q"));
        wm.push(WorkingEntry::now(Role::Assistant, "a"));
        let roles: Vec<Role> = wm.snapshot().into_iter().map(|e| e.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }
}
