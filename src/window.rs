// Count-bounded sliding window for live samples
//
// Keeps the most recent N items in arrival order. Appending to a saturated
// window evicts the oldest item first, so once full the length stays equal to
// the capacity.

use crate::types::{FeedError, FeedResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of samples kept for display
pub const DEFAULT_WINDOW_CAPACITY: usize = 300;

// Upper bound on the up-front allocation for very large windows
const MAX_PREALLOCATED: usize = 4096;

/// Counters for window activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowMetrics {
    pub total_appended: u64,
    pub total_evicted: u64,
    pub current_size: usize,
    pub capacity: usize,
}

/// Bounded, ordered history of recent items
pub struct SlidingWindow<T: Clone> {
    entries: RwLock<VecDeque<T>>,
    capacity: usize,
    total_appended: AtomicU64,
    total_evicted: AtomicU64,
}

impl<T: Clone> SlidingWindow<T> {
    /// Create a window holding at most `capacity` items
    pub fn new(capacity: usize) -> FeedResult<Self> {
        if capacity == 0 {
            return Err(FeedError::InvalidConfig(
                "window capacity must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(MAX_PREALLOCATED))),
            capacity,
            total_appended: AtomicU64::new(0),
            total_evicted: AtomicU64::new(0),
        })
    }

    /// Append at the tail, evicting from the head while over capacity.
    ///
    /// Returns the number of evicted items.
    pub fn append(&self, item: T) -> usize {
        let mut entries = self.entries.write();
        entries.push_back(item);

        let mut evicted = 0;
        while entries.len() > self.capacity {
            entries.pop_front();
            evicted += 1;
        }
        drop(entries);

        self.total_appended.fetch_add(1, Ordering::Relaxed);
        if evicted > 0 {
            self.total_evicted
                .fetch_add(evicted as u64, Ordering::Relaxed);
        }

        evicted
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Point-in-time copy of the contents, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.read().iter().cloned().collect()
    }

    /// Most recently appended item
    pub fn latest(&self) -> Option<T> {
        self.entries.read().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once the window holds `capacity` items
    pub fn is_saturated(&self) -> bool {
        self.len() == self.capacity
    }

    pub fn metrics(&self) -> WindowMetrics {
        WindowMetrics {
            total_appended: self.total_appended.load(Ordering::Relaxed),
            total_evicted: self.total_evicted.load(Ordering::Relaxed),
            current_size: self.len(),
            capacity: self.capacity,
        }
    }

    /// Reset lifetime counters (contents are kept)
    pub fn reset_metrics(&self) {
        self.total_appended.store(0, Ordering::Relaxed);
        self.total_evicted.store(0, Ordering::Relaxed);
    }
}
