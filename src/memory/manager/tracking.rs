/*!
 * Usage Tracking
 * Atomic byte counters for the tracked allocator
 */

use crate::core::types::Size;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Running byte totals, updated without locks
#[derive(Debug, Default)]
pub(super) struct UsageCounters {
    total_allocated: AtomicUsize,
    total_freed: AtomicUsize,
    current_allocated: AtomicUsize,
    peak_allocated: AtomicUsize,
}

impl UsageCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new current total
    pub fn add_allocation(&self, size: Size) -> Size {
        self.total_allocated.fetch_add(size, Ordering::SeqCst);
        let current = self.current_allocated.fetch_add(size, Ordering::SeqCst) + size;
        self.peak_allocated.fetch_max(current, Ordering::SeqCst);
        current
    }

    pub fn remove_allocation(&self, size: Size) {
        self.total_freed.fetch_add(size, Ordering::SeqCst);
        self.current_allocated.fetch_sub(size, Ordering::SeqCst);
    }

    /// Apply the delta between an old and a new padded size
    pub fn resize_allocation(&self, old: Size, new: Size) {
        if new >= old {
            self.add_allocation(new - old);
        } else {
            self.remove_allocation(old - new);
        }
    }

    pub fn total_allocated(&self) -> Size {
        self.total_allocated.load(Ordering::SeqCst)
    }

    pub fn total_freed(&self) -> Size {
        self.total_freed.load(Ordering::SeqCst)
    }

    pub fn current_allocated(&self) -> Size {
        self.current_allocated.load(Ordering::SeqCst)
    }

    pub fn peak_allocated(&self) -> Size {
        self.peak_allocated.load(Ordering::SeqCst)
    }
}
