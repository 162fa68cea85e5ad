/*!
 * Tracked Memory Management
 *
 * Wraps the raw primitive with alignment, a registry of live blocks,
 * usage counters, and leak detection.
 *
 * ## Block lifecycle
 *
 * - `allocate` over-allocates by `alignment - 1` bytes, rounds the raw
 *   address up, and registers a `MemoryBlock` under a fresh id
 * - `free` removes the id from the registry and releases the *raw* address
 * - `reallocate` retires the old id and registers the result under a new one
 *
 * A block is live exactly while its id is in the registry. Handles are plain
 * snapshots, so freeing through one copy invalidates every other copy.
 *
 * ## Concurrency
 *
 * The registry is a sharded `DashMap` and the counters are atomics, so
 * `allocate`/`free` may be called from many threads at once.
 */

mod allocator;
mod leaks;
mod operations;
mod tracking;

use super::raw::{BudgetedRawAllocator, RawAllocator, SystemRawAllocator};
use super::traits::{BlockAllocator, LeakDetector, MemoryInfo};
use super::types::{AlignmentMode, MemoryBlock, MemoryPressure, MemoryStats};
use crate::core::config::KernelConfig;
use crate::core::errors::MemoryResult;
use crate::core::limits::{PRESSURE_CRITICAL, PRESSURE_HIGH, PRESSURE_MEDIUM};
use crate::core::types::{BlockId, Size, Timestamp};
use ahash::RandomState;
use dashmap::DashMap;
use log::info;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracking::UsageCounters;

/// Tracked allocator over a raw primitive
pub struct MemoryTracker {
    raw: Arc<dyn RawAllocator>,
    blocks: DashMap<BlockId, MemoryBlock, RandomState>,
    next_id: AtomicU64,
    counters: UsageCounters,
    // Byte cap of the raw primitive, used for pressure reporting only
    budget: Option<Size>,
    epoch: Instant,
}

impl MemoryTracker {
    /// Tracker over the system heap without a byte budget
    pub fn new() -> Self {
        Self::with_raw(Arc::new(SystemRawAllocator::new()), None)
    }

    /// Tracker over the system heap capped at `budget` raw bytes
    pub fn with_budget(budget: Size) -> Self {
        let raw = BudgetedRawAllocator::new(SystemRawAllocator::new(), budget);
        Self::with_raw(Arc::new(raw), Some(budget))
    }

    /// Tracker built from configuration
    pub fn from_config(config: &KernelConfig) -> MemoryResult<Self> {
        config.validate()?;
        Ok(match config.raw_budget {
            Some(budget) => Self::with_budget(budget),
            None => Self::new(),
        })
    }

    /// Tracker over any raw primitive
    pub fn with_raw(raw: Arc<dyn RawAllocator>, budget: Option<Size>) -> Self {
        match budget {
            Some(b) => info!("Memory tracker initialized with a {} byte raw budget", b),
            None => info!("Memory tracker initialized without a raw budget"),
        }
        Self {
            raw,
            blocks: DashMap::with_hasher(RandomState::new()),
            next_id: AtomicU64::new(1),
            counters: UsageCounters::new(),
            budget,
            epoch: Instant::now(),
        }
    }

    /// The underlying raw primitive
    pub fn raw(&self) -> &Arc<dyn RawAllocator> {
        &self.raw
    }

    /// Raw byte budget, if any
    pub fn budget(&self) -> Option<Size> {
        self.budget
    }

    /// Live snapshot of a block by id
    pub fn lookup(&self, id: BlockId) -> Option<MemoryBlock> {
        self.blocks.get(&id).map(|entry| entry.value().clone())
    }

    /// Number of live blocks
    pub fn active_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Bytes currently held, including alignment padding
    pub fn current_allocated(&self) -> Size {
        self.counters.current_allocated()
    }

    pub fn stats(&self) -> MemoryStats {
        let active_blocks = self.blocks.len();
        let current_allocated = self.counters.current_allocated();
        let average_block_size = if active_blocks == 0 {
            0.0
        } else {
            current_allocated as f64 / active_blocks as f64
        };

        MemoryStats {
            total_allocated: self.counters.total_allocated(),
            total_freed: self.counters.total_freed(),
            current_allocated,
            peak_allocated: self.counters.peak_allocated(),
            active_blocks,
            average_block_size,
            pressure: self.check_memory_pressure(current_allocated),
        }
    }

    pub fn allocated_blocks(&self) -> Vec<MemoryBlock> {
        let mut blocks: Vec<MemoryBlock> = self
            .blocks
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        blocks.sort_by_key(|b| b.id);
        blocks
    }

    pub(super) fn now(&self) -> Timestamp {
        self.epoch.elapsed().as_micros() as Timestamp
    }

    /// Pressure relative to the raw budget; unbounded trackers never report pressure
    pub(super) fn check_memory_pressure(&self, used: Size) -> MemoryPressure {
        let Some(budget) = self.budget else {
            return MemoryPressure::Low;
        };
        let ratio = used as f64 / budget as f64;

        if ratio >= PRESSURE_CRITICAL {
            MemoryPressure::Critical
        } else if ratio >= PRESSURE_HIGH {
            MemoryPressure::High
        } else if ratio >= PRESSURE_MEDIUM {
            MemoryPressure::Medium
        } else {
            MemoryPressure::Low
        }
    }
}

// Implement trait interfaces
impl BlockAllocator for MemoryTracker {
    fn allocate(&self, size: Size, alignment: AlignmentMode) -> MemoryResult<MemoryBlock> {
        MemoryTracker::allocate(self, size, alignment)
    }

    fn free(&self, block: &MemoryBlock) -> MemoryResult<MemoryBlock> {
        MemoryTracker::free(self, block)
    }

    fn reallocate(&self, block: &MemoryBlock, new_size: Size) -> MemoryResult<MemoryBlock> {
        MemoryTracker::reallocate(self, block, new_size)
    }

    fn is_live(&self, block: &MemoryBlock) -> bool {
        MemoryTracker::is_live(self, block)
    }
}

impl MemoryInfo for MemoryTracker {
    fn stats(&self) -> MemoryStats {
        MemoryTracker::stats(self)
    }

    fn allocated_blocks(&self) -> Vec<MemoryBlock> {
        MemoryTracker::allocated_blocks(self)
    }
}

impl LeakDetector for MemoryTracker {
    fn find_potential_leaks(&self, max_age: Duration) -> Vec<MemoryBlock> {
        MemoryTracker::find_potential_leaks(self, max_age)
    }

    fn free_all_memory(&self) -> usize {
        MemoryTracker::free_all_memory(self)
    }
}

impl Default for MemoryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemoryTracker {
    fn drop(&mut self) {
        if !self.blocks.is_empty() {
            let freed = self.free_all_memory();
            info!("Memory tracker dropped, released {} outstanding blocks", freed);
        }
    }
}
