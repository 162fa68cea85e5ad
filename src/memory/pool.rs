/*!
 * Memory Pooling
 * Bounded recycler of fixed-size, fixed-alignment tracked blocks
 */

use super::manager::MemoryTracker;
use super::types::{AlignmentMode, MemoryBlock};
use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::types::{BlockId, Size};
use ahash::RandomState;
use crossbeam_queue::ArrayQueue;
use dashmap::DashSet;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Pool statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub block_size: Size,
    pub alignment: AlignmentMode,
    pub max_pool_size: usize,
    /// Zeroed blocks ready for reuse
    pub available: usize,
    pub acquired: u64,
    /// Acquisitions served from the pool
    pub reused: u64,
    /// Acquisitions that needed a fresh allocation
    pub created: u64,
    /// Releases handed back to the tracker because the pool was full
    pub overflowed: u64,
}

/// Pool of recycled blocks sharing one size and alignment
///
/// The free list is a bounded lock-free queue, independent of any other
/// allocator lock.
pub struct MemoryPool {
    tracker: Arc<MemoryTracker>,
    block_size: Size,
    alignment: AlignmentMode,
    max_pool_size: usize,
    available: ArrayQueue<MemoryBlock>,
    /// Ids currently in `available`
    pooled: DashSet<BlockId, RandomState>,
    acquired: AtomicU64,
    reused: AtomicU64,
    created: AtomicU64,
    overflowed: AtomicU64,
}

impl MemoryPool {
    pub fn new(
        tracker: Arc<MemoryTracker>,
        block_size: Size,
        alignment: AlignmentMode,
        max_pool_size: usize,
    ) -> MemoryResult<Self> {
        if block_size == 0 {
            return Err(MemoryError::invalid_argument("pool block size must be > 0"));
        }
        if max_pool_size == 0 {
            return Err(MemoryError::invalid_argument("pool max size must be > 0"));
        }

        info!(
            "Memory pool created: {} byte blocks, {}, up to {} pooled",
            block_size, alignment, max_pool_size
        );
        Ok(Self {
            tracker,
            block_size,
            alignment,
            max_pool_size,
            available: ArrayQueue::new(max_pool_size),
            pooled: DashSet::with_hasher(RandomState::new()),
            acquired: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            created: AtomicU64::new(0),
            overflowed: AtomicU64::new(0),
        })
    }

    /// Take a pooled block, or allocate a fresh one when the pool is empty
    pub fn acquire(&self) -> MemoryResult<MemoryBlock> {
        let block = match self.available.pop() {
            Some(block) => {
                self.pooled.remove(&block.id);
                self.reused.fetch_add(1, Ordering::Relaxed);
                block
            }
            None => {
                let block = self.tracker.allocate(self.block_size, self.alignment)?;
                self.created.fetch_add(1, Ordering::Relaxed);
                block
            }
        };
        self.acquired.fetch_add(1, Ordering::Relaxed);
        Ok(block)
    }

    /// Return a block to the pool
    ///
    /// Blocks of a different size are ignored. Returned blocks are zeroed; when
    /// the pool is full the block is freed instead. Releasing a block that is
    /// already pooled fails with `IllegalState`.
    pub fn release(&self, block: MemoryBlock) -> MemoryResult<()> {
        if block.requested_size != self.block_size {
            debug!(
                "Ignoring release of block {} ({} bytes) into {} byte pool",
                block.id, block.requested_size, self.block_size
            );
            return Ok(());
        }

        if !self.pooled.insert(block.id) {
            return Err(MemoryError::illegal_state(format!(
                "block {} is already pooled",
                block.id
            )));
        }

        if let Err(e) = self.tracker.zero_memory(&block, 0, block.requested_size) {
            self.pooled.remove(&block.id);
            return Err(e);
        }

        if let Err(block) = self.available.push(block) {
            self.pooled.remove(&block.id);
            self.overflowed.fetch_add(1, Ordering::Relaxed);
            debug!("Pool full, freeing block {}", block.id);
            self.tracker.free(&block)?;
        }
        Ok(())
    }

    /// Free every pooled block, returning how many were freed
    pub fn clear(&self) -> usize {
        let mut freed = 0;
        while let Some(block) = self.available.pop() {
            self.pooled.remove(&block.id);
            match self.tracker.free(&block) {
                Ok(_) => freed += 1,
                Err(e) => warn!("Pool could not free block {}: {}", block.id, e),
            }
        }
        if freed > 0 {
            debug!("Pool cleared, {} blocks freed", freed);
        }
        freed
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            block_size: self.block_size,
            alignment: self.alignment,
            max_pool_size: self.max_pool_size,
            available: self.available.len(),
            acquired: self.acquired.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            overflowed: self.overflowed.load(Ordering::Relaxed),
        }
    }

    pub fn block_size(&self) -> Size {
        self.block_size
    }

    pub fn alignment(&self) -> AlignmentMode {
        self.alignment
    }
}

impl Drop for MemoryPool {
    fn drop(&mut self) {
        self.clear();
    }
}
