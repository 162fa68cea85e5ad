/*!
 * Memory Traits
 * Tracked memory abstractions
 */

use super::types::*;
use crate::core::errors::MemoryResult;
use crate::core::types::Size;
use std::time::Duration;

/// Block allocator interface
pub trait BlockAllocator: Send + Sync {
    /// Allocate a block of `size` usable bytes aligned to `alignment`
    fn allocate(&self, size: Size, alignment: AlignmentMode) -> MemoryResult<MemoryBlock>;

    /// Free a live block, returning its final snapshot
    fn free(&self, block: &MemoryBlock) -> MemoryResult<MemoryBlock>;

    /// Resize a live block; the result is a new block with a new id
    fn reallocate(&self, block: &MemoryBlock, new_size: Size) -> MemoryResult<MemoryBlock>;

    /// Check whether a handle still refers to a live block
    fn is_live(&self, block: &MemoryBlock) -> bool;
}

/// Memory statistics provider
pub trait MemoryInfo: Send + Sync {
    /// Get overall memory statistics
    fn stats(&self) -> MemoryStats;

    /// Snapshot of every live block, ordered by id
    fn allocated_blocks(&self) -> Vec<MemoryBlock>;

    /// Get memory pressure level
    fn pressure(&self) -> MemoryPressure {
        self.stats().pressure
    }
}

/// Leak detection and bulk cleanup
pub trait LeakDetector: Send + Sync {
    /// Live blocks older than `max_age`
    fn find_potential_leaks(&self, max_age: Duration) -> Vec<MemoryBlock>;

    /// Free every live block, returning how many were freed
    fn free_all_memory(&self) -> usize;
}
