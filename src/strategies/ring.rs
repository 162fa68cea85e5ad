/*!
 * Ring Buffer Allocator
 * Circular write pointer over one fixed region
 */

use super::{
    release_base, require_capacity, require_owned, require_size, AllocatedMemory,
    AllocationStrategy, AllocatorStats, StrategyCounters, StrategyKind,
};
use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::types::Size;
use crate::memory::{AlignmentMode, MemoryBlock, MemoryTracker};
use log::{debug, info, trace};
use std::sync::Arc;

/// Ring of one base block
///
/// There is no read pointer: once the write pointer wraps the ring is full
/// until `reset`.
pub struct RingBufferAllocator {
    tracker: Arc<MemoryTracker>,
    base: MemoryBlock,
    capacity: Size,
    write_pos: Size,
    full: bool,
    allocated_size: Size,
    counters: StrategyCounters,
}

impl RingBufferAllocator {
    pub fn new(
        tracker: Arc<MemoryTracker>,
        total_size: Size,
        alignment: AlignmentMode,
    ) -> MemoryResult<Self> {
        require_capacity(total_size)?;
        let base = tracker.allocate(total_size, alignment)?;
        info!("Ring buffer allocator created: {} bytes", total_size);
        Ok(Self {
            tracker,
            base,
            capacity: total_size,
            write_pos: 0,
            full: false,
            allocated_size: 0,
            counters: StrategyCounters::default(),
        })
    }

    pub fn write_position(&self) -> Size {
        self.write_pos
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    fn try_allocate(&mut self, size: Size) -> MemoryResult<AllocatedMemory> {
        require_size(size)?;
        let available = if self.full {
            0
        } else {
            self.capacity - self.write_pos
        };
        if size > self.capacity || size > available {
            debug!(
                "Ring buffer cannot fit {} bytes (write pointer {}, full: {})",
                size, self.write_pos, self.full
            );
            return Err(MemoryError::out_of_memory(size, available));
        }

        let offset = self.write_pos;
        self.write_pos += size;
        if self.write_pos == self.capacity {
            self.write_pos = 0;
            self.full = true;
        }
        self.allocated_size += size;

        Ok(AllocatedMemory {
            block: self.base.clone(),
            offset,
            granted_size: size,
            requested_size: size,
        })
    }
}

impl AllocationStrategy for RingBufferAllocator {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RingBuffer
    }

    fn allocate(&mut self, size: Size) -> MemoryResult<AllocatedMemory> {
        let result = self.try_allocate(size);
        self.counters.record(result)
    }

    fn free(&mut self, memory: &AllocatedMemory) -> MemoryResult<()> {
        require_owned(memory, &self.base)?;
        trace!("Ring buffer ignores free at offset {}", memory.offset);
        Ok(())
    }

    fn stats(&self) -> AllocatorStats {
        AllocatorStats::new(
            StrategyKind::RingBuffer,
            self.capacity,
            self.allocated_size,
            &self.counters,
        )
    }

    fn reset(&mut self) -> MemoryResult<()> {
        self.write_pos = 0;
        self.full = false;
        self.allocated_size = 0;
        debug!("Ring buffer reset");
        Ok(())
    }
}

impl Drop for RingBufferAllocator {
    fn drop(&mut self) {
        release_base(&self.tracker, &self.base, StrategyKind::RingBuffer);
    }
}
