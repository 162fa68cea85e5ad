/*!
 * Object Pool Allocator
 * Size-keyed queues of recycled allocations
 */

use super::{
    require_capacity, require_size, AllocatedMemory, AllocationStrategy, AllocatorStats,
    StrategyCounters, StrategyKind,
};
use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::types::{BlockId, Size};
use crate::memory::{AlignmentMode, MemoryTracker};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Recycles whole blocks by exact request size
///
/// Fresh blocks count against `total_size` for as long as the pool owns
/// them; returned blocks wait in their size's queue until reused or reset.
/// Only blocks this pool obtained from the tracker can be returned to it.
pub struct ObjectPoolAllocator {
    tracker: Arc<MemoryTracker>,
    alignment: AlignmentMode,
    total_size: Size,
    /// Bytes of blocks obtained from the tracker and not yet freed
    used_size: Size,
    /// Ids of those blocks, queued or outstanding
    owned: HashSet<BlockId>,
    queues: HashMap<Size, VecDeque<AllocatedMemory>>,
    /// Bytes of blocks currently handed out
    allocated_size: Size,
    counters: StrategyCounters,
}

impl ObjectPoolAllocator {
    pub fn new(
        tracker: Arc<MemoryTracker>,
        total_size: Size,
        alignment: AlignmentMode,
    ) -> MemoryResult<Self> {
        require_capacity(total_size)?;
        info!("Object pool allocator created: {} bytes", total_size);
        Ok(Self {
            tracker,
            alignment,
            total_size,
            used_size: 0,
            owned: HashSet::new(),
            queues: HashMap::new(),
            allocated_size: 0,
            counters: StrategyCounters::default(),
        })
    }

    /// Recycled allocations waiting for `size`
    pub fn pooled(&self, size: Size) -> usize {
        self.queues.get(&size).map_or(0, |q| q.len())
    }

    /// Bytes obtained from the tracker
    pub fn used_size(&self) -> Size {
        self.used_size
    }

    fn try_allocate(&mut self, size: Size) -> MemoryResult<AllocatedMemory> {
        require_size(size)?;

        if let Some(memory) = self.queues.get_mut(&size).and_then(|q| q.pop_front()) {
            self.allocated_size += size;
            return Ok(memory);
        }

        if self.used_size + size > self.total_size {
            return Err(MemoryError::out_of_memory(
                size,
                self.total_size - self.used_size,
            ));
        }

        let block = self.tracker.allocate(size, self.alignment)?;
        self.owned.insert(block.id);
        self.used_size += size;
        self.allocated_size += size;
        Ok(AllocatedMemory {
            block,
            offset: 0,
            granted_size: size,
            requested_size: size,
        })
    }
}

impl AllocationStrategy for ObjectPoolAllocator {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ObjectPool
    }

    fn allocate(&mut self, size: Size) -> MemoryResult<AllocatedMemory> {
        let result = self.try_allocate(size);
        self.counters.record(result)
    }

    fn free(&mut self, memory: &AllocatedMemory) -> MemoryResult<()> {
        if memory.offset != 0 || !self.owned.contains(&memory.block.id) {
            return Err(MemoryError::illegal_state(format!(
                "memory at offset {} of block {} is not owned by this pool",
                memory.offset, memory.block.id
            )));
        }
        if memory.requested_size != memory.block.requested_size {
            return Err(MemoryError::illegal_state(format!(
                "block {} holds {} bytes, not {}",
                memory.block.id, memory.block.requested_size, memory.requested_size
            )));
        }
        if !self.tracker.is_live(&memory.block) {
            return Err(MemoryError::illegal_state(format!(
                "block {} is not allocated",
                memory.block.id
            )));
        }

        let queue = self.queues.entry(memory.requested_size).or_default();
        if queue.iter().any(|m| m.block.id == memory.block.id) {
            return Err(MemoryError::illegal_state(format!(
                "block {} is already pooled",
                memory.block.id
            )));
        }

        queue.push_back(memory.clone());
        self.allocated_size = self.allocated_size.saturating_sub(memory.requested_size);
        self.counters.deallocations += 1;
        Ok(())
    }

    fn stats(&self) -> AllocatorStats {
        AllocatorStats::new(
            StrategyKind::ObjectPool,
            self.total_size,
            self.allocated_size,
            &self.counters,
        )
    }

    /// Free every queued block
    ///
    /// Outstanding allocations stay with their holders and still count in
    /// both `used_size` and `allocated_size`; they may be freed back later.
    fn reset(&mut self) -> MemoryResult<()> {
        let mut released = 0;
        let mut first_error = None;

        for (_, queue) in self.queues.drain() {
            for memory in queue {
                self.owned.remove(&memory.block.id);
                self.used_size = self.used_size.saturating_sub(memory.requested_size);
                match self.tracker.free(&memory.block) {
                    Ok(_) => released += 1,
                    Err(e) => {
                        warn!("Object pool could not free block {}: {}", memory.block.id, e);
                        first_error.get_or_insert(e);
                    }
                }
            }
        }
        self.allocated_size = self.used_size;
        debug!(
            "Object pool reset, {} pooled blocks freed, {} bytes outstanding",
            released, self.allocated_size
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for ObjectPoolAllocator {
    fn drop(&mut self) {
        // Errors are already logged per block
        let _ = self.reset();
    }
}
