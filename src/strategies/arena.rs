/*!
 * Arena Allocator
 * Bump allocation over a growing list of fixed-capacity arenas
 */

use super::{
    release_base, require_capacity, require_size, AllocatedMemory, AllocationStrategy,
    AllocatorStats, StrategyCounters, StrategyKind,
};
use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::limits::ARENA_MAX_SIZE;
use crate::core::types::Size;
use crate::memory::{AlignmentMode, MemoryBlock, MemoryTracker};
use log::{debug, info, trace};
use std::sync::Arc;

// Arena allocation
//
// - **Allocation**: O(1), bumps the offset inside the current arena
// - **Deallocation**: individual frees are accepted and ignored
// - **Reset**: keeps the first arena, frees the rest, rewinds the offset
pub struct ArenaAllocator {
    tracker: Arc<MemoryTracker>,
    alignment: AlignmentMode,
    total_size: Size,
    arena_size: Size,
    arenas: Vec<MemoryBlock>,
    current: usize,
    offset: Size,
    allocated_size: Size,
    counters: StrategyCounters,
}

impl ArenaAllocator {
    pub fn new(
        tracker: Arc<MemoryTracker>,
        total_size: Size,
        alignment: AlignmentMode,
    ) -> MemoryResult<Self> {
        require_capacity(total_size)?;
        let arena_size = total_size.min(ARENA_MAX_SIZE);
        let first = tracker.allocate(arena_size, alignment)?;

        info!(
            "Arena allocator created: {} byte arenas for {} bytes",
            arena_size, total_size
        );
        Ok(Self {
            tracker,
            alignment,
            total_size,
            arena_size,
            arenas: vec![first],
            current: 0,
            offset: 0,
            allocated_size: 0,
            counters: StrategyCounters::default(),
        })
    }

    pub fn arena_size(&self) -> Size {
        self.arena_size
    }

    pub fn arena_count(&self) -> usize {
        self.arenas.len()
    }

    /// Bump offset inside the current arena
    pub fn current_offset(&self) -> Size {
        self.offset
    }

    fn try_allocate(&mut self, size: Size) -> MemoryResult<AllocatedMemory> {
        require_size(size)?;
        if size > self.arena_size {
            return Err(MemoryError::out_of_memory(size, self.arena_size));
        }

        let mut start = self.alignment.align_up(self.offset);
        if start + size > self.arena_size {
            let arena = self.tracker.allocate(self.arena_size, self.alignment)?;
            debug!(
                "Arena {} full at offset {}, starting arena {} (block {})",
                self.current,
                self.offset,
                self.arenas.len(),
                arena.id
            );
            self.arenas.push(arena);
            self.current = self.arenas.len() - 1;
            start = 0;
        }

        self.offset = start + size;
        self.allocated_size += size;

        Ok(AllocatedMemory {
            block: self.arenas[self.current].clone(),
            offset: start,
            granted_size: size,
            requested_size: size,
        })
    }
}

impl AllocationStrategy for ArenaAllocator {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Arena
    }

    fn allocate(&mut self, size: Size) -> MemoryResult<AllocatedMemory> {
        let result = self.try_allocate(size);
        self.counters.record(result)
    }

    fn free(&mut self, memory: &AllocatedMemory) -> MemoryResult<()> {
        if !self.arenas.iter().any(|arena| arena.id == memory.block.id) {
            return Err(MemoryError::illegal_state(format!(
                "block {} is not an arena of this allocator",
                memory.block.id
            )));
        }
        trace!(
            "Arena ignores free of {} bytes at offset {}",
            memory.requested_size,
            memory.offset
        );
        Ok(())
    }

    fn stats(&self) -> AllocatorStats {
        AllocatorStats::new(
            StrategyKind::Arena,
            self.total_size,
            self.allocated_size,
            &self.counters,
        )
    }

    fn reset(&mut self) -> MemoryResult<()> {
        let extra: Vec<MemoryBlock> = self.arenas.drain(1..).collect();
        let released = extra.len();
        let mut first_error = None;
        for arena in extra {
            if let Err(e) = self.tracker.free(&arena) {
                first_error.get_or_insert(e);
            }
        }

        self.current = 0;
        self.offset = 0;
        self.allocated_size = 0;
        debug!("Arena reset, {} extra arenas released", released);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for ArenaAllocator {
    fn drop(&mut self) {
        for arena in &self.arenas {
            release_base(&self.tracker, arena, StrategyKind::Arena);
        }
    }
}
