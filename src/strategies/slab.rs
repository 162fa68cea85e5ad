/*!
 * Slab Allocator
 *
 * One slab per exact request size. Each slab owns one base block carved
 * into `slab_size / object_size` cells, with a bitmap tracking occupancy.
 * A full size class fails even while other classes have room; there is no
 * coalescing or compaction.
 */

use super::{
    release_base, require_capacity, require_owned, require_size, AllocatedMemory,
    AllocationStrategy, AllocatorStats, StrategyCounters, StrategyKind,
};
use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::limits::{SLAB_CAPACITY_DIVISOR, SLAB_MAX_SIZE};
use crate::core::types::Size;
use crate::memory::{AlignmentMode, MemoryBlock, MemoryTracker};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;

/// Fixed-length bitmap of cell occupancy
#[derive(Debug, Clone)]
struct OccupancyBitmap {
    words: Vec<u64>,
    len: usize,
}

impl OccupancyBitmap {
    fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Index of the first clear bit
    fn first_clear(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, word)| **word != u64::MAX)
            .map(|(i, word)| i * 64 + word.trailing_ones() as usize)
            .filter(|index| *index < self.len)
    }

    fn is_set(&self, index: usize) -> bool {
        self.words[index / 64] & (1 << (index % 64)) != 0
    }

    fn set(&mut self, index: usize) {
        self.words[index / 64] |= 1 << (index % 64);
    }

    fn clear(&mut self, index: usize) {
        self.words[index / 64] &= !(1 << (index % 64));
    }

    fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

/// Cells of one size class
struct Slab {
    base: MemoryBlock,
    object_size: Size,
    max_objects: usize,
    occupancy: OccupancyBitmap,
}

pub struct SlabAllocator {
    tracker: Arc<MemoryTracker>,
    alignment: AlignmentMode,
    total_size: Size,
    slab_size: Size,
    slabs: HashMap<Size, Slab>,
    /// Bytes of base blocks owned by slabs
    reserved: Size,
    allocated_size: Size,
    counters: StrategyCounters,
}

impl SlabAllocator {
    pub fn new(
        tracker: Arc<MemoryTracker>,
        total_size: Size,
        alignment: AlignmentMode,
    ) -> MemoryResult<Self> {
        require_capacity(total_size)?;
        let slab_size = (total_size / SLAB_CAPACITY_DIVISOR).min(SLAB_MAX_SIZE).max(1);

        info!(
            "Slab allocator created: {} bytes, {} byte slabs",
            total_size, slab_size
        );
        Ok(Self {
            tracker,
            alignment,
            total_size,
            slab_size,
            slabs: HashMap::new(),
            reserved: 0,
            allocated_size: 0,
            counters: StrategyCounters::default(),
        })
    }

    /// Bytes backing each slab
    pub fn slab_size(&self) -> Size {
        self.slab_size
    }

    /// Cells per slab for objects of `object_size`
    pub fn max_objects(&self, object_size: Size) -> usize {
        if object_size == 0 {
            0
        } else {
            self.slab_size / object_size
        }
    }

    /// Number of size classes with a slab
    pub fn slab_count(&self) -> usize {
        self.slabs.len()
    }

    fn create_slab(&mut self, object_size: Size) -> MemoryResult<()> {
        let max_objects = self.max_objects(object_size);
        if max_objects == 0 {
            return Err(MemoryError::out_of_memory(object_size, self.slab_size));
        }
        if self.reserved + self.slab_size > self.total_size {
            return Err(MemoryError::out_of_memory(
                object_size,
                self.total_size - self.reserved,
            ));
        }

        let base = self.tracker.allocate(self.slab_size, self.alignment)?;
        self.reserved += self.slab_size;
        debug!(
            "New slab for {} byte objects: {} cells in block {}",
            object_size, max_objects, base.id
        );
        self.slabs.insert(
            object_size,
            Slab {
                base,
                object_size,
                max_objects,
                occupancy: OccupancyBitmap::new(max_objects),
            },
        );
        Ok(())
    }

    fn try_allocate(&mut self, size: Size) -> MemoryResult<AllocatedMemory> {
        require_size(size)?;
        if !self.slabs.contains_key(&size) {
            self.create_slab(size)?;
        }

        let slab = self
            .slabs
            .get_mut(&size)
            .ok_or_else(|| MemoryError::illegal_state("slab vanished after creation"))?;
        let Some(index) = slab.occupancy.first_clear() else {
            debug!("Slab for {} byte objects is full ({} cells)", size, slab.max_objects);
            return Err(MemoryError::out_of_memory(size, 0));
        };
        slab.occupancy.set(index);
        self.allocated_size += size;

        Ok(AllocatedMemory {
            block: slab.base.clone(),
            offset: index * slab.object_size,
            granted_size: slab.object_size,
            requested_size: size,
        })
    }

    fn release_slabs(&mut self) {
        for (_, slab) in self.slabs.drain() {
            release_base(&self.tracker, &slab.base, StrategyKind::Slab);
        }
        self.reserved = 0;
    }
}

impl AllocationStrategy for SlabAllocator {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Slab
    }

    fn allocate(&mut self, size: Size) -> MemoryResult<AllocatedMemory> {
        let result = self.try_allocate(size);
        self.counters.record(result)
    }

    fn free(&mut self, memory: &AllocatedMemory) -> MemoryResult<()> {
        let slab = self.slabs.get_mut(&memory.requested_size).ok_or_else(|| {
            MemoryError::illegal_state(format!(
                "no slab for {} byte objects",
                memory.requested_size
            ))
        })?;
        require_owned(memory, &slab.base)?;

        let index = memory.offset / slab.object_size;
        if memory.offset % slab.object_size != 0 || index >= slab.max_objects {
            return Err(MemoryError::illegal_state(format!(
                "offset {} is not a cell of the {} byte slab",
                memory.offset, slab.object_size
            )));
        }
        if !slab.occupancy.is_set(index) {
            return Err(MemoryError::illegal_state(format!(
                "slab cell {} of {} byte objects is already free",
                index, slab.object_size
            )));
        }

        slab.occupancy.clear(index);
        self.allocated_size -= slab.object_size;
        self.counters.deallocations += 1;
        Ok(())
    }

    fn stats(&self) -> AllocatorStats {
        AllocatorStats::new(
            StrategyKind::Slab,
            self.total_size,
            self.allocated_size,
            &self.counters,
        )
    }

    fn reset(&mut self) -> MemoryResult<()> {
        let live: usize = self.slabs.values().map(|s| s.occupancy.count()).sum();
        self.release_slabs();
        self.allocated_size = 0;
        debug!("Slab reset, {} live cells dropped", live);
        Ok(())
    }
}

impl Drop for SlabAllocator {
    fn drop(&mut self) {
        self.release_slabs();
    }
}
