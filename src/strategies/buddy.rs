/*!
 * Buddy Allocator
 *
 * Binary buddy system over one power-of-two base block.
 *
 * - A request of `size` bytes is served from order `ceil(log2(size))`
 * - Missing orders are produced by halving the smallest larger free block;
 *   each unused upper half goes onto its order's free list
 * - On free, a block merges with its buddy (`offset ^ (1 << order)`) for as
 *   long as the buddy is free, climbing one order per merge
 */

use super::{
    release_base, require_capacity, require_owned, require_size, AllocatedMemory,
    AllocationStrategy, AllocatorStats, StrategyCounters, StrategyKind,
};
use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::types::Size;
use crate::memory::{AlignmentMode, MemoryBlock, MemoryTracker};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Smallest order needed to hold `size` bytes
#[inline]
pub(crate) fn order_for(size: Size) -> Option<u32> {
    size.checked_next_power_of_two().map(|p| p.trailing_zeros())
}

pub struct BuddyAllocator {
    tracker: Arc<MemoryTracker>,
    base: MemoryBlock,
    total_size: Size,
    max_order: u32,
    /// order -> free offsets, ordered so the lowest offset is reused first
    free_lists: BTreeMap<u32, BTreeSet<Size>>,
    /// offset -> order of every live allocation
    allocations: HashMap<Size, u32>,
    allocated_size: Size,
    counters: StrategyCounters,
}

impl BuddyAllocator {
    pub fn new(
        tracker: Arc<MemoryTracker>,
        total_size: Size,
        alignment: AlignmentMode,
    ) -> MemoryResult<Self> {
        require_capacity(total_size)?;
        let size = total_size.checked_next_power_of_two().ok_or_else(|| {
            MemoryError::invalid_argument(format!("buddy capacity {} is too large", total_size))
        })?;
        let base = tracker.allocate(size, alignment)?;
        let max_order = size.trailing_zeros();

        let mut free_lists = BTreeMap::new();
        free_lists.insert(max_order, BTreeSet::from([0]));

        info!(
            "Buddy allocator created: {} bytes (requested {}), max order {}",
            size, total_size, max_order
        );
        Ok(Self {
            tracker,
            base,
            total_size: size,
            max_order,
            free_lists,
            allocations: HashMap::new(),
            allocated_size: 0,
            counters: StrategyCounters::default(),
        })
    }

    /// Order of the whole base block
    pub fn max_order(&self) -> u32 {
        self.max_order
    }

    /// Number of free blocks of exactly `order`
    pub fn free_blocks_at(&self, order: u32) -> usize {
        self.free_lists.get(&order).map_or(0, |list| list.len())
    }

    /// Whether a free block of `order` starts at `offset`
    pub fn is_free_at(&self, order: u32, offset: Size) -> bool {
        self.free_lists
            .get(&order)
            .map_or(false, |list| list.contains(&offset))
    }

    fn try_allocate(&mut self, size: Size) -> MemoryResult<AllocatedMemory> {
        require_size(size)?;
        let order = match order_for(size) {
            Some(order) if order <= self.max_order => order,
            _ => {
                return Err(MemoryError::out_of_memory(
                    size,
                    self.total_size - self.allocated_size,
                ))
            }
        };

        // Smallest order at or above the target with a free block
        let Some(mut current) = (order..=self.max_order).find(|o| self.free_blocks_at(*o) > 0)
        else {
            debug!("Buddy exhausted: no free block of order >= {}", order);
            return Err(MemoryError::out_of_memory(
                size,
                self.total_size - self.allocated_size,
            ));
        };

        let offset = self
            .free_lists
            .get_mut(&current)
            .and_then(|list| list.pop_first())
            .ok_or_else(|| MemoryError::illegal_state("buddy free list out of sync"))?;

        while current > order {
            current -= 1;
            self.free_lists
                .entry(current)
                .or_default()
                .insert(offset + (1 << current));
        }

        self.allocations.insert(offset, order);
        self.allocated_size += 1 << order;

        Ok(AllocatedMemory {
            block: self.base.clone(),
            offset,
            granted_size: 1 << order,
            requested_size: size,
        })
    }

    /// Put a block back, merging with free buddies
    fn coalesce(&mut self, mut offset: Size, mut order: u32) {
        while order < self.max_order {
            let buddy = offset ^ (1 << order);
            let merged = self
                .free_lists
                .get_mut(&order)
                .map_or(false, |list| list.remove(&buddy));
            if !merged {
                break;
            }
            offset = offset.min(buddy);
            order += 1;
        }
        self.free_lists.entry(order).or_default().insert(offset);
    }
}

impl AllocationStrategy for BuddyAllocator {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Buddy
    }

    fn allocate(&mut self, size: Size) -> MemoryResult<AllocatedMemory> {
        let result = self.try_allocate(size);
        self.counters.record(result)
    }

    fn free(&mut self, memory: &AllocatedMemory) -> MemoryResult<()> {
        require_owned(memory, &self.base)?;
        let order = self.allocations.remove(&memory.offset).ok_or_else(|| {
            warn!("Buddy free of unknown offset {}", memory.offset);
            MemoryError::illegal_state(format!(
                "no live buddy allocation at offset {}",
                memory.offset
            ))
        })?;

        self.allocated_size -= 1 << order;
        self.coalesce(memory.offset, order);
        self.counters.deallocations += 1;
        Ok(())
    }

    fn stats(&self) -> AllocatorStats {
        AllocatorStats::new(
            StrategyKind::Buddy,
            self.total_size,
            self.allocated_size,
            &self.counters,
        )
    }

    fn reset(&mut self) -> MemoryResult<()> {
        let live: Vec<(Size, u32)> = self.allocations.drain().collect();
        let count = live.len();
        for (offset, order) in live {
            self.coalesce(offset, order);
        }
        self.allocated_size = 0;
        debug!("Buddy reset, {} outstanding allocations coalesced", count);
        Ok(())
    }
}

impl Drop for BuddyAllocator {
    fn drop(&mut self) {
        release_base(&self.tracker, &self.base, StrategyKind::Buddy);
    }
}
