/*!
 * Hybrid Allocator
 * Size-based dispatch over slab, buddy and arena sub-allocators
 */

use super::{
    require_capacity, require_size, AllocatedMemory, AllocationStrategy, AllocatorStats,
    ArenaAllocator, BuddyAllocator, SlabAllocator, StrategyKind,
};
use crate::core::errors::MemoryResult;
use crate::core::limits::{HYBRID_MEDIUM_MAX, HYBRID_SMALL_MAX};
use crate::core::types::Size;
use crate::memory::{AlignmentMode, MemoryTracker};
use log::{info, trace};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Routing bucket for a request size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeTier {
    /// Up to 1 KiB, served by the slab allocator
    Small,
    /// Up to 64 KiB, served by the buddy allocator
    Medium,
    /// Everything larger, served by the arena allocator
    Large,
}

impl SizeTier {
    #[inline]
    pub fn for_size(size: Size) -> Self {
        if size <= HYBRID_SMALL_MAX {
            SizeTier::Small
        } else if size <= HYBRID_MEDIUM_MAX {
            SizeTier::Medium
        } else {
            SizeTier::Large
        }
    }
}

pub struct HybridAllocator {
    small: SlabAllocator,
    medium: BuddyAllocator,
    large: ArenaAllocator,
}

impl HybridAllocator {
    /// Split `total_size` a quarter to slab, half to buddy, a quarter to arena
    pub fn new(
        tracker: Arc<MemoryTracker>,
        total_size: Size,
        alignment: AlignmentMode,
    ) -> MemoryResult<Self> {
        require_capacity(total_size)?;
        let small = SlabAllocator::new(Arc::clone(&tracker), total_size / 4, alignment)?;
        let medium = BuddyAllocator::new(Arc::clone(&tracker), total_size / 2, alignment)?;
        let large = ArenaAllocator::new(tracker, total_size / 4, alignment)?;

        info!("Hybrid allocator created: {} bytes", total_size);
        Ok(Self {
            small,
            medium,
            large,
        })
    }

    fn tier(&mut self, tier: SizeTier) -> &mut dyn AllocationStrategy {
        match tier {
            SizeTier::Small => &mut self.small,
            SizeTier::Medium => &mut self.medium,
            SizeTier::Large => &mut self.large,
        }
    }

    /// Stats of one sub-allocator
    pub fn tier_stats(&self, tier: SizeTier) -> AllocatorStats {
        match tier {
            SizeTier::Small => self.small.stats(),
            SizeTier::Medium => self.medium.stats(),
            SizeTier::Large => self.large.stats(),
        }
    }
}

impl AllocationStrategy for HybridAllocator {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Hybrid
    }

    fn allocate(&mut self, size: Size) -> MemoryResult<AllocatedMemory> {
        require_size(size)?;
        let tier = SizeTier::for_size(size);
        trace!("Hybrid routes {} bytes to {:?}", size, tier);
        self.tier(tier).allocate(size)
    }

    fn free(&mut self, memory: &AllocatedMemory) -> MemoryResult<()> {
        self.tier(SizeTier::for_size(memory.requested_size)).free(memory)
    }

    fn stats(&self) -> AllocatorStats {
        let components = vec![
            self.small.stats(),
            self.medium.stats(),
            self.large.stats(),
        ];
        let sum = |f: fn(&AllocatorStats) -> u64| components.iter().map(f).sum::<u64>();

        let total_size: Size = components.iter().map(|c| c.total_size).sum();
        let allocated_size: Size = components.iter().map(|c| c.allocated_size).sum();
        AllocatorStats {
            strategy: StrategyKind::Hybrid,
            total_size,
            allocated_size,
            free_size: total_size.saturating_sub(allocated_size),
            allocation_count: sum(|c| c.allocation_count),
            deallocation_count: sum(|c| c.deallocation_count),
            failed_allocations: sum(|c| c.failed_allocations),
            components,
        }
    }

    fn reset(&mut self) -> MemoryResult<()> {
        self.small.reset()?;
        self.medium.reset()?;
        self.large.reset()
    }
}
