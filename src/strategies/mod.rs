/*!
 * Allocation Strategies
 *
 * Six interchangeable allocators carving sub-ranges out of tracked blocks:
 * - **Buddy**: power-of-two splitting and coalescing
 * - **Slab**: fixed cells per exact request size, bitmap indexed
 * - **Arena**: bump pointer, freed only in bulk
 * - **RingBuffer**: circular write pointer over one region
 * - **ObjectPool**: size-keyed queues of recycled allocations
 * - **Hybrid**: slab / buddy / arena chosen by request size
 *
 * The strategies keep plain mutable indices and are not thread-safe on their
 * own; `facade::AdvancedAllocator` serializes access to one instance.
 */

mod arena;
mod buddy;
mod hybrid;
mod object_pool;
mod ring;
mod slab;

pub use arena::ArenaAllocator;
pub use buddy::BuddyAllocator;
pub use hybrid::{HybridAllocator, SizeTier};
pub use object_pool::ObjectPoolAllocator;
pub use ring::RingBufferAllocator;
pub use slab::SlabAllocator;

use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::types::{Address, Size};
use crate::memory::{AlignmentMode, MemoryBlock, MemoryTracker};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// One carve-out from a tracked block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedMemory {
    /// Block the range lives in
    pub block: MemoryBlock,
    pub offset: Size,
    /// Bytes reserved for the caller (may exceed the request)
    pub granted_size: Size,
    pub requested_size: Size,
}

impl AllocatedMemory {
    /// Usable address of the carve-out
    #[inline]
    pub fn address(&self) -> Address {
        self.block.address + self.offset
    }
}

/// Strategy statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatorStats {
    pub strategy: StrategyKind,
    pub total_size: Size,
    pub allocated_size: Size,
    pub free_size: Size,
    pub allocation_count: u64,
    pub deallocation_count: u64,
    pub failed_allocations: u64,
    /// Per-tier breakdown (hybrid only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<AllocatorStats>,
}

impl AllocatorStats {
    pub(crate) fn new(
        strategy: StrategyKind,
        total_size: Size,
        allocated_size: Size,
        counters: &StrategyCounters,
    ) -> Self {
        Self {
            strategy,
            total_size,
            allocated_size,
            free_size: total_size.saturating_sub(allocated_size),
            allocation_count: counters.allocations,
            deallocation_count: counters.deallocations,
            failed_allocations: counters.failures,
            components: Vec::new(),
        }
    }

    /// Share of capacity in use, in percent
    pub fn usage_percentage(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            self.allocated_size as f64 / self.total_size as f64 * 100.0
        }
    }
}

/// Operation counters shared by every strategy
#[derive(Debug, Clone, Default)]
pub(crate) struct StrategyCounters {
    pub allocations: u64,
    pub deallocations: u64,
    pub failures: u64,
}

impl StrategyCounters {
    /// Count the outcome of an allocation and pass it through
    pub fn record<T>(&mut self, result: MemoryResult<T>) -> MemoryResult<T> {
        match result {
            Ok(value) => {
                self.allocations += 1;
                Ok(value)
            }
            Err(e) => {
                self.failures += 1;
                Err(e)
            }
        }
    }
}

/// Strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Buddy,
    Slab,
    Arena,
    RingBuffer,
    ObjectPool,
    Hybrid,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::Buddy,
        StrategyKind::Slab,
        StrategyKind::Arena,
        StrategyKind::RingBuffer,
        StrategyKind::ObjectPool,
        StrategyKind::Hybrid,
    ];
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StrategyKind::Buddy => write!(f, "BUDDY"),
            StrategyKind::Slab => write!(f, "SLAB"),
            StrategyKind::Arena => write!(f, "ARENA"),
            StrategyKind::RingBuffer => write!(f, "RING_BUFFER"),
            StrategyKind::ObjectPool => write!(f, "OBJECT_POOL"),
            StrategyKind::Hybrid => write!(f, "HYBRID"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "buddy" | "buddy_system" => Ok(StrategyKind::Buddy),
            "slab" => Ok(StrategyKind::Slab),
            "arena" => Ok(StrategyKind::Arena),
            "ring" | "ring_buffer" => Ok(StrategyKind::RingBuffer),
            "object_pool" | "pool" => Ok(StrategyKind::ObjectPool),
            "hybrid" => Ok(StrategyKind::Hybrid),
            other => Err(MemoryError::illegal_state(format!(
                "unknown allocator strategy: {}",
                other
            ))),
        }
    }
}

/// Allocator interface shared by all strategies
pub trait AllocationStrategy: Send {
    fn kind(&self) -> StrategyKind;

    /// Carve out at least `size` bytes
    fn allocate(&mut self, size: Size) -> MemoryResult<AllocatedMemory>;

    /// Return a carve-out; strategies without individual frees check ownership and ignore it
    fn free(&mut self, memory: &AllocatedMemory) -> MemoryResult<()>;

    fn stats(&self) -> AllocatorStats;

    /// Drop every outstanding carve-out and return to the initial state
    fn reset(&mut self) -> MemoryResult<()>;
}

/// Build a strategy instance over `tracker`
pub fn build(
    kind: StrategyKind,
    tracker: Arc<MemoryTracker>,
    total_size: Size,
    alignment: AlignmentMode,
) -> MemoryResult<Box<dyn AllocationStrategy>> {
    Ok(match kind {
        StrategyKind::Buddy => Box::new(BuddyAllocator::new(tracker, total_size, alignment)?),
        StrategyKind::Slab => Box::new(SlabAllocator::new(tracker, total_size, alignment)?),
        StrategyKind::Arena => Box::new(ArenaAllocator::new(tracker, total_size, alignment)?),
        StrategyKind::RingBuffer => {
            Box::new(RingBufferAllocator::new(tracker, total_size, alignment)?)
        }
        StrategyKind::ObjectPool => {
            Box::new(ObjectPoolAllocator::new(tracker, total_size, alignment)?)
        }
        StrategyKind::Hybrid => Box::new(HybridAllocator::new(tracker, total_size, alignment)?),
    })
}

pub(crate) fn require_capacity(total_size: Size) -> MemoryResult<()> {
    if total_size == 0 {
        return Err(MemoryError::invalid_argument("allocator capacity must be > 0"));
    }
    Ok(())
}

pub(crate) fn require_size(size: Size) -> MemoryResult<()> {
    if size == 0 {
        return Err(MemoryError::invalid_argument("allocation size must be > 0"));
    }
    Ok(())
}

/// Reject carve-outs that do not come from `base`
pub(crate) fn require_owned(memory: &AllocatedMemory, base: &MemoryBlock) -> MemoryResult<()> {
    if memory.block.id != base.id {
        return Err(MemoryError::illegal_state(format!(
            "memory at offset {} of block {} is not owned by this allocator",
            memory.offset, memory.block.id
        )));
    }
    Ok(())
}

/// Hand a base block back to the tracker, logging instead of failing
pub(crate) fn release_base(tracker: &MemoryTracker, block: &MemoryBlock, owner: StrategyKind) {
    if let Err(e) = tracker.free(block) {
        warn!("{} allocator could not release base block {}: {}", owner, block.id, e);
    }
}
