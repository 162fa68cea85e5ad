/*!
 * Raw Memory Kernel Library
 * Tracked native allocation, block pooling, and allocation strategies
 */

pub mod core;
pub mod facade;
pub mod memory;
pub mod monitoring;
pub mod strategies;

// Re-exports
pub use crate::core::{BlockId, ErrorKind, KernelConfig, MemoryError, MemoryResult};
pub use facade::{AdvancedAllocator, AllocatorRegistry};
pub use memory::{
    AlignmentMode, CopyMode, MemoryBlock, MemoryPool, MemoryStats, MemoryTracker, PoolStats,
};
pub use monitoring::init_tracing;
pub use strategies::{AllocatedMemory, AllocationStrategy, AllocatorStats, StrategyKind};
