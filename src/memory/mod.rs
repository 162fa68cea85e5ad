/*!
 * Memory Module
 * Raw primitive, tracked allocation, and block pooling
 */

pub mod manager;
pub mod pool;
pub mod raw;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use manager::MemoryTracker;
pub use pool::{MemoryPool, PoolStats};
pub use raw::{BudgetedRawAllocator, RawAllocator, SystemRawAllocator};
pub use traits::*;
pub use types::*;
