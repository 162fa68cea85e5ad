/*!
 * System Limits and Constants
 *
 * Centralized location for allocator limits, thresholds, and magic numbers.
 * Organized by component for maintainability and discoverability.
 */

use std::time::Duration;

// =============================================================================
// ALIGNMENT
// =============================================================================

/// Byte alignment of `AlignmentMode::None`
pub const ALIGN_NONE: usize = 1;

/// Byte alignment of `AlignmentMode::Word`
pub const ALIGN_WORD: usize = 8;

/// Byte alignment of `AlignmentMode::CacheLine`
pub const ALIGN_CACHE_LINE: usize = 64;

/// Byte alignment of `AlignmentMode::Page`
pub const ALIGN_PAGE: usize = 4096;

// =============================================================================
// TRACKED ALLOCATOR
// =============================================================================

/// Default age after which a live block is reported as a leak candidate
pub const DEFAULT_LEAK_AGE: Duration = Duration::from_secs(60);

/// Usage ratio of the raw budget that counts as medium pressure
pub const PRESSURE_MEDIUM: f64 = 0.60;

/// Usage ratio of the raw budget that triggers warnings
pub const PRESSURE_HIGH: f64 = 0.80;

/// Usage ratio of the raw budget that counts as critical
pub const PRESSURE_CRITICAL: f64 = 0.95;

// =============================================================================
// MEMORY POOL
// =============================================================================

/// Default block size for the demo pool (4KB)
pub const DEFAULT_POOL_BLOCK_SIZE: usize = 4 * 1024;

/// Default number of blocks a pool keeps for reuse
pub const DEFAULT_POOL_MAX_SIZE: usize = 16;

// =============================================================================
// STRATEGIES
// =============================================================================

/// Upper bound of a single slab (1MB)
pub const SLAB_MAX_SIZE: usize = 1024 * 1024;

/// Divisor applied to a slab allocator's capacity to size one slab
pub const SLAB_CAPACITY_DIVISOR: usize = 10;

/// Upper bound of a single arena (64MB)
pub const ARENA_MAX_SIZE: usize = 64 * 1024 * 1024;

/// Largest request routed to the slab tier of the hybrid allocator (1KB)
pub const HYBRID_SMALL_MAX: usize = 1024;

/// Largest request routed to the buddy tier of the hybrid allocator (64KB)
pub const HYBRID_MEDIUM_MAX: usize = 64 * 1024;
