/*!
 * Raw Allocation Primitive
 *
 * The lowest layer: byte ranges obtained by address from a native allocator.
 * Everything above (tracking, pools, strategies) reaches memory only through
 * the `RawAllocator` trait, so the primitive can be swapped or budgeted.
 */

mod budgeted;
mod system;

pub use budgeted::BudgetedRawAllocator;
pub use system::SystemRawAllocator;

use crate::core::errors::MemoryResult;
use crate::core::types::{Address, Size};

/// Native allocation primitive
///
/// Every call is assumed atomic and thread-safe on its own.
pub trait RawAllocator: Send + Sync {
    /// Allocate `bytes` bytes; fails with `OutOfMemory` on exhaustion
    fn alloc(&self, bytes: Size) -> MemoryResult<Address>;

    /// Release an allocation
    ///
    /// # Safety
    /// `address` must have been returned by `alloc`/`realloc` of this allocator
    /// and not released since.
    unsafe fn free(&self, address: Address);

    /// Resize an allocation, preserving its prefix
    ///
    /// # Safety
    /// Same contract as `free`. On success the old address is invalid.
    unsafe fn realloc(&self, address: Address, bytes: Size) -> MemoryResult<Address>;

    /// Set `len` bytes starting at `address` to `byte`
    ///
    /// # Safety
    /// `address..address + len` must lie inside one live allocation.
    unsafe fn fill(&self, address: Address, len: Size, byte: u8);

    /// Copy `len` bytes; the ranges may overlap
    ///
    /// # Safety
    /// Both ranges must lie inside live allocations.
    unsafe fn copy(&self, src: Address, dst: Address, len: Size);

    /// Copy `len` bytes, reversing the byte order of each `element_size` element
    ///
    /// # Safety
    /// Both ranges must lie inside live allocations; `len % element_size == 0`.
    unsafe fn copy_swap(&self, src: Address, dst: Address, len: Size, element_size: Size);

    /// Read one byte
    ///
    /// # Safety
    /// `address` must lie inside a live allocation.
    unsafe fn read_byte(&self, address: Address) -> u8;

    /// Write one byte
    ///
    /// # Safety
    /// `address` must lie inside a live allocation.
    unsafe fn write_byte(&self, address: Address, byte: u8);

    /// Number of `alloc` calls served so far
    fn alloc_calls(&self) -> u64 {
        0
    }
}
