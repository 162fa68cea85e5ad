/*!
 * System Raw Allocator
 * libc malloc/free/realloc with pointer-level byte operations
 */

use super::RawAllocator;
use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::types::{Address, Size};
use log::error;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Raw allocator backed by the C heap
#[derive(Debug, Default)]
pub struct SystemRawAllocator {
    alloc_calls: AtomicU64,
}

impl SystemRawAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RawAllocator for SystemRawAllocator {
    fn alloc(&self, bytes: Size) -> MemoryResult<Address> {
        // SAFETY: malloc has no preconditions; a null result is handled below.
        let ptr = unsafe { libc::malloc(bytes) };
        if ptr.is_null() {
            error!("malloc({}) returned null", bytes);
            return Err(MemoryError::out_of_memory(bytes, 0));
        }
        self.alloc_calls.fetch_add(1, Ordering::Relaxed);
        Ok(ptr as Address)
    }

    unsafe fn free(&self, address: Address) {
        libc::free(address as *mut libc::c_void);
    }

    unsafe fn realloc(&self, address: Address, bytes: Size) -> MemoryResult<Address> {
        let ptr = libc::realloc(address as *mut libc::c_void, bytes);
        if ptr.is_null() {
            error!("realloc(0x{:x}, {}) returned null", address, bytes);
            return Err(MemoryError::out_of_memory(bytes, 0));
        }
        Ok(ptr as Address)
    }

    unsafe fn fill(&self, address: Address, len: Size, byte: u8) {
        ptr::write_bytes(address as *mut u8, byte, len);
    }

    unsafe fn copy(&self, src: Address, dst: Address, len: Size) {
        ptr::copy(src as *const u8, dst as *mut u8, len);
    }

    unsafe fn copy_swap(&self, src: Address, dst: Address, len: Size, element_size: Size) {
        // Stage through a buffer so overlapping ranges swap correctly
        let mut staged = vec![0u8; len];
        ptr::copy_nonoverlapping(src as *const u8, staged.as_mut_ptr(), len);
        for element in staged.chunks_exact_mut(element_size) {
            element.reverse();
        }
        ptr::copy_nonoverlapping(staged.as_ptr(), dst as *mut u8, len);
    }

    unsafe fn read_byte(&self, address: Address) -> u8 {
        ptr::read(address as *const u8)
    }

    unsafe fn write_byte(&self, address: Address, byte: u8) {
        ptr::write(address as *mut u8, byte);
    }

    fn alloc_calls(&self) -> u64 {
        self.alloc_calls.load(Ordering::Relaxed)
    }
}
