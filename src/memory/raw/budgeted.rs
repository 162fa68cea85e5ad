/*!
 * Budgeted Raw Allocator
 * Caps the bytes a raw allocator may hand out at once
 */

use super::RawAllocator;
use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::types::{Address, Size};
use ahash::RandomState;
use dashmap::DashMap;
use log::{debug, warn};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Raw allocator decorator enforcing a byte budget
pub struct BudgetedRawAllocator<R: RawAllocator> {
    inner: R,
    budget: Size,
    used: AtomicUsize,
    sizes: DashMap<Address, Size, RandomState>,
}

impl<R: RawAllocator> BudgetedRawAllocator<R> {
    pub fn new(inner: R, budget: Size) -> Self {
        debug!("Budgeted raw allocator created with {} bytes", budget);
        Self {
            inner,
            budget,
            used: AtomicUsize::new(0),
            sizes: DashMap::with_hasher(RandomState::new()),
        }
    }

    pub fn budget(&self) -> Size {
        self.budget
    }

    pub fn used(&self) -> Size {
        self.used.load(Ordering::SeqCst)
    }

    pub fn available(&self) -> Size {
        self.budget.saturating_sub(self.used())
    }

    /// Reserve `bytes` against the budget, reverting on overflow
    fn reserve(&self, bytes: Size) -> MemoryResult<()> {
        let used = self.used.fetch_add(bytes, Ordering::SeqCst);
        if used.saturating_add(bytes) > self.budget {
            self.used.fetch_sub(bytes, Ordering::SeqCst);
            let available = self.budget.saturating_sub(used);
            warn!(
                "Raw budget exhausted: requested {} bytes, {} available ({} / {})",
                bytes, available, used, self.budget
            );
            return Err(MemoryError::out_of_memory(bytes, available));
        }
        Ok(())
    }
}

impl<R: RawAllocator> RawAllocator for BudgetedRawAllocator<R> {
    fn alloc(&self, bytes: Size) -> MemoryResult<Address> {
        self.reserve(bytes)?;
        match self.inner.alloc(bytes) {
            Ok(address) => {
                self.sizes.insert(address, bytes);
                Ok(address)
            }
            Err(e) => {
                self.used.fetch_sub(bytes, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    unsafe fn free(&self, address: Address) {
        if let Some((_, size)) = self.sizes.remove(&address) {
            self.used.fetch_sub(size, Ordering::SeqCst);
        }
        self.inner.free(address);
    }

    unsafe fn realloc(&self, address: Address, bytes: Size) -> MemoryResult<Address> {
        let old = self.sizes.get(&address).map(|e| *e.value()).unwrap_or(0);
        let growth = bytes.saturating_sub(old);
        if growth > 0 {
            self.reserve(growth)?;
        }

        match self.inner.realloc(address, bytes) {
            Ok(new_address) => {
                self.sizes.remove(&address);
                self.sizes.insert(new_address, bytes);
                let shrink = old.saturating_sub(bytes);
                if shrink > 0 {
                    self.used.fetch_sub(shrink, Ordering::SeqCst);
                }
                Ok(new_address)
            }
            Err(e) => {
                if growth > 0 {
                    self.used.fetch_sub(growth, Ordering::SeqCst);
                }
                Err(e)
            }
        }
    }

    unsafe fn fill(&self, address: Address, len: Size, byte: u8) {
        self.inner.fill(address, len, byte)
    }

    unsafe fn copy(&self, src: Address, dst: Address, len: Size) {
        self.inner.copy(src, dst, len)
    }

    unsafe fn copy_swap(&self, src: Address, dst: Address, len: Size, element_size: Size) {
        self.inner.copy_swap(src, dst, len, element_size)
    }

    unsafe fn read_byte(&self, address: Address) -> u8 {
        self.inner.read_byte(address)
    }

    unsafe fn write_byte(&self, address: Address, byte: u8) {
        self.inner.write_byte(address, byte)
    }

    fn alloc_calls(&self) -> u64 {
        self.inner.alloc_calls()
    }
}
