/*!
 * Tracked Allocation
 * Allocation, deallocation, and reallocation logic
 */

use super::super::types::{AlignmentMode, MemoryBlock, MemoryPressure};
use super::MemoryTracker;
use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::types::{BlockId, Size};
use log::{debug, error, warn};
use std::sync::atomic::Ordering;

impl MemoryTracker {
    /// Allocate `size` usable bytes whose address is aligned to `alignment`
    pub fn allocate(&self, size: Size, alignment: AlignmentMode) -> MemoryResult<MemoryBlock> {
        if size == 0 {
            return Err(MemoryError::invalid_argument("allocation size must be > 0"));
        }

        let padded_size = alignment.padded_size(size)?;
        let raw_address = self.raw.alloc(padded_size).map_err(|e| {
            error!(
                "OOM: raw allocation of {} bytes ({} requested, {}) failed: {}",
                padded_size, size, alignment, e
            );
            e
        })?;
        if raw_address == 0 {
            error!("OOM: raw allocator returned a null address for {} bytes", padded_size);
            return Err(MemoryError::out_of_memory(padded_size, 0));
        }

        let block = MemoryBlock {
            id: self.next_block_id(),
            address: alignment.align_up(raw_address),
            raw_address,
            requested_size: size,
            padded_size,
            alignment,
            created_at: self.now(),
            freed: false,
            freed_at: None,
        };

        self.blocks.insert(block.id, block.clone());
        let current = self.counters.add_allocation(padded_size);

        match self.check_memory_pressure(current) {
            level @ (MemoryPressure::High | MemoryPressure::Critical) => warn!(
                "Memory pressure {}: allocated block {} ({} bytes at 0x{:x}), {} bytes held",
                level,
                block.id,
                size,
                block.address,
                current
            ),
            _ => debug!(
                "Allocated block {} ({} bytes, {} padded) at 0x{:x} [{}]",
                block.id, size, padded_size, block.address, alignment
            ),
        }

        Ok(block)
    }

    /// Free a live block
    ///
    /// Unknown or already freed handles fail with `IllegalState`; a double
    /// free is an error, never a silent no-op.
    pub fn free(&self, block: &MemoryBlock) -> MemoryResult<MemoryBlock> {
        let Some((_, mut live)) = self.blocks.remove(&block.id) else {
            warn!(
                "Attempted to free unknown or already freed block {} at 0x{:x}",
                block.id, block.address
            );
            return Err(MemoryError::illegal_state(format!(
                "block {} is not allocated",
                block.id
            )));
        };

        // SAFETY: the registry entry proves raw_address is a live raw allocation,
        // and removing it above makes this the only release.
        unsafe { self.raw.free(live.raw_address) };
        self.counters.remove_allocation(live.padded_size);

        live.freed = true;
        live.freed_at = Some(self.now());

        debug!(
            "Freed block {} ({} bytes at 0x{:x}), {} bytes still held",
            live.id,
            live.requested_size,
            live.address,
            self.counters.current_allocated()
        );
        Ok(live)
    }

    /// Resize a live block
    ///
    /// The old id is retired and the result carries a new one. The usable
    /// address keeps the block's alignment; contents are preserved up to the
    /// smaller of the two sizes.
    pub fn reallocate(&self, block: &MemoryBlock, new_size: Size) -> MemoryResult<MemoryBlock> {
        if new_size == 0 {
            return Err(MemoryError::invalid_argument("reallocation size must be > 0"));
        }

        // Claim the block so no concurrent free can race the raw realloc
        let Some((_, old)) = self.blocks.remove(&block.id) else {
            warn!("Attempted to reallocate freed or unknown block {}", block.id);
            return Err(MemoryError::illegal_state(format!(
                "cannot reallocate block {}: not allocated",
                block.id
            )));
        };

        let padded_size = match old.alignment.padded_size(new_size) {
            Ok(padded) => padded,
            Err(e) => {
                self.blocks.insert(old.id, old);
                return Err(e);
            }
        };

        // SAFETY: the claimed registry entry proves raw_address is live.
        let new_raw = match unsafe { self.raw.realloc(old.raw_address, padded_size) } {
            Ok(address) => address,
            Err(e) => {
                error!(
                    "Reallocation of block {} to {} bytes failed: {}",
                    old.id, new_size, e
                );
                self.blocks.insert(old.id, old);
                return Err(e);
            }
        };

        let address = old.alignment.align_up(new_raw);
        let old_padding = old.padding();
        let new_padding = address - new_raw;
        if old_padding != new_padding {
            // realloc kept the bytes at their old offset from the raw start
            // SAFETY: both ranges lie within the first padded_size bytes of new_raw.
            unsafe {
                self.raw.copy(
                    new_raw + old_padding,
                    address,
                    old.requested_size.min(new_size),
                )
            };
        }

        let resized = MemoryBlock {
            id: self.next_block_id(),
            address,
            raw_address: new_raw,
            requested_size: new_size,
            padded_size,
            alignment: old.alignment,
            created_at: self.now(),
            freed: false,
            freed_at: None,
        };

        self.blocks.insert(resized.id, resized.clone());
        self.counters.resize_allocation(old.padded_size, padded_size);

        debug!(
            "Reallocated block {} -> {} ({} -> {} bytes) at 0x{:x}",
            old.id, resized.id, old.requested_size, new_size, address
        );
        Ok(resized)
    }

    /// Check if a handle still refers to a live block
    pub fn is_live(&self, block: &MemoryBlock) -> bool {
        self.blocks.contains_key(&block.id)
    }

    fn next_block_id(&self) -> BlockId {
        BlockId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}
