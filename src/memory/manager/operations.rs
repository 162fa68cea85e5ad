/*!
 * Memory Operations
 * Bounds-checked byte operations on tracked blocks
 */

use super::super::types::{CopyMode, MemoryBlock};
use super::MemoryTracker;
use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::types::{Address, Size};
use log::trace;
use std::cmp::Ordering;

impl MemoryTracker {
    /// Validate an access of `length` bytes at `offset` and return the usable address
    ///
    /// Bounds are checked against the requested size, not the padded size.
    pub(super) fn check_bounds(
        &self,
        block: &MemoryBlock,
        offset: Size,
        length: Size,
    ) -> MemoryResult<Address> {
        let live = self.lookup(block.id).ok_or_else(|| {
            MemoryError::illegal_state(format!("block {} is freed or unknown", block.id))
        })?;

        match offset.checked_add(length) {
            Some(end) if end <= live.requested_size => Ok(live.address + offset),
            _ => Err(MemoryError::BoundsViolation {
                offset,
                length,
                size: live.requested_size,
            }),
        }
    }

    /// Set `length` bytes at `offset` to `value`
    pub fn set_memory(
        &self,
        block: &MemoryBlock,
        offset: Size,
        length: Size,
        value: u8,
    ) -> MemoryResult<()> {
        let address = self.check_bounds(block, offset, length)?;
        // SAFETY: check_bounds proved the range lies inside a live block.
        unsafe { self.raw.fill(address, length, value) };
        trace!("Set {} bytes of block {} at offset {} to 0x{:02x}", length, block.id, offset, value);
        Ok(())
    }

    /// Zero `length` bytes at `offset`
    pub fn zero_memory(&self, block: &MemoryBlock, offset: Size, length: Size) -> MemoryResult<()> {
        self.set_memory(block, offset, length, 0)
    }

    /// Copy `length` bytes between (possibly identical) blocks
    pub fn copy_memory(
        &self,
        src: &MemoryBlock,
        src_offset: Size,
        dst: &MemoryBlock,
        dst_offset: Size,
        length: Size,
        mode: CopyMode,
    ) -> MemoryResult<()> {
        mode.validate(length)?;
        let from = self.check_bounds(src, src_offset, length)?;
        let to = self.check_bounds(dst, dst_offset, length)?;

        // SAFETY: both ranges were bounds-checked against live blocks.
        match mode {
            CopyMode::Plain => unsafe { self.raw.copy(from, to, length) },
            CopyMode::ByteSwap { element_size } => unsafe {
                self.raw.copy_swap(from, to, length, element_size)
            },
        }
        trace!(
            "Copied {} bytes from block {}+{} to block {}+{} ({:?})",
            length,
            src.id,
            src_offset,
            dst.id,
            dst_offset,
            mode
        );
        Ok(())
    }

    /// Unsigned byte-wise comparison, stopping at the first difference
    ///
    /// Returns a negative, zero, or positive value like `memcmp`.
    pub fn compare_memory(
        &self,
        a: &MemoryBlock,
        a_offset: Size,
        b: &MemoryBlock,
        b_offset: Size,
        length: Size,
    ) -> MemoryResult<i32> {
        let left = self.check_bounds(a, a_offset, length)?;
        let right = self.check_bounds(b, b_offset, length)?;

        for i in 0..length {
            // SAFETY: both ranges were bounds-checked against live blocks.
            let (x, y) = unsafe { (self.raw.read_byte(left + i), self.raw.read_byte(right + i)) };
            match x.cmp(&y) {
                Ordering::Equal => continue,
                _ => return Ok(x as i32 - y as i32),
            }
        }
        Ok(0)
    }

    /// Write `data` at `offset`
    pub fn write_bytes(&self, block: &MemoryBlock, offset: Size, data: &[u8]) -> MemoryResult<()> {
        let address = self.check_bounds(block, offset, data.len())?;
        for (i, byte) in data.iter().enumerate() {
            // SAFETY: the whole range was bounds-checked above.
            unsafe { self.raw.write_byte(address + i, *byte) };
        }
        Ok(())
    }

    /// Read `length` bytes at `offset`
    pub fn read_bytes(&self, block: &MemoryBlock, offset: Size, length: Size) -> MemoryResult<Vec<u8>> {
        let address = self.check_bounds(block, offset, length)?;
        // SAFETY: the whole range was bounds-checked above.
        Ok((0..length)
            .map(|i| unsafe { self.raw.read_byte(address + i) })
            .collect())
    }
}
