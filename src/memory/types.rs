/*!
 * Memory Types
 * Common types for tracked memory
 */

use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::limits::{ALIGN_CACHE_LINE, ALIGN_NONE, ALIGN_PAGE, ALIGN_WORD};
use crate::core::types::{Address, BlockId, Size, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Required byte boundary for a returned address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentMode {
    /// No alignment (1 byte)
    #[default]
    None,
    /// Machine word (8 bytes)
    Word,
    /// CPU cache line (64 bytes)
    CacheLine,
    /// Memory page (4096 bytes)
    Page,
}

impl AlignmentMode {
    pub const ALL: [AlignmentMode; 4] = [
        AlignmentMode::None,
        AlignmentMode::Word,
        AlignmentMode::CacheLine,
        AlignmentMode::Page,
    ];

    /// Alignment in bytes (always a power of two)
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            AlignmentMode::None => ALIGN_NONE,
            AlignmentMode::Word => ALIGN_WORD,
            AlignmentMode::CacheLine => ALIGN_CACHE_LINE,
            AlignmentMode::Page => ALIGN_PAGE,
        }
    }

    /// Round `value` up to the next multiple of this alignment
    #[inline]
    pub const fn align_up(self, value: usize) -> usize {
        let mask = self.bytes() - 1;
        (value + mask) & !mask
    }

    /// Bytes needed to guarantee an aligned `size`-byte region inside a raw allocation
    #[inline]
    pub fn padded_size(self, size: Size) -> MemoryResult<Size> {
        size.checked_add(self.bytes() - 1)
            .ok_or_else(|| MemoryError::invalid_argument(format!("size {} overflows", size)))
    }

    #[inline]
    pub const fn is_aligned(self, address: Address) -> bool {
        address & (self.bytes() - 1) == 0
    }
}

impl fmt::Display for AlignmentMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AlignmentMode::None => write!(f, "NONE"),
            AlignmentMode::Word => write!(f, "WORD_ALIGNED"),
            AlignmentMode::CacheLine => write!(f, "CACHE_LINE_ALIGNED"),
            AlignmentMode::Page => write!(f, "PAGE_ALIGNED"),
        }
    }
}

impl FromStr for AlignmentMode {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "1" => Ok(AlignmentMode::None),
            "word" | "word_aligned" | "8" => Ok(AlignmentMode::Word),
            "cache_line" | "cache_line_aligned" | "64" => Ok(AlignmentMode::CacheLine),
            "page" | "page_aligned" | "4096" => Ok(AlignmentMode::Page),
            other => Err(MemoryError::invalid_argument(format!(
                "unknown alignment mode: {}",
                other
            ))),
        }
    }
}

/// Snapshot of a tracked allocation
///
/// The snapshot is a handle: liveness is decided by the tracker's registry,
/// never by the `freed` flag of a copy held by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBlock {
    pub id: BlockId,
    /// Usable, aligned address
    pub address: Address,
    /// Address returned by the raw primitive
    pub raw_address: Address,
    pub requested_size: Size,
    pub padded_size: Size,
    pub alignment: AlignmentMode,
    pub created_at: Timestamp,
    pub freed: bool,
    pub freed_at: Option<Timestamp>,
}

impl MemoryBlock {
    /// Alignment slack between the raw and the usable address
    #[inline]
    pub fn padding(&self) -> Size {
        self.address - self.raw_address
    }

    /// One past the last usable byte
    #[inline]
    pub fn end(&self) -> Address {
        self.address + self.requested_size
    }
}

/// Copy behavior for `copy_memory`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CopyMode {
    /// Byte-for-byte copy
    #[default]
    Plain,
    /// Reverse the byte order of every `element_size`-byte element
    ByteSwap { element_size: usize },
}

impl CopyMode {
    pub(crate) fn validate(self, length: Size) -> MemoryResult<()> {
        match self {
            CopyMode::Plain => Ok(()),
            CopyMode::ByteSwap { element_size } => {
                if !matches!(element_size, 2 | 4 | 8) {
                    return Err(MemoryError::invalid_argument(format!(
                        "byte swap element size must be 2, 4 or 8, got {}",
                        element_size
                    )));
                }
                if length % element_size != 0 {
                    return Err(MemoryError::invalid_argument(format!(
                        "length {} is not a multiple of element size {}",
                        length, element_size
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Tracked allocator statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_allocated: Size,
    pub total_freed: Size,
    pub current_allocated: Size,
    pub peak_allocated: Size,
    pub active_blocks: usize,
    pub average_block_size: f64,
    pub pressure: MemoryPressure,
}

/// Memory pressure levels relative to the raw budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryPressure {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for MemoryPressure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MemoryPressure::Low => write!(f, "LOW"),
            MemoryPressure::Medium => write!(f, "MEDIUM"),
            MemoryPressure::High => write!(f, "HIGH"),
            MemoryPressure::Critical => write!(f, "CRITICAL"),
        }
    }
}
