/*!
 * Core Types
 * Common types used across the memory layer
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address type for memory operations
pub type Address = usize;

/// Size type for memory operations
pub type Size = usize;

/// Timestamp in microseconds since the owning tracker was created
pub type Timestamp = u64;

/// Identifier of a tracked block
///
/// Issued from a monotonic counter and never reused, so a handle that
/// outlives its block can never be confused with a newer allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u64);

impl BlockId {
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for BlockId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
