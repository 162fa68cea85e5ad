/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Memory operation result
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum MemoryError {
    #[error("Invalid argument: {0}")]
    #[diagnostic(
        code(memory::invalid_argument),
        help("Sizes must be positive and element sizes must divide the copied length.")
    )]
    InvalidArgument(String),

    #[error("Out of memory: requested {requested} bytes, available {available} bytes")]
    #[diagnostic(
        code(memory::out_of_memory),
        help("The allocator or its size class is exhausted. Free or reset before retrying.")
    )]
    OutOfMemory { requested: usize, available: usize },

    #[error("Illegal state: {0}")]
    #[diagnostic(
        code(memory::illegal_state),
        help("The handle is unknown, already freed, or owned by another allocator.")
    )]
    IllegalState(String),

    #[error("Bounds violation: offset {offset} + length {length} exceeds block size {size}")]
    #[diagnostic(
        code(memory::bounds_violation),
        help("Accesses are checked against the requested size, not the padded size.")
    )]
    BoundsViolation {
        offset: usize,
        length: usize,
        size: usize,
    },
}

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidArgument,
    OutOfMemory,
    IllegalState,
    BoundsViolation,
}

impl MemoryError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        MemoryError::InvalidArgument(msg.into())
    }

    pub fn illegal_state(msg: impl Into<String>) -> Self {
        MemoryError::IllegalState(msg.into())
    }

    pub fn out_of_memory(requested: usize, available: usize) -> Self {
        MemoryError::OutOfMemory {
            requested,
            available,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MemoryError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            MemoryError::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            MemoryError::IllegalState(_) => ErrorKind::IllegalState,
            MemoryError::BoundsViolation { .. } => ErrorKind::BoundsViolation,
        }
    }
}
