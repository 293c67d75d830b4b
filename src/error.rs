//! Heap Error Taxonomy
//!
//! Every failure is returned to the immediate caller. The heap never
//! panics on bad input and never retries internally; the caller decides
//! which errors are fatal.

use core::fmt;

/// Errors reported by the heap and its region manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    /// The stack-derived ceiling lies below the start of the heap.
    BoundsViolation,
    /// A new ceiling would strand memory that is already claimed.
    BoundaryConflict,
    /// Neither the free list nor the region can satisfy the request.
    OutOfMemory,
    /// Zero-sized allocation request.
    InvalidArgument,
    /// Pointer is null, misaligned or outside the managed region.
    InvalidPointer,
    /// A block header could not be read from or written to the arena.
    CorruptHeader,
}

impl HeapError {
    /// Numeric status code, as returned by the C-style entry points.
    ///
    /// `-2` and `-1` keep the meaning firmware callers already check for:
    /// "stack below heap" and "stack inside used heap". These are the only
    /// codes `LockedHeap::update_heap_size` returns. The remaining variants
    /// map to errno-style values (`ENOMEM`, `EINVAL`, `EFAULT`, `EIO`) for
    /// callers that forward a `HeapError` across a C boundary themselves.
    pub const fn code(self) -> i32 {
        match self {
            Self::BoundsViolation => -2,
            Self::BoundaryConflict => -1,
            Self::OutOfMemory => -12,
            Self::InvalidArgument => -22,
            Self::InvalidPointer => -14,
            Self::CorruptHeader => -5,
        }
    }
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BoundsViolation => write!(f, "stack ceiling below heap start"),
            Self::BoundaryConflict => write!(f, "stack ceiling inside claimed heap"),
            Self::OutOfMemory => write!(f, "out of heap memory"),
            Self::InvalidArgument => write!(f, "zero-sized allocation"),
            Self::InvalidPointer => write!(f, "pointer not owned by this heap"),
            Self::CorruptHeader => write!(f, "block header outside arena"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firmware_codes() {
        assert_eq!(HeapError::BoundsViolation.code(), -2);
        assert_eq!(HeapError::BoundaryConflict.code(), -1);
    }

    #[test]
    fn test_errno_style_codes() {
        assert_eq!(HeapError::OutOfMemory.code(), -12);
        assert_eq!(HeapError::InvalidArgument.code(), -22);
        assert_eq!(HeapError::InvalidPointer.code(), -14);
        assert_eq!(HeapError::CorruptHeader.code(), -5);
    }

    #[test]
    fn test_display() {
        assert_eq!(HeapError::OutOfMemory.to_string(), "out of heap memory");
    }
}
