//! Heap Address Type and Build-Time Layout Constants
//!
//! Heap addresses are plain integers wrapped in a newtype so they cannot
//! be confused with arena offsets or sizes. They are never dereferenced
//! directly; all access goes through the owning [`Region`](super::region::Region).

use core::fmt;

/// Alignment granularity in bytes.
///
/// All payload sizes are rounded up to this value and every header starts
/// on this boundary, so a misaligned word access can never fault.
pub const ALIGNMENT: usize = 8;
/// Alignment mask
pub const ALIGN_MASK: usize = ALIGNMENT - 1;

/// Bytes reserved between the heap ceiling and the live stack pointer.
///
/// Absorbs the few words the stack-overflow check writes below `sp`.
pub const STACK_MARGIN: usize = 16;

const _: () = assert!(ALIGNMENT.is_power_of_two());
const _: () = assert!(STACK_MARGIN % ALIGNMENT == 0);

/// Round `value` up to the next multiple of [`ALIGNMENT`].
///
/// Returns `None` if the result does not fit in a `usize`.
#[inline]
pub const fn align_up(value: usize) -> Option<usize> {
    match value.checked_add(ALIGN_MASK) {
        Some(v) => Some(v & !ALIGN_MASK),
        None => None,
    }
}

/// An address inside (or claimed to be inside) a managed heap.
///
/// `HeapAddr::NULL` plays the role of the null pointer at the allocator
/// interface.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct HeapAddr(usize);

impl HeapAddr {
    /// The null address.
    pub const NULL: Self = Self(0);

    /// Create a new heap address.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Check for the null address.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Check if the address is aligned to [`ALIGNMENT`].
    #[inline]
    pub const fn is_aligned(self) -> bool {
        self.0 & ALIGN_MASK == 0
    }

    /// Add a byte offset, failing on overflow.
    #[inline]
    pub const fn checked_add(self, offset: usize) -> Option<Self> {
        match self.0.checked_add(offset) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Subtract a byte offset, failing on underflow.
    #[inline]
    pub const fn checked_sub(self, offset: usize) -> Option<Self> {
        match self.0.checked_sub(offset) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Distance in bytes from `base` up to this address.
    #[inline]
    pub const fn offset_from(self, base: Self) -> Option<usize> {
        self.0.checked_sub(base.0)
    }
}

impl fmt::Debug for HeapAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeapAddr({:#010x})", self.0)
    }
}

impl fmt::Display for HeapAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0), Some(0));
        assert_eq!(align_up(1), Some(8));
        assert_eq!(align_up(10), Some(16));
        assert_eq!(align_up(16), Some(16));
        assert_eq!(align_up(usize::MAX), None);
    }

    #[test]
    fn test_addr_arithmetic() {
        let addr = HeapAddr::new(0x4000_0010);
        assert!(addr.is_aligned());
        assert!(!HeapAddr::new(0x4000_0013).is_aligned());
        assert_eq!(addr.checked_sub(8), Some(HeapAddr::new(0x4000_0008)));
        assert_eq!(HeapAddr::new(4).checked_sub(8), None);
        assert_eq!(addr.offset_from(HeapAddr::new(0x4000_0000)), Some(0x10));
        assert_eq!(HeapAddr::new(usize::MAX).checked_add(1), None);
    }
}
