//! Heap Region and Boundary Primitive
//!
//! The region is the contiguous byte range `[heap_start, heap_end)` carved
//! out of a backing arena. `heap_end` moves only through
//! [`Region::adjust_bound`], which refuses to cross the current ceiling:
//! the lower of the stack limit and the end of the arena.
//!
//! # Memory Layout
//! ```text
//! base   heap_start          heap_end        ceiling    arena_end
//! |pad   |####claimed#######|....headroom....|..........|
//! ```
//!
//! The arena is held as a raw base pointer rather than a slice. Every
//! header access and every payload pointer is derived from that one
//! pointer, so pointers handed out for live blocks stay valid while the
//! heap keeps rewriting headers elsewhere in the arena.

use core::marker::PhantomData;
use core::ptr::{self, NonNull};

use super::address::{align_up, HeapAddr};
use super::block::{BlockHeader, HEADER_SIZE};
use crate::error::HeapError;

/// Region state of one managed heap.
pub struct Region<'a> {
    /// First arena byte; lives at `base`.
    ptr: NonNull<u8>,
    /// Arena length in bytes.
    len: usize,
    /// Address of the first arena byte.
    base: HeapAddr,
    /// First usable (aligned) heap address.
    heap_start: HeapAddr,
    /// End (exclusive) of claimed memory.
    heap_end: HeapAddr,
    /// Stack-derived ceiling for `heap_end`.
    stack_limit: HeapAddr,
    _arena: PhantomData<&'a mut [u8]>,
}

// SAFETY: A Region is the sole owner of its arena for 'a, exactly like the
// `&'a mut [u8]` it was built from.
unsafe impl Send for Region<'_> {}

impl<'a> Region<'a> {
    /// Wrap an arena whose first byte lives at address `base`.
    ///
    /// The region starts empty with a ceiling of `heap_start`; the owner
    /// installs the real stack limit afterwards.
    pub fn new(arena: &'a mut [u8], base: HeapAddr) -> Result<Self, HeapError> {
        let arena_end = base
            .checked_add(arena.len())
            .ok_or(HeapError::BoundsViolation)?;
        let heap_start = align_up(base.as_usize())
            .map(HeapAddr::new)
            .filter(|&start| start <= arena_end)
            .ok_or(HeapError::BoundsViolation)?;

        let len = arena.len();
        Ok(Self {
            ptr: NonNull::from(arena).cast::<u8>(),
            len,
            base,
            heap_start,
            heap_end: heap_start,
            stack_limit: heap_start,
            _arena: PhantomData,
        })
    }

    /// First usable heap address.
    #[inline]
    pub fn heap_start(&self) -> HeapAddr {
        self.heap_start
    }

    /// End (exclusive) of claimed memory.
    #[inline]
    pub fn heap_end(&self) -> HeapAddr {
        self.heap_end
    }

    /// Current stack-derived ceiling.
    #[inline]
    pub fn stack_limit(&self) -> HeapAddr {
        self.stack_limit
    }

    /// End (exclusive) of the backing arena.
    #[inline]
    pub fn arena_end(&self) -> HeapAddr {
        HeapAddr::new(self.base.as_usize() + self.len)
    }

    /// Highest address `heap_end` may reach right now.
    #[inline]
    pub fn ceiling(&self) -> HeapAddr {
        self.stack_limit.min(self.arena_end())
    }

    /// Bytes of claimed memory.
    #[inline]
    pub fn claimed(&self) -> usize {
        self.heap_end.as_usize() - self.heap_start.as_usize()
    }

    /// Bytes that can still be claimed before hitting the ceiling.
    #[inline]
    pub fn headroom(&self) -> usize {
        self.ceiling().as_usize().saturating_sub(self.heap_end.as_usize())
    }

    /// Install a new stack limit. Callers validate it first.
    #[inline]
    pub(crate) fn set_stack_limit(&mut self, limit: HeapAddr) {
        self.stack_limit = limit;
    }

    /// Drop every claim: `heap_end = heap_start`.
    #[inline]
    pub(crate) fn reset(&mut self) {
        self.heap_end = self.heap_start;
    }

    /// Check that `[at, at + len)` lies inside claimed memory.
    pub fn contains(&self, at: HeapAddr, len: usize) -> bool {
        match at.checked_add(len) {
            Some(end) => at >= self.heap_start && end <= self.heap_end,
            None => false,
        }
    }

    /// Grow (`delta > 0`) or shrink (`delta < 0`) the claimed region.
    ///
    /// Returns the previous `heap_end`, which for growth is the start of
    /// the newly claimed bytes.
    ///
    /// # Errors
    /// - `OutOfMemory` if growth would pass the ceiling
    /// - `BoundsViolation` if shrinking would drop below `heap_start`
    pub fn adjust_bound(&mut self, delta: isize) -> Result<HeapAddr, HeapError> {
        let previous = self.heap_end;

        let new_end = if delta >= 0 {
            previous
                .checked_add(delta.unsigned_abs())
                .filter(|&end| end <= self.ceiling())
                .ok_or(HeapError::OutOfMemory)?
        } else {
            previous
                .checked_sub(delta.unsigned_abs())
                .filter(|&end| end >= self.heap_start)
                .ok_or(HeapError::BoundsViolation)?
        };

        self.heap_end = new_end;
        log::debug!(
            "heap bound moved {} -> {} (delta {}, ceiling {})",
            previous,
            new_end,
            delta,
            self.ceiling()
        );
        Ok(previous)
    }

    /// Arena offset of `[at, at + len)`, restricted to claimed memory.
    fn offset(&self, at: HeapAddr, len: usize) -> Option<usize> {
        if !self.contains(at, len) {
            return None;
        }
        at.offset_from(self.base).filter(|&off| off + len <= self.len)
    }

    /// Read the header stored at `at`.
    pub(crate) fn read_header(&self, at: HeapAddr) -> Result<BlockHeader, HeapError> {
        let off = self.offset(at, HEADER_SIZE).ok_or(HeapError::CorruptHeader)?;
        let mut bytes = [0u8; HEADER_SIZE];
        // SAFETY: `off + HEADER_SIZE <= len`, so the source lies inside the arena.
        unsafe {
            ptr::copy_nonoverlapping(self.ptr.as_ptr().add(off), bytes.as_mut_ptr(), HEADER_SIZE);
        }
        BlockHeader::decode(bytes, self.heap_start)
    }

    /// Store `header` at `at`.
    pub(crate) fn write_header(&mut self, at: HeapAddr, header: BlockHeader) -> Result<(), HeapError> {
        let off = self.offset(at, HEADER_SIZE).ok_or(HeapError::CorruptHeader)?;
        let bytes = header.encode(self.heap_start)?;
        // SAFETY: `off + HEADER_SIZE <= len`, so the destination lies inside the arena.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr.as_ptr().add(off), HEADER_SIZE);
        }
        Ok(())
    }

    /// Mutable view of `len` claimed bytes starting at `at`.
    pub(crate) fn bytes_mut(&mut self, at: HeapAddr, len: usize) -> Option<&mut [u8]> {
        let off = self.offset(at, len)?;
        // SAFETY: The range lies inside the arena and the borrow of `self`
        // keeps every other access out for the slice's lifetime.
        Some(unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr().add(off), len) })
    }

    /// Raw pointer to the claimed byte at `at`.
    pub(crate) fn as_mut_ptr(&mut self, at: HeapAddr) -> Option<*mut u8> {
        let off = self.offset(at, 1)?;
        // SAFETY: `off < len`.
        Some(unsafe { self.ptr.as_ptr().add(off) })
    }
}
