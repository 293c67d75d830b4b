//! Heap Context and Region Manager
//!
//! [`Heap`] bundles everything one managed heap needs: the region, the
//! head of the address-ordered free list and the stack probe that feeds
//! the ceiling. Allocation lives in `first_fit`, deallocation in
//! `coalesce`; both extend this type.
//!
//! A `Heap` has no locking of its own. Every mutating operation takes
//! `&mut self`; callers that share a heap between execution contexts must
//! serialize access themselves (see [`LockedHeap`](super::LockedHeap)).

use super::address::{HeapAddr, STACK_MARGIN};
use super::block::{header_of, BlockHeader, HEADER_SIZE};
use super::region::Region;
use crate::error::HeapError;
use crate::platform::StackProbe;

/// One managed heap.
pub struct Heap<'a, P> {
    pub(super) region: Region<'a>,
    /// Lowest-addressed free block.
    pub(super) free_head: Option<HeapAddr>,
    probe: P,
}

/// Point-in-time usage figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
    /// Bytes between `heap_start` and `heap_end`.
    pub claimed: usize,
    /// Payload bytes sitting on the free list.
    pub free_bytes: usize,
    /// Number of free-list entries.
    pub free_blocks: usize,
    /// Largest single free payload.
    pub largest_free: usize,
    /// Bytes still claimable below the ceiling.
    pub headroom: usize,
}

/// A free-list entry as seen by [`Heap::free_blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
    /// Header address.
    pub addr: HeapAddr,
    /// Payload size.
    pub size: usize,
}

impl<'a, P: StackProbe> Heap<'a, P> {
    /// Set up a heap over `arena`, whose first byte lives at `base`.
    ///
    /// The ceiling is taken from `probe` right away: the stack pointer it
    /// reports minus [`STACK_MARGIN`]. The heap starts empty.
    ///
    /// # Errors
    /// `BoundsViolation` if the ceiling lies below the (aligned) start of
    /// the arena.
    pub fn initialize(arena: &'a mut [u8], base: usize, probe: P) -> Result<Self, HeapError> {
        let region = Region::new(arena, HeapAddr::new(base))?;
        let mut heap = Self {
            region,
            free_head: None,
            probe,
        };
        heap.reinitialize()?;

        log::debug!(
            "heap initialized: start {} ceiling {} arena end {}",
            heap.heap_start(),
            heap.stack_limit(),
            heap.region.arena_end()
        );
        Ok(heap)
    }

    /// Forget every block and start over with a fresh ceiling.
    ///
    /// On error the heap is left untouched.
    pub fn reinitialize(&mut self) -> Result<(), HeapError> {
        let limit = self.probe_ceiling()?;
        self.region.set_stack_limit(limit);
        self.region.reset();
        self.free_head = None;
        Ok(())
    }

    /// Re-read the stack pointer and move the ceiling.
    ///
    /// Must be called whenever the caller's stack depth assumptions change;
    /// the heap never polls the probe on its own.
    ///
    /// # Errors
    /// - `BoundsViolation` if the new ceiling lies below `heap_start`
    /// - `BoundaryConflict` if it lies below the current `heap_end`
    pub fn recompute_ceiling(&mut self) -> Result<(), HeapError> {
        let limit = self.probe_ceiling()?;
        if limit < self.region.heap_end() {
            log::warn!(
                "stack ceiling {} would strand claimed heap up to {}",
                limit,
                self.region.heap_end()
            );
            return Err(HeapError::BoundaryConflict);
        }

        log::debug!("heap ceiling {} -> {}", self.region.stack_limit(), limit);
        self.region.set_stack_limit(limit);
        Ok(())
    }

    fn probe_ceiling(&self) -> Result<HeapAddr, HeapError> {
        let limit = HeapAddr::new(self.probe.stack_pointer())
            .checked_sub(STACK_MARGIN)
            .filter(|&limit| limit >= self.region.heap_start());

        limit.ok_or_else(|| {
            log::warn!(
                "stack pointer {:#x} leaves no room above heap start {}",
                self.probe.stack_pointer(),
                self.region.heap_start()
            );
            HeapError::BoundsViolation
        })
    }

    /// First usable heap address.
    #[inline]
    pub fn heap_start(&self) -> HeapAddr {
        self.region.heap_start()
    }

    /// End (exclusive) of claimed memory.
    #[inline]
    pub fn heap_end(&self) -> HeapAddr {
        self.region.heap_end()
    }

    /// Stack-derived ceiling from the last (re)computation.
    #[inline]
    pub fn stack_limit(&self) -> HeapAddr {
        self.region.stack_limit()
    }

    /// Bytes still claimable.
    #[inline]
    pub fn headroom(&self) -> usize {
        self.region.headroom()
    }

    /// Point the list link of `prev` (or the list head) at `next`.
    pub(super) fn link_after(
        &mut self,
        prev: Option<HeapAddr>,
        next: Option<HeapAddr>,
    ) -> Result<(), HeapError> {
        match prev {
            None => self.free_head = next,
            Some(at) => {
                let header = self.region.read_header(at)?;
                self.region.write_header(at, BlockHeader::new(header.size, next))?;
            }
        }
        Ok(())
    }

    /// Iterate the free list in address order.
    pub fn free_blocks(&self) -> FreeBlocks<'_, 'a> {
        FreeBlocks {
            region: &self.region,
            cursor: self.free_head,
            last: None,
        }
    }

    /// Usage summary.
    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats {
            claimed: self.region.claimed(),
            headroom: self.region.headroom(),
            ..HeapStats::default()
        };
        for block in self.free_blocks() {
            stats.free_blocks += 1;
            stats.free_bytes += block.size;
            stats.largest_free = stats.largest_free.max(block.size);
        }
        stats
    }

    /// Mutable view of the first `len` payload bytes of an allocation.
    ///
    /// Returns `None` if `payload` does not start a block in this heap or
    /// `len` exceeds the block's payload size.
    pub fn payload_mut(&mut self, payload: HeapAddr, len: usize) -> Option<&mut [u8]> {
        let header = self.region.read_header(header_of(payload)?).ok()?;
        if len > header.size {
            return None;
        }
        self.region.bytes_mut(payload, len)
    }

    /// Raw pointer to a payload, for handing memory to foreign code.
    pub fn payload_ptr(&mut self, payload: HeapAddr) -> Option<*mut u8> {
        self.region.as_mut_ptr(payload)
    }

    /// Payload capacity of the block at `payload` (at least the requested
    /// size, rounded up).
    pub fn usable_size(&self, payload: HeapAddr) -> Option<usize> {
        let at = header_of(payload)?;
        if !self.region.contains(at, HEADER_SIZE) {
            return None;
        }
        self.region.read_header(at).ok().map(|header| header.size)
    }
}

/// Iterator over free-list entries.
///
/// Stops early if the list is not strictly ascending or a header cannot
/// be read, so a corrupted list never loops forever.
pub struct FreeBlocks<'h, 'a> {
    region: &'h Region<'a>,
    cursor: Option<HeapAddr>,
    last: Option<HeapAddr>,
}

impl Iterator for FreeBlocks<'_, '_> {
    type Item = FreeBlock;

    fn next(&mut self) -> Option<FreeBlock> {
        let at = self.cursor.take()?;
        if self.last.is_some_and(|last| at <= last) {
            return None;
        }
        let header = self.region.read_header(at).ok()?;
        self.last = Some(at);
        self.cursor = header.next;
        Some(FreeBlock {
            addr: at,
            size: header.size,
        })
    }
}
