//! Heap Integrity Check
//!
//! Walks the free list and the region bounds and reports every broken
//! invariant as a flag. An empty set means the heap is consistent.

use bitflags::bitflags;

use super::address::{HeapAddr, ALIGNMENT};
use super::heap::Heap;
use crate::platform::StackProbe;

bitflags! {
    /// Invariant violations found by [`Heap::check_integrity`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Violations: u16 {
        /// A free block lies (partly) outside `[heap_start, heap_end)`.
        const OUT_OF_BOUNDS = 1 << 0;
        /// A free block header is not aligned.
        const MISALIGNED = 1 << 1;
        /// Free list is not strictly ascending (includes cycles).
        const UNORDERED = 1 << 2;
        /// Two free blocks touch and were not merged.
        const ADJACENT = 1 << 3;
        /// A free block has a zero or unaligned payload size.
        const BAD_SIZE = 1 << 4;
        /// A free block ends at `heap_end` and was not reclaimed.
        const UNRECLAIMED_TAIL = 1 << 5;
        /// `heap_end` lies above the stack ceiling.
        const ABOVE_CEILING = 1 << 6;
        /// A header could not be decoded.
        const UNREADABLE = 1 << 7;
    }
}

impl<P: StackProbe> Heap<'_, P> {
    /// Check region bounds and free-list invariants.
    ///
    /// Runs in O(n) over the free list and stops at the first structural
    /// break (unreadable, out of bounds or unordered entry).
    pub fn check_integrity(&self) -> Violations {
        let mut found = Violations::empty();
        if self.region.heap_end() > self.region.stack_limit() {
            found |= Violations::ABOVE_CEILING;
        }

        let mut last: Option<(HeapAddr, HeapAddr)> = None;
        let mut cursor = self.free_head;

        while let Some(at) = cursor {
            if last.is_some_and(|(prev_at, _)| at <= prev_at) {
                found |= Violations::UNORDERED;
                break;
            }
            if !at.is_aligned() {
                found |= Violations::MISALIGNED;
            }

            let Ok(header) = self.region.read_header(at) else {
                found |= Violations::UNREADABLE;
                break;
            };
            let Ok(end) = header.end(at) else {
                found |= Violations::OUT_OF_BOUNDS;
                break;
            };

            if header.size == 0 || header.size % ALIGNMENT != 0 {
                found |= Violations::BAD_SIZE;
            }
            if end > self.region.heap_end() {
                found |= Violations::OUT_OF_BOUNDS;
                break;
            }
            if end == self.region.heap_end() {
                found |= Violations::UNRECLAIMED_TAIL;
            }
            if let Some((_, prev_end)) = last {
                if prev_end == at {
                    found |= Violations::ADJACENT;
                } else if prev_end > at {
                    found |= Violations::OUT_OF_BOUNDS;
                }
            }

            last = Some((at, end));
            cursor = header.next;
        }

        if !found.is_empty() {
            log::warn!("heap integrity check failed: {:?}", found);
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::block::{BlockHeader, HEADER_SIZE};
    use crate::mm::test_support::{stack_above, BASE};

    #[test]
    fn test_healthy_heap() {
        let mut ram = [0u8; 256];
        let mut heap = Heap::initialize(&mut ram, BASE, stack_above(256)).unwrap();
        let a = heap.allocate(16).unwrap();
        heap.allocate(16).unwrap();
        heap.release(a);
        assert_eq!(heap.check_integrity(), Violations::empty());
    }

    #[test]
    fn test_detects_unmerged_neighbours() {
        let mut ram = [0u8; 256];
        let mut heap = Heap::initialize(&mut ram, BASE, stack_above(256)).unwrap();
        let a = heap.allocate(8).unwrap();
        let b = heap.allocate(8).unwrap();
        heap.allocate(8).unwrap();

        // Hand-link a and b without merging them.
        let a_at = a.checked_sub(HEADER_SIZE).unwrap();
        let b_at = b.checked_sub(HEADER_SIZE).unwrap();
        heap.region.write_header(a_at, BlockHeader::new(8, Some(b_at))).unwrap();
        heap.region.write_header(b_at, BlockHeader::new(8, None)).unwrap();
        heap.free_head = Some(a_at);

        assert_eq!(heap.check_integrity(), Violations::ADJACENT);
    }

    #[test]
    fn test_detects_cycle() {
        let mut ram = [0u8; 256];
        let mut heap = Heap::initialize(&mut ram, BASE, stack_above(256)).unwrap();
        let a = heap.allocate(8).unwrap();
        heap.allocate(8).unwrap();

        let a_at = a.checked_sub(HEADER_SIZE).unwrap();
        heap.region.write_header(a_at, BlockHeader::new(8, Some(a_at))).unwrap();
        heap.free_head = Some(a_at);

        assert!(heap.check_integrity().contains(Violations::UNORDERED));
    }

    #[test]
    fn test_detects_unreclaimed_tail() {
        let mut ram = [0u8; 256];
        let mut heap = Heap::initialize(&mut ram, BASE, stack_above(256)).unwrap();
        let a = heap.allocate(8).unwrap();

        let a_at = a.checked_sub(HEADER_SIZE).unwrap();
        heap.free_head = Some(a_at);
        assert_eq!(heap.check_integrity(), Violations::UNRECLAIMED_TAIL);
    }
}
