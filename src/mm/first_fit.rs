//! Allocation Engine
//!
//! First-fit over the address-ordered free list, falling back to claiming
//! fresh memory at the top of the region.
//!
//! First-fit keeps the decision cheap; it does not look for the tightest
//! block, so fragmentation is higher than with best-fit.

use super::address::{align_up, HeapAddr, ALIGNMENT};
use super::block::{payload_of, BlockHeader, HEADER_SIZE, MAX_PAYLOAD};
use super::heap::Heap;
use crate::error::HeapError;
use crate::platform::StackProbe;

impl<P: StackProbe> Heap<'_, P> {
    /// Allocate at least `size` bytes and return the payload address.
    ///
    /// The payload is aligned to [`ALIGNMENT`] and its capacity is `size`
    /// rounded up to a multiple of it.
    ///
    /// # Errors
    /// - `InvalidArgument` for `size == 0`
    /// - `OutOfMemory` if no free block fits and the region cannot grow
    pub fn allocate(&mut self, size: usize) -> Result<HeapAddr, HeapError> {
        if size == 0 {
            return Err(HeapError::InvalidArgument);
        }
        let rounded = align_up(size)
            .filter(|&rounded| rounded <= MAX_PAYLOAD)
            .ok_or(HeapError::OutOfMemory)?;

        let at = match self.take_first_fit(rounded)? {
            Some(at) => at,
            None => self.claim_fresh(rounded)?,
        };

        let payload = payload_of(at)?;
        log::trace!("allocate {} -> {} ({} bytes)", size, payload, rounded);
        Ok(payload)
    }

    /// Take the first free block that holds `rounded` bytes.
    ///
    /// Oversized blocks are split: the front stays on the list with a
    /// smaller size, the tail becomes the allocation. A leftover too small
    /// to hold a header plus one alignment unit is handed out as well.
    fn take_first_fit(&mut self, rounded: usize) -> Result<Option<HeapAddr>, HeapError> {
        let mut prev = None;
        let mut cursor = self.free_head;

        while let Some(at) = cursor {
            let header = self.region.read_header(at)?;

            if header.size >= rounded {
                if header.size - rounded < HEADER_SIZE + ALIGNMENT {
                    self.link_after(prev, header.next)?;
                    self.region.write_header(at, BlockHeader::new(header.size, None))?;
                    return Ok(Some(at));
                }

                let remainder = header.size - rounded - HEADER_SIZE;
                self.region
                    .write_header(at, BlockHeader::new(remainder, header.next))?;

                let tail = at
                    .checked_add(HEADER_SIZE + remainder)
                    .ok_or(HeapError::CorruptHeader)?;
                self.region.write_header(tail, BlockHeader::new(rounded, None))?;
                return Ok(Some(tail));
            }

            prev = Some(at);
            cursor = header.next;
        }

        Ok(None)
    }

    /// Claim `HEADER_SIZE + rounded` new bytes at the top of the region.
    fn claim_fresh(&mut self, rounded: usize) -> Result<HeapAddr, HeapError> {
        let delta = isize::try_from(HEADER_SIZE + rounded).map_err(|_| HeapError::OutOfMemory)?;
        let at = self.region.adjust_bound(delta).map_err(|err| {
            log::debug!("heap exhausted: {} bytes requested, {} left", delta, self.region.headroom());
            err
        })?;

        self.region.write_header(at, BlockHeader::new(rounded, None))?;
        Ok(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::test_support::{stack_above, BASE};

    #[test]
    fn test_zero_size_rejected() {
        let mut ram = [0u8; 128];
        let mut heap = Heap::initialize(&mut ram, BASE, stack_above(128)).unwrap();
        assert_eq!(heap.allocate(0), Err(HeapError::InvalidArgument));
        assert_eq!(heap.heap_end(), heap.heap_start());
    }

    #[test]
    fn test_growth_rounds_to_alignment() {
        let mut ram = [0u8; 256];
        let mut heap = Heap::initialize(&mut ram, BASE, stack_above(256)).unwrap();

        let p = heap.allocate(10).unwrap();
        assert_eq!(p, HeapAddr::new(BASE + HEADER_SIZE));
        assert_eq!(heap.heap_end(), HeapAddr::new(BASE + HEADER_SIZE + 16));

        let q = heap.allocate(1).unwrap();
        assert_eq!(q, HeapAddr::new(BASE + 2 * HEADER_SIZE + 16));
        assert!(q.is_aligned());
        assert_eq!(heap.usable_size(q), Some(ALIGNMENT));
    }

    #[test]
    fn test_out_of_memory_at_ceiling() {
        let mut ram = [0u8; 64];
        let mut heap = Heap::initialize(&mut ram, BASE, stack_above(64)).unwrap();

        heap.allocate(40).unwrap();
        let end = heap.heap_end();
        assert_eq!(heap.allocate(16), Err(HeapError::OutOfMemory));
        assert_eq!(heap.heap_end(), end);
        assert!(heap.allocate(8).is_ok());
        assert_eq!(heap.headroom(), 0);
    }

    #[test]
    fn test_huge_request() {
        let mut ram = [0u8; 64];
        let mut heap = Heap::initialize(&mut ram, BASE, stack_above(64)).unwrap();
        assert_eq!(heap.allocate(usize::MAX), Err(HeapError::OutOfMemory));
        assert_eq!(heap.allocate(MAX_PAYLOAD + 1), Err(HeapError::OutOfMemory));
    }

    #[test]
    fn test_split_carves_from_tail() {
        let mut ram = [0u8; 512];
        let mut heap = Heap::initialize(&mut ram, BASE, stack_above(512)).unwrap();
        let big = heap.allocate(64).unwrap();
        heap.allocate(8).unwrap();
        heap.release(big);

        let end = heap.heap_end();
        let small = heap.allocate(16).unwrap();

        // 64 = 40 (remainder) + 8 (header) + 16 (tail allocation)
        assert_eq!(heap.heap_end(), end);
        assert_eq!(small, HeapAddr::new(big.as_usize() + 40 + HEADER_SIZE));
        let free: Vec<_> = heap.free_blocks().collect();
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].addr, HeapAddr::new(BASE));
        assert_eq!(free[0].size, 40);
    }

    #[test]
    fn test_small_remainder_taken_whole() {
        let mut ram = [0u8; 512];
        let mut heap = Heap::initialize(&mut ram, BASE, stack_above(512)).unwrap();
        let a = heap.allocate(24).unwrap();
        heap.allocate(8).unwrap();
        heap.release(a);

        // 24 - 16 = 8 < header + alignment, so no split.
        let b = heap.allocate(16).unwrap();
        assert_eq!(b, a);
        assert_eq!(heap.usable_size(b), Some(24));
        assert_eq!(heap.free_blocks().count(), 0);
    }

    #[test]
    fn test_first_fit_not_best_fit() {
        let mut ram = [0u8; 512];
        let mut heap = Heap::initialize(&mut ram, BASE, stack_above(512)).unwrap();
        let large = heap.allocate(64).unwrap();
        heap.allocate(8).unwrap();
        let exact = heap.allocate(16).unwrap();
        heap.allocate(8).unwrap();
        heap.release(large);
        heap.release(exact);

        // The 16-byte hole would fit exactly, but the 64-byte block comes first.
        let p = heap.allocate(16).unwrap();
        assert!(p > large && p < exact);
        assert_eq!(heap.free_blocks().count(), 2);
    }

    #[test]
    fn test_unlink_middle_of_list() {
        let mut ram = [0u8; 512];
        let mut heap = Heap::initialize(&mut ram, BASE, stack_above(512)).unwrap();
        let a = heap.allocate(8).unwrap();
        heap.allocate(8).unwrap();
        let b = heap.allocate(16).unwrap();
        heap.allocate(8).unwrap();
        let c = heap.allocate(8).unwrap();
        heap.allocate(8).unwrap();
        heap.release(a);
        heap.release(b);
        heap.release(c);

        assert_eq!(heap.allocate(16).unwrap(), b);
        let free: Vec<_> = heap.free_blocks().map(|block| block.addr).collect();
        assert_eq!(free, [a.checked_sub(HEADER_SIZE).unwrap(), c.checked_sub(HEADER_SIZE).unwrap()]);
    }
}
