//! Deallocation Engine
//!
//! Returns blocks to the address-ordered free list, merging them with
//! address-adjacent free neighbours on both sides. A merged block that
//! reaches `heap_end` is handed back to the region instead of being kept
//! on the list.
//!
//! The list is singly linked, so the predecessor of a block is found by
//! scanning from the head. The scan remembers two nodes back, which is
//! what tail reclamation needs to unlink a block that was merged into its
//! predecessor.
//!
//! Holes below the top of the heap stay claimed until a later release
//! makes them touch `heap_end`.

use super::address::HeapAddr;
use super::block::{BlockHeader, HEADER_SIZE};
use super::heap::Heap;
use super::validate::claimed_block;
use crate::error::HeapError;
use crate::platform::StackProbe;

impl<P: StackProbe> Heap<'_, P> {
    /// Return a block to the heap.
    ///
    /// Null is ignored. Pointers that fail validation are ignored as well
    /// (and logged); this guards against gross misuse only.
    pub fn release(&mut self, payload: HeapAddr) {
        if payload.is_null() {
            return;
        }
        if let Err(err) = self.try_release(payload) {
            log::warn!("release rejected ptr={} reason={}", payload, err);
        }
    }

    /// Return a block to the heap, reporting rejected pointers.
    ///
    /// # Errors
    /// `InvalidPointer` if `payload` is null, outside the claimed region,
    /// misaligned, or already on the free list.
    pub fn try_release(&mut self, payload: HeapAddr) -> Result<(), HeapError> {
        let block = claimed_block(&self.region, payload)?;

        // Find the insertion point: `prev` is the last free block below
        // `block`, `before_prev` the one before that.
        let mut before_prev: Option<HeapAddr> = None;
        let mut prev: Option<(HeapAddr, BlockHeader)> = None;
        let mut cursor = self.free_head;

        while let Some(at) = cursor {
            if at > block.at {
                break;
            }
            let header = self.region.read_header(at)?;
            if at == block.at || header.end(at)? > block.at {
                return Err(HeapError::InvalidPointer);
            }
            before_prev = prev.map(|(addr, _)| addr);
            prev = Some((at, header));
            cursor = header.next;
        }
        let next = cursor;

        if next.is_some_and(|next| block.end > next) {
            return Err(HeapError::InvalidPointer);
        }

        // Merge with the preceding free block, or take its place in the list.
        let (merged_at, mut merged_size, pred) = match prev {
            Some((p_at, p_header)) if p_header.end(p_at)? == block.at => (
                p_at,
                p_header.size + HEADER_SIZE + block.header.size,
                before_prev,
            ),
            _ => (block.at, block.header.size, prev.map(|(addr, _)| addr)),
        };

        // Merge with the following free block.
        let mut merged_next = next;
        if let Some(n_at) = next {
            if n_at == block.end {
                let n_header = self.region.read_header(n_at)?;
                merged_size += HEADER_SIZE + n_header.size;
                merged_next = n_header.next;
            }
        }

        let merged = BlockHeader::new(merged_size, merged_next);
        if merged.end(merged_at)? == self.region.heap_end() {
            debug_assert!(merged_next.is_none());
            self.link_after(pred, None)?;
            let delta = isize::try_from(merged.span()).map_err(|_| HeapError::CorruptHeader)?;
            self.region.adjust_bound(-delta)?;
            log::trace!("release {} -> reclaimed {} bytes", payload, merged.span());
            return Ok(());
        }

        self.region.write_header(merged_at, merged)?;
        if merged_at == block.at {
            self.link_after(pred, Some(block.at))?;
        }
        log::trace!("release {} -> free block {} ({} bytes)", payload, merged_at, merged_size);
        Ok(())
    }
}
