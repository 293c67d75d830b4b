//! Release Pointer Validation
//!
//! Best-effort screening of pointers handed to `release`. It rejects null,
//! misaligned and out-of-region values and headers whose span runs past
//! the top of the heap. It cannot tell a live block from a stale pointer
//! into one; the free-list scan in `coalesce` catches the common double
//! free on top of this.

use super::address::{HeapAddr, ALIGNMENT};
use super::block::{header_of, BlockHeader, HEADER_SIZE};
use super::region::Region;
use crate::error::HeapError;

/// A block that passed validation and may be returned to the free list.
#[derive(Debug, Clone, Copy)]
pub(super) struct ClaimedBlock {
    /// Header address.
    pub at: HeapAddr,
    /// Header as stored.
    pub header: BlockHeader,
    /// First address after the block.
    pub end: HeapAddr,
}

/// Validate `payload` as a block currently claimed from `region`.
///
/// # Security Checks
/// 1. Pointer is not null and is aligned
/// 2. Header lies inside `[heap_start, heap_end)`
/// 3. Recorded size is a non-zero multiple of the alignment
/// 4. Block end does not pass `heap_end`
pub(super) fn claimed_block(region: &Region<'_>, payload: HeapAddr) -> Result<ClaimedBlock, HeapError> {
    if payload.is_null() || !payload.is_aligned() {
        return Err(HeapError::InvalidPointer);
    }

    let at = header_of(payload).ok_or(HeapError::InvalidPointer)?;
    if !region.contains(at, HEADER_SIZE) {
        return Err(HeapError::InvalidPointer);
    }

    let header = region.read_header(at).map_err(|_| HeapError::InvalidPointer)?;
    if header.size == 0 || header.size % ALIGNMENT != 0 {
        return Err(HeapError::InvalidPointer);
    }

    let end = header.end(at).map_err(|_| HeapError::InvalidPointer)?;
    if end > region.heap_end() {
        return Err(HeapError::InvalidPointer);
    }

    Ok(ClaimedBlock { at, header, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: HeapAddr = HeapAddr::new(0x4000_0000);

    fn region_with_block(ram: &mut [u8], size: usize) -> Region<'_> {
        let mut region = Region::new(ram, BASE).unwrap();
        region.set_stack_limit(HeapAddr::new(0x4000_0100));
        region.adjust_bound((HEADER_SIZE + size) as isize).unwrap();
        region.write_header(BASE, BlockHeader::new(size, None)).unwrap();
        region
    }

    #[test]
    fn test_valid_block() {
        let mut ram = [0u8; 256];
        let region = region_with_block(&mut ram, 16);
        let block = claimed_block(&region, HeapAddr::new(0x4000_0008)).unwrap();
        assert_eq!(block.at, BASE);
        assert_eq!(block.header.size, 16);
        assert_eq!(block.end, HeapAddr::new(0x4000_0018));
    }

    #[test]
    fn test_null_and_misaligned() {
        let mut ram = [0u8; 256];
        let region = region_with_block(&mut ram, 16);
        assert!(claimed_block(&region, HeapAddr::NULL).is_err());
        assert!(claimed_block(&region, HeapAddr::new(0x4000_0009)).is_err());
    }

    #[test]
    fn test_outside_region() {
        let mut ram = [0u8; 256];
        let region = region_with_block(&mut ram, 16);
        // Below heap_start (stack or static data).
        assert!(claimed_block(&region, HeapAddr::new(0x3FFF_FF00)).is_err());
        // Claimed region ends at 0x4000_0018.
        assert!(claimed_block(&region, HeapAddr::new(0x4000_0020)).is_err());
    }

    #[test]
    fn test_size_past_heap_end() {
        let mut ram = [0u8; 256];
        let mut region = region_with_block(&mut ram, 16);
        region.write_header(BASE, BlockHeader::new(64, None)).unwrap();
        assert_eq!(
            claimed_block(&region, HeapAddr::new(0x4000_0008)).map(|b| b.at),
            Err(HeapError::InvalidPointer)
        );
    }
}
