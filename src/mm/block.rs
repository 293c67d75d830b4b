//! Block Header Layout
//!
//! Every block, free or allocated, starts with an 8-byte header:
//!
//! ```text
//! offset 0: u32 LE  payload size in bytes (header excluded)
//! offset 4: u32 LE  next free block, as offset from heap_start
//!                   (u32::MAX = end of list)
//! offset 8: payload ...
//! ```
//!
//! The link is only meaningful while the block sits on the free list.
//! Storing offsets instead of raw pointers keeps the layout identical on
//! 32- and 64-bit targets and lets every access be bounds-checked.

use super::address::{HeapAddr, ALIGNMENT};
use crate::error::HeapError;

/// Size of one block header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Largest payload a header can describe.
pub const MAX_PAYLOAD: usize = (u32::MAX as usize) - HEADER_SIZE;

/// Link value marking the end of the free list.
const NIL: u32 = u32::MAX;

const _: () = assert!(HEADER_SIZE % ALIGNMENT == 0);

/// Decoded block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Payload size in bytes, a multiple of `ALIGNMENT`.
    pub size: usize,
    /// Next free block in address order.
    pub next: Option<HeapAddr>,
}

impl BlockHeader {
    /// Create a header.
    #[inline]
    pub const fn new(size: usize, next: Option<HeapAddr>) -> Self {
        Self { size, next }
    }

    /// First address after the block that starts at `at`.
    #[inline]
    pub fn end(&self, at: HeapAddr) -> Result<HeapAddr, HeapError> {
        at.checked_add(HEADER_SIZE)
            .and_then(|payload| payload.checked_add(self.size))
            .ok_or(HeapError::CorruptHeader)
    }

    /// Header plus payload, in bytes.
    #[inline]
    pub fn span(&self) -> usize {
        HEADER_SIZE + self.size
    }

    /// Encode for storage in a heap whose first block may start at `heap_start`.
    pub(crate) fn encode(&self, heap_start: HeapAddr) -> Result<[u8; HEADER_SIZE], HeapError> {
        let size = u32::try_from(self.size).map_err(|_| HeapError::CorruptHeader)?;
        let link = match self.next {
            None => NIL,
            Some(next) => next
                .offset_from(heap_start)
                .and_then(|off| u32::try_from(off).ok())
                .filter(|&off| off != NIL)
                .ok_or(HeapError::CorruptHeader)?,
        };

        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..4].copy_from_slice(&size.to_le_bytes());
        bytes[4..].copy_from_slice(&link.to_le_bytes());
        Ok(bytes)
    }

    /// Decode a stored header.
    pub(crate) fn decode(bytes: [u8; HEADER_SIZE], heap_start: HeapAddr) -> Result<Self, HeapError> {
        let size = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let link = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

        let next = if link == NIL {
            None
        } else {
            Some(
                heap_start
                    .checked_add(link as usize)
                    .ok_or(HeapError::CorruptHeader)?,
            )
        };

        Ok(Self::new(size as usize, next))
    }
}

/// Payload address of the block whose header is at `at`.
#[inline]
pub fn payload_of(at: HeapAddr) -> Result<HeapAddr, HeapError> {
    at.checked_add(HEADER_SIZE).ok_or(HeapError::CorruptHeader)
}

/// Header address of the block whose payload is at `payload`.
#[inline]
pub fn header_of(payload: HeapAddr) -> Option<HeapAddr> {
    payload.checked_sub(HEADER_SIZE)
}
