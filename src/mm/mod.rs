//! Heap memory management
//!
//! Provides:
//! - Region bookkeeping with a stack-derived ceiling
//! - First-fit allocation from an address-ordered free list
//! - Coalescing release with reclamation of the heap tail
//! - A spinlocked global allocator front-end
//!
//! # Block Layout
//! Every block is an 8-byte header followed by its payload. Payload
//! addresses handed to callers are always 8-byte aligned.
//!
//! # Safety Principles
//! - Headers are read and written at bounds-checked arena offsets
//! - Pointers given back to `release` are validated before use
//! - Raw pointers stay inside `Region` and the global allocator boundary

mod address;
mod allocator;
mod block;
mod check;
mod coalesce;
mod first_fit;
mod heap;
mod region;
mod validate;

pub use address::{align_up, HeapAddr, ALIGNMENT, STACK_MARGIN};
pub use allocator::LockedHeap;
pub use block::{BlockHeader, HEADER_SIZE, MAX_PAYLOAD};
pub use check::Violations;
pub use heap::{FreeBlock, FreeBlocks, Heap, HeapStats};
pub use region::Region;

#[cfg(test)]
pub(crate) mod test_support {
    use super::STACK_MARGIN;

    /// Arena base address used by tests.
    pub const BASE: usize = 0x4000_0000;

    /// Probe placing the ceiling exactly at `BASE + len`.
    pub fn stack_above(len: usize) -> impl Fn() -> usize + Copy {
        move || BASE + len + STACK_MARGIN
    }
}
