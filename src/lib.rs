//! StackHeap - First-Fit Heap for Single-Address-Space Targets
//!
//! Dynamic memory for small embedded systems that have no MMU, no
//! separate heap/stack protection and no allocator of their own.
//!
//! # Memory Layout
//! ```text
//! heap_start                heap_end         stack_limit   sp
//! |  static data end  ...   |   unclaimed    |  margin    |  stack  ...
//! +--------------------------+----------------+------------+----------
//!  hdr|payload hdr|payload ...   (grows up ->)   (<- grows down)
//! ```
//! The heap grows upwards from the end of static data, the stack grows
//! downwards towards it. `heap_end` is never allowed to pass the stack
//! pointer minus [`mm::STACK_MARGIN`].
//!
//! # Architecture
//! - [`mm::Heap`]: explicit allocator context (first-fit, coalescing,
//!   tail reclamation)
//! - [`mm::LockedHeap`]: spinlock-guarded global front-end with
//!   `#[global_allocator]` support
//! - [`platform::StackProbe`]: injected source of the current stack extent
//!
//! # Example
//! ```
//! use stackheap::mm::Heap;
//!
//! let mut ram = [0u8; 512];
//! // Pretend the stack pointer sits right above our arena.
//! let probe = || 0x2000_0000 + 512 + 16;
//! let mut heap = Heap::initialize(&mut ram, 0x2000_0000, probe).unwrap();
//!
//! let block = heap.allocate(10).unwrap();
//! heap.payload_mut(block, 10).unwrap().copy_from_slice(b"0123456789");
//! heap.release(block);
//! assert_eq!(heap.heap_end(), heap.heap_start());
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod error;
pub mod mm;
pub mod platform;

pub use error::HeapError;
pub use mm::{Heap, HeapAddr, LockedHeap};
pub use platform::StackProbe;
