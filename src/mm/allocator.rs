//! Global Heap Front-End
//!
//! Wraps one [`Heap`] in a spinlock so it can serve as the program's
//! `#[global_allocator]`, and offers the C-style entry points firmware
//! code expects: `init`, `update_heap_size`, `malloc` and `free`.
//!
//! # Memory Layout
//! The arena normally spans from the linker's end-of-data symbol up to
//! the initial stack pointer:
//! - `end`: first byte after `.bss`, becomes `heap_start`
//! - `sp`: read through the [`StackProbe`] on every (re)computation
//!
//! # Usage
//! ```ignore
//! use stackheap::mm::LockedHeap;
//! use stackheap::platform::CurrentStack;
//!
//! #[global_allocator]
//! static ALLOCATOR: LockedHeap<CurrentStack> = LockedHeap::empty();
//!
//! extern "C" {
//!     static mut end: u8;
//! }
//!
//! fn boot(ram_top: usize) {
//!     // SAFETY: [end, ram_top) is unused RAM shared only with the stack.
//!     unsafe {
//!         let start = core::ptr::addr_of_mut!(end);
//!         ALLOCATOR
//!             .init(start, ram_top - start as usize, CurrentStack)
//!             .unwrap();
//!     }
//! }
//! ```
//!
//! The lock only serialises callers that go through this type. Taking it
//! from an interrupt handler while the interrupted code holds it
//! deadlocks; keep allocation out of interrupt context.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr;

use spin::{Mutex, MutexGuard};

use super::address::{HeapAddr, ALIGNMENT};
use super::heap::Heap;
use crate::error::HeapError;
use crate::platform::StackProbe;

/// A [`Heap`] behind a spinlock, usable as a `static`.
pub struct LockedHeap<P> {
    inner: Mutex<Option<Heap<'static, P>>>,
}

impl<P: StackProbe> LockedHeap<P> {
    /// Create an uninitialized heap. Every allocation fails until
    /// [`init`](Self::init) succeeds.
    pub const fn empty() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Take over `len` bytes starting at `start` as heap memory.
    ///
    /// Replaces any previous heap; outstanding pointers into it become
    /// invalid.
    ///
    /// # Safety
    /// - `start..start + len` must be valid, writable and unused by
    ///   anything except the stack growing down into it
    /// - the memory must stay valid for the rest of the program
    pub unsafe fn init(&self, start: *mut u8, len: usize, probe: P) -> Result<(), HeapError> {
        // SAFETY: Caller guarantees the range is valid, exclusive and 'static.
        let arena = unsafe { core::slice::from_raw_parts_mut(start, len) };
        self.init_with(arena, probe)
    }

    /// Take over a `'static` buffer as heap memory.
    pub fn init_with(&self, arena: &'static mut [u8], probe: P) -> Result<(), HeapError> {
        let base = arena.as_ptr() as usize;
        let heap = Heap::initialize(arena, base, probe)?;
        *self.inner.lock() = Some(heap);
        Ok(())
    }

    /// Lock the heap for direct access.
    pub fn lock(&self) -> MutexGuard<'_, Option<Heap<'static, P>>> {
        self.inner.lock()
    }

    /// Recompute the ceiling after the stack layout changed.
    ///
    /// Returns `0` on success or the (negative) [`HeapError::code`].
    pub fn update_heap_size(&self) -> i32 {
        let result = match self.inner.lock().as_mut() {
            Some(heap) => heap.recompute_ceiling(),
            None => Err(HeapError::BoundsViolation),
        };
        match result {
            Ok(()) => 0,
            Err(err) => err.code(),
        }
    }

    /// Allocate `size` bytes; null on failure or before `init`.
    pub fn malloc(&self, size: usize) -> *mut u8 {
        let mut guard = self.inner.lock();
        let Some(heap) = guard.as_mut() else {
            return ptr::null_mut();
        };

        heap.allocate(size)
            .ok()
            .and_then(|payload| heap.payload_ptr(payload))
            .unwrap_or(ptr::null_mut())
    }

    /// Free a pointer from [`malloc`](Self::malloc). Null and foreign
    /// pointers are ignored.
    pub fn free(&self, ptr: *mut u8) {
        if let Some(heap) = self.inner.lock().as_mut() {
            heap.release(HeapAddr::new(ptr as usize));
        }
    }
}

unsafe impl<P: StackProbe + Send> GlobalAlloc for LockedHeap<P> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALIGNMENT {
            log::warn!("unsupported alignment {} for {} bytes", layout.align(), layout.size());
            return ptr::null_mut();
        }
        self.malloc(layout.size())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.free(ptr);
    }
}
