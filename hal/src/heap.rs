//! Kernel heap: the global allocator `alloc::{Vec, Box, BTreeMap, ...}`
//! resolve against throughout the kernel crate. Distinct from
//! [`crate::allocator::buddy`] (whole physical pages) and
//! [`crate::allocator::slab`] (fixed-size object caches carved from
//! buddy pages): this is the general-purpose heap a `no_std` kernel
//! needs before either of those is useful for everyday `alloc` use.
//!
//! Backed by `linked_list_allocator`, matching the pinned workspace
//! dependency of the same name.

use linked_list_allocator::LockedHeap;

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Initializes the heap over `[start, start + size)`.
///
/// # Safety
/// `start` must point at `size` bytes of unused, mapped, writable
/// memory, and this must be called at most once, before any `alloc`
/// allocation is attempted.
pub unsafe fn init(start: usize, size: usize) {
    unsafe {
        ALLOCATOR.lock().init(start as *mut u8, size);
    }
}
