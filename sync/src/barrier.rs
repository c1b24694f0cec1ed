//! Generation-counted spin barrier for a fixed number of participants.

use core::sync::atomic::{AtomicUsize, Ordering};

pub struct Barrier {
    total: usize,
    arrived: AtomicUsize,
    generation: AtomicUsize,
}

impl Barrier {
    pub const fn new(total: usize) -> Self {
        Self {
            total,
            arrived: AtomicUsize::new(0),
            generation: AtomicUsize::new(0),
        }
    }

    /// Block until `total` participants have called `wait` for the
    /// current generation, then release everyone at once.
    pub fn wait(&self) {
        let gen = self.generation.load(Ordering::Acquire);
        if self.arrived.fetch_add(1, Ordering::AcqRel) + 1 == self.total {
            self.arrived.store(0, Ordering::Release);
            self.generation.fetch_add(1, Ordering::Release);
        } else {
            while self.generation.load(Ordering::Acquire) == gen {
                core::hint::spin_loop();
            }
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use alloc::sync::Arc;

    #[test]
    fn single_participant_returns_immediately() {
        let barrier = Barrier::new(1);
        barrier.wait();
        barrier.wait();
    }

    #[test]
    fn releases_all_participants_together() {
        extern crate std;
        use std::thread;

        let barrier = Arc::new(Barrier::new(4));
        let mut handles = alloc::vec::Vec::new();
        for _ in 0..4 {
            let b = barrier.clone();
            handles.push(thread::spawn(move || b.wait()));
        }
        for h in handles {
            h.join().unwrap();
        }
    }
}
