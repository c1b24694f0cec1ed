//! Counting semaphore with a FIFO wait queue for blocked waiters.

use crate::wait_queue::WaitQueue;
use core::sync::atomic::{AtomicIsize, Ordering};

pub struct Semaphore {
    count: AtomicIsize,
    waiters: WaitQueue,
}

impl Semaphore {
    pub const fn new(initial: isize) -> Self {
        Self {
            count: AtomicIsize::new(initial),
            waiters: WaitQueue::new(),
        }
    }

    /// Take a permit without blocking. Returns `false` if none are free.
    pub fn try_acquire(&self) -> bool {
        let mut current = self.count.load(Ordering::Acquire);
        while current > 0 {
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
        false
    }

    /// Attempt to acquire; on failure, park `token` on the wait queue and
    /// return `false`. The caller (scheduler) is responsible for blocking
    /// the corresponding thread and later retrying after a wakeup.
    pub fn acquire_or_park(&self, token: usize) -> bool {
        if self.try_acquire() {
            return true;
        }
        self.waiters.enqueue(token);
        false
    }

    /// Return a permit, waking one parked waiter if present.
    pub fn release(&self) -> Option<usize> {
        self.count.fetch_add(1, Ordering::AcqRel);
        self.waiters.dequeue()
    }

    pub fn available(&self) -> isize {
        self.count.load(Ordering::Acquire)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn try_acquire_respects_count() {
        let sem = Semaphore::new(1);
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
        assert_eq!(sem.release(), None);
        assert!(sem.try_acquire());
    }

    #[test]
    fn blocked_waiters_wake_in_fifo_order() {
        let sem = Semaphore::new(0);
        assert!(!sem.acquire_or_park(1));
        assert!(!sem.acquire_or_park(2));
        assert_eq!(sem.release(), Some(1));
        assert_eq!(sem.release(), Some(2));
    }
}
