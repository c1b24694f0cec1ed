//! Opaque-token wait queue.
//!
//! `kernel-sync` does not know about `Thread`, so waiters are identified
//! by a `usize` token the caller chooses (in practice a thread ID or a
//! raw `Arc<Thread>` pointer cast to `usize`). The scheduler in the
//! `kernel` crate is responsible for mapping a dequeued token back to a
//! runnable thread and re-enqueuing it.

use crate::spinlock::Spinlock;
use alloc::collections::VecDeque;

pub struct WaitQueue {
    waiters: Spinlock<VecDeque<usize>>,
}

impl WaitQueue {
    pub const fn new() -> Self {
        Self {
            waiters: Spinlock::new(VecDeque::new()),
        }
    }

    /// Park `token` on this queue (FIFO).
    pub fn enqueue(&self, token: usize) {
        self.waiters.lock().push_back(token);
    }

    /// Wake the longest-waiting token, if any.
    pub fn dequeue(&self) -> Option<usize> {
        self.waiters.lock().pop_front()
    }

    /// Wake every waiter, draining the queue.
    pub fn dequeue_all(&self) -> alloc::vec::Vec<usize> {
        self.waiters.lock().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.waiters.lock().len()
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn fifo_wakeup_order() {
        let q = WaitQueue::new();
        assert!(q.is_empty());
        q.enqueue(1);
        q.enqueue(2);
        q.enqueue(3);
        assert_eq!(q.dequeue(), Some(1));
        assert_eq!(q.dequeue(), Some(2));
        assert_eq!(q.len(), 1);
        assert_eq!(q.dequeue(), Some(3));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn dequeue_all_drains_in_order() {
        let q = WaitQueue::new();
        q.enqueue(10);
        q.enqueue(20);
        assert_eq!(q.dequeue_all(), alloc::vec![10, 20]);
        assert!(q.is_empty());
    }
}
