//! Ticket mutex with an optional priority-inheritance owner.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU64, Ordering};

use crate::spinlock::Spinlock;

/// A fair mutex: waiters are served in the order they drew a ticket,
/// unlike a plain spinlock where the next acquirer is unspecified.
pub struct TicketMutex<T: ?Sized> {
    next_ticket: AtomicU64,
    now_serving: AtomicU64,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for TicketMutex<T> {}
unsafe impl<T: ?Sized + Send> Sync for TicketMutex<T> {}

impl<T> TicketMutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            next_ticket: AtomicU64::new(0),
            now_serving: AtomicU64::new(0),
            data: UnsafeCell::new(value),
        }
    }
}

impl<T: ?Sized> TicketMutex<T> {
    pub fn lock(&self) -> TicketMutexGuard<'_, T> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        while self.now_serving.load(Ordering::Acquire) != ticket {
            core::hint::spin_loop();
        }
        TicketMutexGuard { lock: self }
    }
}

pub struct TicketMutexGuard<'a, T: ?Sized> {
    lock: &'a TicketMutex<T>,
}

impl<T: ?Sized> Deref for TicketMutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: holding the guard proves our ticket is the one being served.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for TicketMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: holding the guard proves our ticket is the one being served.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for TicketMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.now_serving.fetch_add(1, Ordering::Release);
    }
}

/// Hook the task layer implements so a [`PriorityMutex`] can boost and
/// restore the actual holder's priority (spec.md §4.1) instead of only
/// tracking an abstract ceiling. Generic the same way
/// [`crate::spinlock::IrqSpinlock`] is generic over
/// [`crate::spinlock::IrqDisable`], so this crate stays free of a
/// dependency on `kernel`'s thread/scheduler types.
pub trait PriorityOwner: Clone {
    /// This owner's current effective priority.
    fn priority(&self) -> u8;
    /// Raise this owner's effective priority to at least `to`, for as
    /// long as it holds the mutex a higher-priority thread is waiting on.
    fn boost_priority(&self, to: u8);
    /// Undo any boost applied by [`PriorityOwner::boost_priority`],
    /// restoring this owner's own base priority.
    fn restore_priority(&self);
}

/// A ticket mutex that records its current holder and boosts that
/// holder's effective priority to match whoever is waiting on it,
/// restoring the holder's own priority on release — priority inheritance
/// (spec.md §4.1), bounding how long a low-priority holder can block a
/// higher-priority waiter.
pub struct PriorityMutex<T: ?Sized, O: PriorityOwner> {
    owner: Spinlock<Option<O>>,
    inner: TicketMutex<T>,
}

impl<T, O: PriorityOwner> PriorityMutex<T, O> {
    pub const fn new(value: T) -> Self {
        Self {
            owner: Spinlock::new(None),
            inner: TicketMutex::new(value),
        }
    }
}

impl<T: ?Sized, O: PriorityOwner> PriorityMutex<T, O> {
    /// Acquires the lock as `waiter`. If another owner currently holds
    /// it, immediately boosts that holder to at least `waiter`'s
    /// priority before spinning on the ticket mutex, then records
    /// `waiter` as the new owner once acquired (spec.md §4.1: "find
    /// current owner, boost its effective priority to max(owner,
    /// waiter)").
    pub fn lock(&self, waiter: O) -> PriorityMutexGuard<'_, T, O> {
        if let Some(holder) = self.owner.lock().as_ref() {
            holder.boost_priority(waiter.priority());
        }
        let guard = self.inner.lock();
        *self.owner.lock() = Some(waiter);
        PriorityMutexGuard { guard, lock: self }
    }

    /// The current holder's priority, or `None` while unheld.
    pub fn current_priority(&self) -> Option<u8> {
        self.owner.lock().as_ref().map(PriorityOwner::priority)
    }
}

pub struct PriorityMutexGuard<'a, T: ?Sized, O: PriorityOwner> {
    guard: TicketMutexGuard<'a, T>,
    lock: &'a PriorityMutex<T, O>,
}

impl<T: ?Sized, O: PriorityOwner> Deref for PriorityMutexGuard<'_, T, O> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T: ?Sized, O: PriorityOwner> DerefMut for PriorityMutexGuard<'_, T, O> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T: ?Sized, O: PriorityOwner> Drop for PriorityMutexGuard<'_, T, O> {
    /// Release: restore the owner's saved priority and clear it
    /// (spec.md §4.1) — the ticket mutex's own `Drop` still handles
    /// `now_serving`.
    fn drop(&mut self) {
        if let Some(owner) = self.lock.owner.lock().take() {
            owner.restore_priority();
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use alloc::sync::Arc;

    #[test]
    fn ticket_mutex_serializes_access() {
        let mutex = TicketMutex::new(0);
        {
            let mut g = mutex.lock();
            *g += 1;
        }
        assert_eq!(*mutex.lock(), 1);
    }

    #[test]
    fn ticket_mutex_fifo_under_contention() {
        extern crate std;
        use std::thread;

        let mutex = Arc::new(TicketMutex::new(alloc::vec::Vec::new()));
        let mut handles = alloc::vec::Vec::new();
        for i in 0..8 {
            let m = mutex.clone();
            handles.push(thread::spawn(move || {
                let mut g = m.lock();
                g.push(i);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(mutex.lock().len(), 8);
    }

    #[derive(Clone)]
    struct TestOwner {
        base: u8,
        current: Arc<core::sync::atomic::AtomicU8>,
    }

    impl TestOwner {
        fn new(priority: u8) -> Self {
            Self {
                base: priority,
                current: Arc::new(core::sync::atomic::AtomicU8::new(priority)),
            }
        }
    }

    impl PriorityOwner for TestOwner {
        fn priority(&self) -> u8 {
            self.current.load(Ordering::Acquire)
        }

        fn boost_priority(&self, to: u8) {
            self.current.fetch_max(to, Ordering::AcqRel);
        }

        fn restore_priority(&self) {
            self.current.store(self.base, Ordering::Release);
        }
    }

    #[test]
    fn priority_mutex_restores_holder_priority_on_release() {
        let mutex = PriorityMutex::new(0);
        let low = TestOwner::new(1);
        assert_eq!(mutex.current_priority(), None);
        {
            let _g = mutex.lock(low.clone());
            assert_eq!(mutex.current_priority(), Some(1));
            low.boost_priority(9);
            assert_eq!(mutex.current_priority(), Some(9));
        }
        assert_eq!(low.priority(), 1);
        assert_eq!(mutex.current_priority(), None);
    }

    #[test]
    fn priority_mutex_lock_boosts_holder_while_waiter_blocks() {
        extern crate std;
        use std::sync::mpsc;
        use std::thread;

        let mutex = Arc::new(PriorityMutex::new(0u32));
        let low = TestOwner::new(1);
        let (acquired_tx, acquired_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();

        let holder = {
            let mutex = mutex.clone();
            let low = low.clone();
            thread::spawn(move || {
                let _guard = mutex.lock(low);
                acquired_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            })
        };
        acquired_rx.recv().unwrap();

        let high = TestOwner::new(9);
        let waiter = {
            let mutex = mutex.clone();
            thread::spawn(move || drop(mutex.lock(high)))
        };

        while low.priority() != 9 {
            core::hint::spin_loop();
        }
        assert_eq!(low.priority(), 9);

        release_tx.send(()).unwrap();
        holder.join().unwrap();
        waiter.join().unwrap();
        assert_eq!(low.priority(), 1);
    }
}
