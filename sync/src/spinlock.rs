//! Spinlocks: a plain mutual-exclusion spinlock, an IRQ-disabling
//! variant generic over the arch's interrupt hook, and a reader/writer
//! spinlock.

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A plain test-and-test-and-set spinlock.
pub struct Spinlock<T: ?Sized> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for Spinlock<T> {}
unsafe impl<T: ?Sized + Send> Sync for Spinlock<T> {}

impl<T> Spinlock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(value),
        }
    }
}

impl<T: ?Sized> Spinlock<T> {
    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return SpinlockGuard { lock: self };
            }
            while self.locked.load(Ordering::Relaxed) {
                core::hint::spin_loop();
            }
        }
    }

    pub fn try_lock(&self) -> Option<SpinlockGuard<'_, T>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SpinlockGuard { lock: self })
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

pub struct SpinlockGuard<'a, T: ?Sized> {
    lock: &'a Spinlock<T>,
}

impl<T: ?Sized> Deref for SpinlockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: holding the guard proves exclusive access to `data`.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for SpinlockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: holding the guard proves exclusive access to `data`.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for SpinlockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

/// Hook the arch layer implements to disable/restore interrupts around a
/// critical section. `state` is whatever the arch needs to restore the
/// prior flag (e.g. the saved `RFLAGS` value on x86-64).
pub trait IrqDisable {
    fn disable() -> usize;
    fn restore(state: usize);
}

/// A spinlock that also disables interrupts for the duration of the
/// critical section, generic over the arch's [`IrqDisable`] impl so this
/// crate stays free of `core::arch` dependencies.
pub struct IrqSpinlock<T: ?Sized, A: IrqDisable> {
    _arch: PhantomData<A>,
    inner: Spinlock<T>,
}

unsafe impl<T: ?Sized + Send, A: IrqDisable> Send for IrqSpinlock<T, A> {}
unsafe impl<T: ?Sized + Send, A: IrqDisable> Sync for IrqSpinlock<T, A> {}

impl<T, A: IrqDisable> IrqSpinlock<T, A> {
    pub const fn new(value: T) -> Self {
        Self {
            _arch: PhantomData,
            inner: Spinlock::new(value),
        }
    }
}

impl<T: ?Sized, A: IrqDisable> IrqSpinlock<T, A> {
    pub fn lock(&self) -> IrqSpinlockGuard<'_, T, A> {
        let state = A::disable();
        let guard = self.inner.lock();
        IrqSpinlockGuard { guard, state }
    }

    pub fn try_lock(&self) -> Option<IrqSpinlockGuard<'_, T, A>> {
        let state = A::disable();
        match self.inner.try_lock() {
            Some(guard) => Some(IrqSpinlockGuard { guard, state }),
            None => {
                A::restore(state);
                None
            }
        }
    }
}

pub struct IrqSpinlockGuard<'a, T: ?Sized, A: IrqDisable> {
    guard: SpinlockGuard<'a, T>,
    state: usize,
}

impl<T: ?Sized, A: IrqDisable> Deref for IrqSpinlockGuard<'_, T, A> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T: ?Sized, A: IrqDisable> DerefMut for IrqSpinlockGuard<'_, T, A> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T: ?Sized, A: IrqDisable> Drop for IrqSpinlockGuard<'_, T, A> {
    fn drop(&mut self) {
        // Guard is dropped first (releasing the inner lock) before
        // interrupts are restored, matching the teacher's `IrqSafeLock`.
        A::restore(self.state);
    }
}

const WRITER: usize = usize::MAX;

/// A reader/writer spinlock. `state` is 0 when unlocked, `WRITER` when
/// write-locked, or the live reader count otherwise.
pub struct RwSpinlock<T: ?Sized> {
    state: AtomicUsize,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for RwSpinlock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for RwSpinlock<T> {}

impl<T> RwSpinlock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            state: AtomicUsize::new(0),
            data: UnsafeCell::new(value),
        }
    }
}

impl<T: ?Sized> RwSpinlock<T> {
    pub fn read(&self) -> RwSpinlockReadGuard<'_, T> {
        loop {
            let current = self.state.load(Ordering::Relaxed);
            if current == WRITER {
                core::hint::spin_loop();
                continue;
            }
            if self
                .state
                .compare_exchange_weak(current, current + 1, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return RwSpinlockReadGuard { lock: self };
            }
        }
    }

    pub fn write(&self) -> RwSpinlockWriteGuard<'_, T> {
        loop {
            if self
                .state
                .compare_exchange_weak(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return RwSpinlockWriteGuard { lock: self };
            }
            core::hint::spin_loop();
        }
    }
}

pub struct RwSpinlockReadGuard<'a, T: ?Sized> {
    lock: &'a RwSpinlock<T>,
}

impl<T: ?Sized> Deref for RwSpinlockReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: this guard counts as one of the shared readers tracked
        // in `state`; writers cannot acquire while any reader holds it.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for RwSpinlockReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.state.fetch_sub(1, Ordering::Release);
    }
}

pub struct RwSpinlockWriteGuard<'a, T: ?Sized> {
    lock: &'a RwSpinlock<T>,
}

impl<T: ?Sized> Deref for RwSpinlockWriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: `state == WRITER` proves exclusive access.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for RwSpinlockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: `state == WRITER` proves exclusive access.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for RwSpinlockWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.state.store(0, Ordering::Release);
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn spinlock_basic_access() {
        let lock = Spinlock::new(10);
        {
            let mut guard = lock.lock();
            assert_eq!(*guard, 10);
            *guard = 20;
        }
        assert_eq!(*lock.lock(), 20);
    }

    #[test]
    fn spinlock_try_lock_fails_while_held() {
        let lock = Spinlock::new(());
        let _g = lock.lock();
        assert!(lock.try_lock().is_none());
    }

    struct NoOpIrq;
    impl IrqDisable for NoOpIrq {
        fn disable() -> usize {
            0
        }
        fn restore(_state: usize) {}
    }

    #[test]
    fn irq_spinlock_round_trips_value() {
        let lock: IrqSpinlock<u32, NoOpIrq> = IrqSpinlock::new(1);
        *lock.lock() += 1;
        assert_eq!(*lock.lock(), 2);
    }

    #[test]
    fn rw_spinlock_allows_concurrent_readers() {
        let lock = RwSpinlock::new(5);
        let r1 = lock.read();
        let r2 = lock.read();
        assert_eq!(*r1, 5);
        assert_eq!(*r2, 5);
        drop(r1);
        drop(r2);
        *lock.write() = 6;
        assert_eq!(*lock.read(), 6);
    }

    #[test]
    fn rw_spinlock_writer_excludes_readers() {
        let lock = RwSpinlock::new(0);
        let w = lock.write();
        assert!(
            matches!(lock.state.compare_exchange(0, 0, Ordering::Relaxed, Ordering::Relaxed), Err(_))
        );
        drop(w);
        assert_eq!(lock.state.load(Ordering::Relaxed), 0);
    }
}
