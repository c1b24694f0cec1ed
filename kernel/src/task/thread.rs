//! Thread: a schedulable register context, its priority (subject to
//! the ticket mutex's priority-inheritance boost, spec.md §4.1), and a
//! weak link back to its owning process.

extern crate alloc;

use alloc::sync::{Arc, Weak};
use core::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

use kernel_sync::mutex::PriorityOwner;

use super::process::Process;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Creating,
    Runnable,
    Running,
    Sleeping,
    Stopped,
    Zombie,
}

/// Saved register set for a context switch. This is exactly
/// `kernel_hal`'s [`CpuContext`](kernel_hal::x86_64::context::CpuContext):
/// the switch assembly lives at the HAL layer (it indexes the struct by
/// byte offset), but the scheduling policy around it — who owns a
/// context, when it gets swapped in — is the task layer's job.
pub type ThreadContext = kernel_hal::x86_64::context::CpuContext;

static NEXT_TID: AtomicU64 = AtomicU64::new(1);

/// Priority newly forked threads start at absent an explicit
/// `sched_setattr`-style call. Mid-range of the `u8` priority space so
/// both interactive boosts and background nice-downs have room to move.
pub const DEFAULT_PRIORITY: u8 = 5;

pub struct Thread {
    pub tid: u64,
    pub context: kernel_sync::spinlock::Spinlock<ThreadContext>,
    /// The priority assigned at creation; never changes.
    pub base_priority: u8,
    /// The priority the scheduler should currently run this thread at
    /// — `base_priority` unless a [`kernel_sync::PriorityMutex`] this
    /// thread holds has a waiter boosting it (spec.md §4.1/§5).
    current_priority: AtomicU8,
    state: kernel_sync::spinlock::Spinlock<ThreadState>,
    pub process: Weak<Process>,
    /// `nanosleep`/wait-queue wake deadline, polled by the timer
    /// interrupt handler; 0 when not sleeping on a timeout.
    pub wake_deadline_ns: AtomicU64,
    woken_by_signal: core::sync::atomic::AtomicBool,
}

pub type ThreadRef = Arc<Thread>;

impl Thread {
    pub fn new(process: Weak<Process>, priority: u8, context: ThreadContext) -> ThreadRef {
        Arc::new(Self {
            tid: NEXT_TID.fetch_add(1, Ordering::Relaxed),
            context: kernel_sync::spinlock::Spinlock::new(context),
            base_priority: priority,
            current_priority: AtomicU8::new(priority),
            state: kernel_sync::spinlock::Spinlock::new(ThreadState::Creating),
            process,
            wake_deadline_ns: AtomicU64::new(0),
            woken_by_signal: core::sync::atomic::AtomicBool::new(false),
        })
    }

    pub fn state(&self) -> ThreadState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: ThreadState) {
        *self.state.lock() = state;
    }

    pub fn priority(&self) -> u8 {
        self.current_priority.load(Ordering::Acquire)
    }

    /// Boost this thread's effective priority for the duration of a
    /// priority-inheritance mutex hold (spec.md §4.1 scenario).
    pub fn boost_priority(&self, to: u8) {
        self.current_priority.fetch_max(to, Ordering::AcqRel);
    }

    /// Restore the base priority after the mutex that boosted this
    /// thread is released.
    pub fn restore_priority(&self) {
        self.current_priority.store(self.base_priority, Ordering::Release);
    }

    /// A token identifying this thread for `kernel_sync::WaitQueue`,
    /// whose parking API only understands opaque `usize`s.
    pub fn token(self: &Arc<Self>) -> usize {
        Arc::as_ptr(self) as usize
    }

    /// `nanosleep`-style early wake: records that this thread's sleep
    /// was cut short so the syscall can report remaining time instead
    /// of the full requested duration (spec.md §5 "cancellation").
    pub fn mark_woken_by_signal(&self) {
        self.woken_by_signal.store(true, Ordering::Release);
    }

    pub fn take_woken_by_signal(&self) -> bool {
        self.woken_by_signal.swap(false, Ordering::AcqRel)
    }
}

/// Lets a [`kernel_sync::PriorityMutex`] boost/restore a real thread's
/// priority directly, rather than tracking an abstract ceiling (spec.md
/// §4.1). See [`super::process::Process`]'s `children` lock for the
/// lock this is wired into.
impl PriorityOwner for ThreadRef {
    fn priority(&self) -> u8 {
        Thread::priority(self)
    }

    fn boost_priority(&self, to: u8) {
        Thread::boost_priority(self, to)
    }

    fn restore_priority(&self) {
        Thread::restore_priority(self)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn priority_boost_and_restore() {
        let t = Thread::new(Weak::new(), 1, ThreadContext::default());
        assert_eq!(t.priority(), 1);
        t.boost_priority(9);
        assert_eq!(t.priority(), 9);
        t.restore_priority();
        assert_eq!(t.priority(), 1);
    }

    #[test]
    fn boost_never_lowers_priority() {
        let t = Thread::new(Weak::new(), 5, ThreadContext::default());
        t.boost_priority(2);
        assert_eq!(t.priority(), 5);
    }

    #[test]
    fn tokens_are_unique_per_thread() {
        let a = Thread::new(Weak::new(), 1, ThreadContext::default());
        let b = Thread::new(Weak::new(), 1, ThreadContext::default());
        assert_ne!(a.token(), b.token());
    }
}
