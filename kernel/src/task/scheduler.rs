//! Scheduler (spec.md §5): one runnable queue per CPU instead of the
//! teacher's single global `VecDeque`, behind `kernel_sync::IrqSpinlock`
//! per SPEC_FULL.md §5, preserving the teacher's `pick_next`/
//! `yield_and_reschedule`/`schedule` shape
//! (`examples` teacher `task::scheduler::Scheduler`) one queue per CPU.
//!
//! Also the home of the [`fs::pipe::Blocker`](crate::fs::pipe::Blocker)
//! implementation `kernel::fs::pipe`/`kernel::ipc::msgq`/
//! `kernel::ipc::semaphore` park/wake through, since only this module
//! knows what a `WaitQueue` token actually refers to.

extern crate alloc;

use alloc::collections::{BTreeMap, VecDeque};
use alloc::sync::Arc;
use core::sync::atomic::Ordering;

use kernel_sync::spinlock::{IrqDisable, IrqSpinlock};
use kernel_sync::wait_queue::WaitQueue;

use crate::fs::pipe::Blocker;

use super::thread::{ThreadRef, ThreadState};

/// Upper bound on the number of CPUs this kernel schedules across. Not
/// derived from ACPI/MADT parsing (out of scope here); large enough for
/// any machine this kernel actually boots on, and every CPU beyond the
/// real count simply keeps an empty queue forever.
pub const MAX_CPUS: usize = 32;

/// Adapts `kernel_hal`'s concrete x86-64 interrupt-disable pair to the
/// arch-agnostic [`IrqDisable`] hook `kernel_sync::IrqSpinlock` is
/// generic over. Shared with [`crate::smp`]'s shootdown slot table so
/// both critical sections use the exact same disable/restore pairing.
pub struct ArchIrqDisable;

impl IrqDisable for ArchIrqDisable {
    fn disable() -> usize {
        kernel_hal::x86_64::interrupts::disable() as usize
    }

    fn restore(state: usize) {
        kernel_hal::x86_64::interrupts::restore(state as u64)
    }
}

struct RunQueue {
    ready: VecDeque<ThreadRef>,
}

impl RunQueue {
    const fn new() -> Self {
        Self { ready: VecDeque::new() }
    }
}

/// One CPU's runnable queue plus the thread it is currently running.
/// Generalizes the teacher's single `Scheduler { ready_list }` to one
/// instance per CPU.
pub struct PerCpuScheduler {
    queue: IrqSpinlock<RunQueue, ArchIrqDisable>,
    current: IrqSpinlock<Option<ThreadRef>, ArchIrqDisable>,
}

impl PerCpuScheduler {
    const fn new() -> Self {
        Self {
            queue: IrqSpinlock::new(RunQueue::new()),
            current: IrqSpinlock::new(None),
        }
    }

    pub fn add_task(&self, task: ThreadRef) {
        task.set_state(ThreadState::Runnable);
        self.queue.lock().ready.push_back(task);
    }

    /// Picks the highest-priority runnable thread (ties broken FIFO),
    /// removing it from the queue. Consults `Thread::priority()`, which
    /// reflects any priority-inheritance boost a held
    /// [`kernel_sync::PriorityMutex`] has applied (spec.md §4.1).
    pub fn pick_next(&self) -> Option<ThreadRef> {
        let mut queue = self.queue.lock();
        if queue.ready.is_empty() {
            return None;
        }
        let mut best_index = 0;
        let mut best_priority = queue.ready[0].priority();
        for (index, thread) in queue.ready.iter().enumerate().skip(1) {
            if thread.priority() > best_priority {
                best_index = index;
                best_priority = thread.priority();
            }
        }
        queue.ready.remove(best_index)
    }

    /// Re-queues `current` and picks the next thread to run in one lock
    /// acquisition, matching the teacher's `yield_and_reschedule`.
    pub fn yield_and_reschedule(&self, current: ThreadRef) -> Option<ThreadRef> {
        self.add_task(current);
        self.pick_next()
    }

    pub fn current(&self) -> Option<ThreadRef> {
        self.current.lock().clone()
    }

    fn set_current(&self, thread: Option<ThreadRef>) {
        *self.current.lock() = thread;
    }

    fn len(&self) -> usize {
        self.queue.lock().ready.len()
    }
}

impl Default for PerCpuScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_SCHEDULER: PerCpuScheduler = PerCpuScheduler::new();
static SCHEDULERS: [PerCpuScheduler; MAX_CPUS] = [EMPTY_SCHEDULER; MAX_CPUS];

/// Maps the calling CPU's APIC id to a dense `0..MAX_CPUS` index.
/// Shared with [`crate::smp`]'s shootdown slot table so both subsystems
/// agree on which slot belongs to which CPU.
pub fn cpu_index() -> usize {
    kernel_hal::x86_64::apic::APIC.id() as usize % MAX_CPUS
}

/// The calling CPU's scheduler.
pub fn local() -> &'static PerCpuScheduler {
    &SCHEDULERS[cpu_index()]
}

/// Maps a [`kernel_sync::WaitQueue`] token (an opaque `usize`, per
/// `Thread::token`) back to the `ThreadRef` it names, so `wake_one`/
/// `wake_all` can resume the right thread. `WaitQueue` itself knows
/// nothing about threads — only this registry does.
static THREAD_REGISTRY: IrqSpinlock<BTreeMap<usize, ThreadRef>, ArchIrqDisable> =
    IrqSpinlock::new(BTreeMap::new());

fn register_thread(thread: &ThreadRef) {
    THREAD_REGISTRY.lock().insert(thread.token(), thread.clone());
}

/// Drops a thread's registry entry once it has been reaped; called by
/// `task::wait` after a zombie thread is collected.
pub fn unregister_thread(thread: &ThreadRef) {
    THREAD_REGISTRY.lock().remove(&thread.token());
}

fn lookup_thread(token: usize) -> Option<ThreadRef> {
    THREAD_REGISTRY.lock().get(&token).cloned()
}

/// The least-loaded per-CPU queue, for placing a freshly spawned or
/// woken thread without pinning everything to CPU 0.
fn least_loaded() -> &'static PerCpuScheduler {
    SCHEDULERS
        .iter()
        .min_by_key(|scheduler| scheduler.len())
        .expect("MAX_CPUS is nonzero")
}

/// Registers a new thread with the scheduler and places it on the
/// least-loaded run queue. Every thread that should ever be scheduled
/// (including the boot/idle thread) goes through this, not
/// `PerCpuScheduler::add_task` directly, so `THREAD_REGISTRY` stays
/// complete.
pub fn spawn(thread: ThreadRef) {
    register_thread(&thread);
    least_loaded().add_task(thread);
}

/// The thread running on the calling CPU right now.
///
/// # Panics
/// Panics if called before any thread has been switched onto this CPU
/// (i.e. before `kernel::init::run` has performed its first
/// `switch_to`).
pub fn current_thread() -> ThreadRef {
    local()
        .current()
        .expect("scheduler::current_thread() called before the first switch_to on this CPU")
}

/// Performs the actual context switch to `next`, updating per-CPU
/// bookkeeping and the threads' states. A no-op if `next` is already
/// running here.
///
/// The first call on a given CPU (no `current` yet, i.e. the bootstrap
/// thread) just records `next` as current without saving anything —
/// there is no prior context to preserve.
pub fn switch_to(next: ThreadRef) {
    let sched = local();
    let Some(old) = sched.current() else {
        next.set_state(ThreadState::Running);
        sched.set_current(Some(next));
        return;
    };
    if Arc::ptr_eq(&old, &next) {
        return;
    }

    old.set_state(ThreadState::Runnable);
    next.set_state(ThreadState::Running);

    // SAFETY: `switch_context`'s contract requires interrupts disabled
    // for its duration, which this critical section provides. Both
    // `ThreadRef`s are kept alive by `THREAD_REGISTRY`/the run queues
    // for as long as the raw pointers below are in flight, including
    // across the suspension inside `switch_context` (this call only
    // returns here once some other CPU switches back into `old`).
    unsafe {
        let flags = kernel_hal::x86_64::interrupts::disable();
        sched.set_current(Some(next.clone()));
        let old_ctx = {
            let mut guard = old.context.lock();
            &mut *guard as *mut _
        };
        let new_ctx = {
            let guard = next.context.lock();
            &*guard as *const _
        };
        kernel_hal::x86_64::context::switch_context(old_ctx, new_ctx);
        kernel_hal::x86_64::interrupts::restore(flags);
    }
}

/// Voluntary yield (`sched_yield`): re-queues the current thread unless
/// it has already transitioned to `Sleeping`/`Zombie` by some other
/// path (a blocking syscall handler that already parked it before
/// calling here), then switches to the next runnable thread if any.
pub fn yield_now() {
    let current = current_thread();
    let next = match current.state() {
        ThreadState::Sleeping | ThreadState::Zombie => local().pick_next(),
        _ => local().yield_and_reschedule(current),
    };
    if let Some(next) = next {
        switch_to(next);
    }
}

fn wake_token(token: usize) {
    if let Some(thread) = lookup_thread(token) {
        if thread.state() == ThreadState::Sleeping {
            least_loaded().add_task(thread);
        }
    }
}

/// Requeues a sleeping thread outside of a `WaitQueue`/timer wake path —
/// used by signal delivery (`sys_kill` on a non-fatal signal) to cut a
/// `nanosleep` short. A no-op if the thread is not actually sleeping.
pub fn wake_sleeping(thread: &ThreadRef) {
    if thread.state() == ThreadState::Sleeping {
        thread.wake_deadline_ns.store(0, Ordering::Release);
        least_loaded().add_task(thread.clone());
    }
}

/// The scheduler's [`Blocker`] implementation, reached through
/// [`blocker`] by every subsystem that parks on a `WaitQueue` (pipes,
/// message queues, semaphores).
struct SchedulerBlocker;

impl Blocker for SchedulerBlocker {
    fn current_token(&self) -> usize {
        current_thread().token()
    }

    fn park_on(&self, queue: &WaitQueue) {
        let current = current_thread();
        current.set_state(ThreadState::Sleeping);
        queue.enqueue(current.token());
        match local().pick_next() {
            Some(next) => switch_to(next),
            None => {
                // Nothing else is runnable on this CPU. Spin with
                // interrupts enabled so a timer tick or an IPI from
                // another CPU's `wake_one`/`wake_all` can still land and
                // flip our state back to `Runnable`.
                while current.state() == ThreadState::Sleeping {
                    unsafe { kernel_hal::x86_64::interrupts::enable() };
                    core::hint::spin_loop();
                }
            }
        }
    }

    fn wake_one(&self, queue: &WaitQueue) {
        if let Some(token) = queue.dequeue() {
            wake_token(token);
        }
    }

    fn wake_all(&self, queue: &WaitQueue) {
        for token in queue.dequeue_all() {
            wake_token(token);
        }
    }
}

static SCHEDULER_BLOCKER: SchedulerBlocker = SchedulerBlocker;

/// The scheduler's global [`Blocker`], for callers with no per-call
/// blocker handle of their own (e.g. `Pipe::close_read`/`close_write`,
/// invoked from an fd table's drop path).
pub fn blocker() -> &'static dyn Blocker {
    &SCHEDULER_BLOCKER
}

/// Puts the current thread to sleep until `deadline_ns`, consulted by
/// the timer interrupt handler (`Thread::wake_deadline_ns`). Used by
/// `nanosleep` (spec.md §4.5).
pub fn sleep_until(deadline_ns: u64) {
    let current = current_thread();
    current.wake_deadline_ns.store(deadline_ns, Ordering::Release);
    current.set_state(ThreadState::Sleeping);
    match local().pick_next() {
        Some(next) => switch_to(next),
        None => {
            while current.state() == ThreadState::Sleeping {
                unsafe { kernel_hal::x86_64::interrupts::enable() };
                core::hint::spin_loop();
            }
        }
    }
}

/// Called from the timer interrupt handler on every tick: wakes any
/// thread across every CPU's queue whose sleep deadline has passed.
/// `O(MAX_CPUS)` bounded, not `O(threads)`, since sleeping threads are
/// not parked in any `PerCpuScheduler`'s queue — they are found via
/// `THREAD_REGISTRY`.
pub fn tick(now_ns: u64) {
    let sleepers: alloc::vec::Vec<ThreadRef> = THREAD_REGISTRY
        .lock()
        .values()
        .filter(|thread| {
            thread.state() == ThreadState::Sleeping && {
                let deadline = thread.wake_deadline_ns.load(Ordering::Acquire);
                deadline != 0 && now_ns >= deadline
            }
        })
        .cloned()
        .collect();
    for thread in sleepers {
        thread.wake_deadline_ns.store(0, Ordering::Release);
        least_loaded().add_task(thread);
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use alloc::sync::Weak;

    fn runnable_thread(priority: u8) -> ThreadRef {
        let t = super::thread::Thread::new(Weak::new(), priority, Default::default());
        t.set_state(ThreadState::Runnable);
        t
    }

    #[test]
    fn pick_next_prefers_highest_priority() {
        let sched = PerCpuScheduler::new();
        sched.add_task(runnable_thread(1));
        let high = runnable_thread(9);
        sched.add_task(high.clone());
        sched.add_task(runnable_thread(3));
        let picked = sched.pick_next().unwrap();
        assert!(Arc::ptr_eq(&picked, &high));
    }

    #[test]
    fn pick_next_is_fifo_among_equal_priority() {
        let sched = PerCpuScheduler::new();
        let first = runnable_thread(1);
        let second = runnable_thread(1);
        sched.add_task(first.clone());
        sched.add_task(second);
        let picked = sched.pick_next().unwrap();
        assert!(Arc::ptr_eq(&picked, &first));
    }

    #[test]
    fn yield_and_reschedule_requeues_current() {
        let sched = PerCpuScheduler::new();
        let a = runnable_thread(1);
        let b = runnable_thread(1);
        sched.add_task(b.clone());
        let picked = sched.yield_and_reschedule(a.clone()).unwrap();
        assert!(Arc::ptr_eq(&picked, &b));
        let requeued = sched.pick_next().unwrap();
        assert!(Arc::ptr_eq(&requeued, &a));
    }

    #[test]
    fn empty_queue_picks_nothing() {
        let sched = PerCpuScheduler::new();
        assert!(sched.pick_next().is_none());
    }
}
